//! In-memory contract registry
//!
//! Suitable for development and testing. Production deployments talk to the
//! chain through an implementation of the same trait.

use crate::contract::ContractRegistry;
use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use grid_types::{ContractId, Identity, NodeId, TwinId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// What a contract pays for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractKind {
    Name { name: String },
    Node { node: NodeId, deployment_hash: String },
}

impl ContractKind {
    fn label(&self) -> &'static str {
        match self {
            ContractKind::Name { .. } => "name",
            ContractKind::Node { .. } => "node",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractState {
    Created,
    Canceled,
}

/// A contract as stored by the in-memory registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub twin_id: TwinId,
    /// Hex public key of the owner
    pub owner: String,
    pub kind: ContractKind,
    pub state: ContractState,
}

/// In-memory contract registry
pub struct InMemoryContractRegistry {
    contracts: DashMap<ContractId, ContractRecord>,
    /// Live name contracts by reserved name
    names: DashMap<String, ContractId>,
    next_id: AtomicU64,
}

impl InMemoryContractRegistry {
    pub fn new() -> Self {
        Self {
            contracts: DashMap::new(),
            names: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Start allocating contract IDs at `first`
    pub fn with_first_id(first: u64) -> Self {
        let registry = Self::new();
        registry.next_id.store(first.max(1), Ordering::SeqCst);
        registry
    }

    /// Snapshot of a stored contract
    pub fn contract(&self, contract_id: ContractId) -> Option<ContractRecord> {
        self.contracts.get(&contract_id).map(|c| c.clone())
    }

    /// Cancel a contract without owner checks, as billing does when funds run out
    pub fn force_cancel(&self, contract_id: ContractId) {
        self.cancel(contract_id);
    }

    /// Number of contracts that are not canceled
    pub fn active_count(&self) -> usize {
        self.contracts
            .iter()
            .filter(|c| c.state == ContractState::Created)
            .count()
    }

    fn allocate(&self) -> ContractId {
        ContractId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn record(&self, identity: &Identity, kind: ContractKind) -> ContractRecord {
        ContractRecord {
            twin_id: identity.twin_id(),
            owner: identity.public_key(),
            kind,
            state: ContractState::Created,
        }
    }

    fn check_owner(
        &self,
        identity: &Identity,
        contract_id: ContractId,
        record: &ContractRecord,
    ) -> Result<()> {
        if record.owner != identity.public_key() {
            return Err(RegistryError::Unauthorized {
                contract_id,
                owner: identity.public_key(),
            });
        }
        Ok(())
    }

    /// Mark a contract canceled and free its name, if it reserves one
    ///
    /// At most one of the two maps is locked at a time.
    fn cancel(&self, contract_id: ContractId) {
        let released = {
            let Some(mut record) = self.contracts.get_mut(&contract_id) else {
                return;
            };
            record.state = ContractState::Canceled;
            let name = match &record.kind {
                ContractKind::Name { name } => Some(name.clone()),
                ContractKind::Node { .. } => None,
            };
            name
        };
        if let Some(name) = released {
            self.names.remove_if(&name, |_, id| *id == contract_id);
        }
    }
}

impl Default for InMemoryContractRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContractRegistry for InMemoryContractRegistry {
    async fn create_name_contract(&self, identity: &Identity, name: &str) -> Result<ContractId> {
        if name.is_empty() {
            return Err(RegistryError::InvalidName(name.to_string()));
        }

        // never lock `contracts` while holding a `names` guard
        let id = self.allocate();
        let kind = ContractKind::Name {
            name: name.to_string(),
        };
        self.contracts.insert(id, self.record(identity, kind));

        let reserved = match self.names.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(id);
                true
            }
        };
        if !reserved {
            self.contracts.remove(&id);
            return Err(RegistryError::NameTaken(name.to_string()));
        }

        info!(contract_id = %id, name, "Name contract created");
        Ok(id)
    }

    async fn invalidate_name_contract(
        &self,
        identity: &Identity,
        contract_id: ContractId,
        name: &str,
    ) -> Result<ContractId> {
        if contract_id.is_none() {
            return Ok(ContractId::NONE);
        }

        let Some(record) = self.contract(contract_id) else {
            debug!(contract_id = %contract_id, "Name contract no longer exists");
            return Ok(ContractId::NONE);
        };
        self.check_owner(identity, contract_id, &record)?;

        let reserved = match &record.kind {
            ContractKind::Name { name } => name.as_str(),
            ContractKind::Node { .. } => {
                return Err(RegistryError::WrongKind {
                    contract_id,
                    expected: "name",
                })
            }
        };

        if record.state == ContractState::Canceled {
            return Ok(ContractId::NONE);
        }
        if reserved != name {
            info!(
                contract_id = %contract_id,
                old_name = reserved,
                new_name = name,
                "Name changed, releasing name contract"
            );
            self.cancel(contract_id);
            return Ok(ContractId::NONE);
        }

        Ok(contract_id)
    }

    async fn create_node_contract(
        &self,
        identity: &Identity,
        node: NodeId,
        deployment_hash: &str,
    ) -> Result<ContractId> {
        let id = self.allocate();
        let kind = ContractKind::Node {
            node,
            deployment_hash: deployment_hash.to_string(),
        };
        self.contracts.insert(id, self.record(identity, kind));
        info!(contract_id = %id, node = %node, "Node contract created");
        Ok(id)
    }

    async fn update_node_contract(
        &self,
        identity: &Identity,
        contract_id: ContractId,
        deployment_hash: &str,
    ) -> Result<()> {
        let mut record = self
            .contracts
            .get_mut(&contract_id)
            .ok_or(RegistryError::ContractNotFound(contract_id))?;
        self.check_owner(identity, contract_id, &record)?;
        if record.state == ContractState::Canceled {
            return Err(RegistryError::ContractCanceled(contract_id));
        }
        match &mut record.kind {
            ContractKind::Node {
                deployment_hash: hash,
                ..
            } => {
                *hash = deployment_hash.to_string();
                Ok(())
            }
            ContractKind::Name { .. } => Err(RegistryError::WrongKind {
                contract_id,
                expected: "node",
            }),
        }
    }

    async fn ensure_contract_canceled(
        &self,
        identity: &Identity,
        contract_id: ContractId,
    ) -> Result<()> {
        if contract_id.is_none() {
            return Ok(());
        }
        let Some(record) = self.contract(contract_id) else {
            return Ok(());
        };
        self.check_owner(identity, contract_id, &record)?;
        if record.state == ContractState::Created {
            self.cancel(contract_id);
            info!(contract_id = %contract_id, kind = record.kind.label(), "Contract canceled");
        }
        Ok(())
    }

    async fn is_valid_contract(&self, contract_id: ContractId) -> Result<bool> {
        Ok(self
            .contracts
            .get(&contract_id)
            .map(|c| c.state == ContractState::Created)
            .unwrap_or(false))
    }
}
