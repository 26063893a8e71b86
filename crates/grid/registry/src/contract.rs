//! Contract registry trait
//!
//! The registry is the on-chain source of truth for billing and
//! authorization. Name contracts reserve a gateway name; node contracts
//! authorize one deployment on one node.

use crate::error::Result;
use async_trait::async_trait;
use grid_types::{ContractId, ContractMap, Identity, NodeId};

/// On-chain contract operations
#[async_trait]
pub trait ContractRegistry: Send + Sync {
    /// Reserve `name` for the identity's twin
    async fn create_name_contract(&self, identity: &Identity, name: &str) -> Result<ContractId>;

    /// Check a name contract against the name it should reserve
    ///
    /// Returns `contract_id` unchanged when the contract is live and
    /// reserves `name`. When the contract is gone, canceled, or reserves a
    /// different name, the old contract is released and `ContractId::NONE`
    /// is returned so the caller registers `name` afresh.
    async fn invalidate_name_contract(
        &self,
        identity: &Identity,
        contract_id: ContractId,
        name: &str,
    ) -> Result<ContractId>;

    /// Create the contract backing a deployment on `node`
    async fn create_node_contract(
        &self,
        identity: &Identity,
        node: NodeId,
        deployment_hash: &str,
    ) -> Result<ContractId>;

    /// Record a new deployment hash on an existing node contract
    async fn update_node_contract(
        &self,
        identity: &Identity,
        contract_id: ContractId,
        deployment_hash: &str,
    ) -> Result<()>;

    /// Cancel a contract; already canceled or missing contracts are fine
    async fn ensure_contract_canceled(
        &self,
        identity: &Identity,
        contract_id: ContractId,
    ) -> Result<()>;

    /// Whether the contract exists and has not been canceled
    async fn is_valid_contract(&self, contract_id: ContractId) -> Result<bool>;

    /// Return `contracts` without the entries whose contract is no longer valid
    ///
    /// The input is left untouched; the caller assigns the result.
    async fn delete_invalid_contracts(&self, contracts: &ContractMap) -> Result<ContractMap> {
        let mut valid = ContractMap::new();
        for (node, contract_id) in contracts {
            if self.is_valid_contract(*contract_id).await? {
                valid.insert(*node, *contract_id);
            }
        }
        Ok(valid)
    }
}
