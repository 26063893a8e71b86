//! Scripted collaborators for deployer unit tests
//!
//! Each fake records the calls it receives and answers from values the
//! test sets up front.

use crate::engine::{DeploymentEngine, DeploymentMap};
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use grid_node::{NodeClient, NodeClientPool, NodeError, SystemVersion};
use grid_registry::{ContractRegistry, RegistryError};
use grid_types::{ContractId, ContractMap, Deployment, Identity, NodeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    CreateName(String),
    Invalidate(ContractId, String),
    CreateNode(NodeId),
    UpdateNode(ContractId),
    Cancel(ContractId),
    IsValid(ContractId),
    DeleteInvalid(ContractMap),
}

#[derive(Default)]
pub struct ScriptedRegistry {
    pub calls: Mutex<Vec<RegistryCall>>,
    /// Returned by `create_name_contract`
    pub next_name_contract: Mutex<ContractId>,
    /// Returned by `invalidate_name_contract`; `None` echoes the input
    pub invalidate_result: Mutex<Option<ContractId>>,
    /// Contracts the registry reports as invalid
    pub invalid: Mutex<HashSet<ContractId>>,
    /// Operations that fail, by method name
    pub failing: Mutex<HashSet<&'static str>>,
}

impl ScriptedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning_name_contract(self, id: u64) -> Self {
        *self.next_name_contract.lock().unwrap() = ContractId::new(id);
        self
    }

    pub fn invalidating_to(self, id: u64) -> Self {
        *self.invalidate_result.lock().unwrap() = Some(ContractId::new(id));
        self
    }

    pub fn with_invalid(self, id: u64) -> Self {
        self.invalid.lock().unwrap().insert(ContractId::new(id));
        self
    }

    pub fn failing(self, operation: &'static str) -> Self {
        self.failing.lock().unwrap().insert(operation);
        self
    }

    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str, call: RegistryCall) -> Result<(), RegistryError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(operation) {
            return Err(RegistryError::Chain(format!("{} failed", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl ContractRegistry for ScriptedRegistry {
    async fn create_name_contract(
        &self,
        _identity: &Identity,
        name: &str,
    ) -> grid_registry::Result<ContractId> {
        self.record("create_name_contract", RegistryCall::CreateName(name.into()))?;
        Ok(*self.next_name_contract.lock().unwrap())
    }

    async fn invalidate_name_contract(
        &self,
        _identity: &Identity,
        contract_id: ContractId,
        name: &str,
    ) -> grid_registry::Result<ContractId> {
        self.record(
            "invalidate_name_contract",
            RegistryCall::Invalidate(contract_id, name.into()),
        )?;
        Ok(self.invalidate_result.lock().unwrap().unwrap_or(contract_id))
    }

    async fn create_node_contract(
        &self,
        _identity: &Identity,
        node: NodeId,
        _deployment_hash: &str,
    ) -> grid_registry::Result<ContractId> {
        self.record("create_node_contract", RegistryCall::CreateNode(node))?;
        Ok(ContractId::new(1000 + node.as_u32() as u64))
    }

    async fn update_node_contract(
        &self,
        _identity: &Identity,
        contract_id: ContractId,
        _deployment_hash: &str,
    ) -> grid_registry::Result<()> {
        self.record("update_node_contract", RegistryCall::UpdateNode(contract_id))
    }

    async fn ensure_contract_canceled(
        &self,
        _identity: &Identity,
        contract_id: ContractId,
    ) -> grid_registry::Result<()> {
        self.record("ensure_contract_canceled", RegistryCall::Cancel(contract_id))
    }

    async fn is_valid_contract(&self, contract_id: ContractId) -> grid_registry::Result<bool> {
        self.record("is_valid_contract", RegistryCall::IsValid(contract_id))?;
        Ok(!self.invalid.lock().unwrap().contains(&contract_id))
    }

    async fn delete_invalid_contracts(
        &self,
        contracts: &ContractMap,
    ) -> grid_registry::Result<ContractMap> {
        self.record(
            "delete_invalid_contracts",
            RegistryCall::DeleteInvalid(contracts.clone()),
        )?;
        let invalid = self.invalid.lock().unwrap();
        Ok(contracts
            .iter()
            .filter(|(_, id)| !invalid.contains(id))
            .map(|(node, id)| (*node, *id))
            .collect())
    }
}

/// Node that answers the version probe, refuses it, or never replies
pub struct ProbeNode {
    node: NodeId,
    reachable: bool,
    silent: bool,
}

#[async_trait]
impl NodeClient for ProbeNode {
    fn node_id(&self) -> NodeId {
        self.node
    }

    async fn system_version(&self) -> grid_node::Result<SystemVersion> {
        if self.silent {
            std::future::pending::<()>().await;
        }
        if self.reachable {
            Ok(SystemVersion {
                os: "v3".into(),
                agent: "v0".into(),
            })
        } else {
            Err(NodeError::Rpc("couldn't reach node".into()))
        }
    }

    async fn deployment_deploy(&self, _deployment: Deployment) -> grid_node::Result<()> {
        Err(NodeError::Rpc("not scripted".into()))
    }

    async fn deployment_update(&self, _deployment: Deployment) -> grid_node::Result<()> {
        Err(NodeError::Rpc("not scripted".into()))
    }

    async fn deployment_get(&self, contract_id: ContractId) -> grid_node::Result<Deployment> {
        Err(NodeError::DeploymentNotFound {
            node: self.node,
            contract_id,
        })
    }

    async fn deployment_delete(&self, _contract_id: ContractId) -> grid_node::Result<()> {
        Err(NodeError::Rpc("not scripted".into()))
    }
}

/// Pool whose nodes are reachable or not, as scripted
pub struct ScriptedPool {
    pub requested: Mutex<Vec<NodeId>>,
    resolvable: bool,
    reachable: bool,
    silent: bool,
}

impl ScriptedPool {
    pub fn reachable() -> Self {
        Self {
            requested: Mutex::new(Vec::new()),
            resolvable: true,
            reachable: true,
            silent: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::reachable()
        }
    }

    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::reachable()
        }
    }

    pub fn unresolvable() -> Self {
        Self {
            resolvable: false,
            ..Self::reachable()
        }
    }

    pub fn requested(&self) -> Vec<NodeId> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeClientPool for ScriptedPool {
    async fn get_node_client(
        &self,
        _registry: &dyn ContractRegistry,
        node: NodeId,
    ) -> grid_node::Result<Arc<dyn NodeClient>> {
        self.requested.lock().unwrap().push(node);
        if !self.resolvable {
            return Err(NodeError::NodeNotFound(node));
        }
        Ok(Arc::new(ProbeNode {
            node,
            reachable: self.reachable,
            silent: self.silent,
        }))
    }
}

/// Engine answering commits and fetches with scripted results
#[derive(Default)]
pub struct ScriptedEngine {
    pub commits: Mutex<Vec<(ContractMap, DeploymentMap)>>,
    pub fetches: Mutex<Vec<ContractMap>>,
    /// Contracts a commit leaves behind, and whether it fails
    pub commit_result: Mutex<(ContractMap, Option<String>)>,
    /// Deployments returned by fetches; `Err` fails the fetch
    pub fetch_result: Mutex<Option<Result<DeploymentMap, String>>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committing(self, contracts: ContractMap) -> Self {
        *self.commit_result.lock().unwrap() = (contracts, None);
        self
    }

    pub fn failing_commit(self, contracts: ContractMap, message: &str) -> Self {
        *self.commit_result.lock().unwrap() = (contracts, Some(message.to_string()));
        self
    }

    pub fn fetching(self, deployments: DeploymentMap) -> Self {
        *self.fetch_result.lock().unwrap() = Some(Ok(deployments));
        self
    }

    pub fn failing_fetch(self, message: &str) -> Self {
        *self.fetch_result.lock().unwrap() = Some(Err(message.to_string()));
        self
    }

    pub fn commits(&self) -> Vec<(ContractMap, DeploymentMap)> {
        self.commits.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<ContractMap> {
        self.fetches.lock().unwrap().clone()
    }

    fn error(message: &str) -> EngineError {
        EngineError::Node {
            node: NodeId::new(0),
            source: NodeError::Rpc(message.to_string()),
        }
    }
}

#[async_trait]
impl DeploymentEngine for ScriptedEngine {
    async fn deploy(
        &self,
        _registry: &dyn ContractRegistry,
        contracts: &mut ContractMap,
        deployments: &DeploymentMap,
    ) -> EngineResult<()> {
        self.commits
            .lock()
            .unwrap()
            .push((contracts.clone(), deployments.clone()));
        let (committed, failure) = self.commit_result.lock().unwrap().clone();
        *contracts = committed;
        match failure {
            Some(message) => Err(Self::error(&message)),
            None => Ok(()),
        }
    }

    async fn get_deployments(
        &self,
        _registry: &dyn ContractRegistry,
        contracts: &ContractMap,
    ) -> EngineResult<DeploymentMap> {
        self.fetches.lock().unwrap().push(contracts.clone());
        match self.fetch_result.lock().unwrap().clone() {
            Some(Ok(deployments)) => Ok(deployments),
            Some(Err(message)) => Err(Self::error(&message)),
            None => Ok(DeploymentMap::new()),
        }
    }
}

/// Node that accepts deployments but never reports a result for them
#[derive(Default)]
pub struct StalledNode {
    deployments: Mutex<HashMap<ContractId, Deployment>>,
}

impl StalledNode {
    pub fn deployment_count(&self) -> usize {
        self.deployments.lock().unwrap().len()
    }
}

#[async_trait]
impl NodeClient for StalledNode {
    fn node_id(&self) -> NodeId {
        NodeId::new(10)
    }

    async fn system_version(&self) -> grid_node::Result<SystemVersion> {
        Ok(SystemVersion {
            os: "v3".into(),
            agent: "v0".into(),
        })
    }

    async fn deployment_deploy(&self, deployment: Deployment) -> grid_node::Result<()> {
        self.deployments
            .lock()
            .unwrap()
            .insert(deployment.contract_id, deployment);
        Ok(())
    }

    async fn deployment_update(&self, deployment: Deployment) -> grid_node::Result<()> {
        self.deployment_deploy(deployment).await
    }

    async fn deployment_get(&self, contract_id: ContractId) -> grid_node::Result<Deployment> {
        self.deployments
            .lock()
            .unwrap()
            .get(&contract_id)
            .cloned()
            .ok_or(NodeError::DeploymentNotFound {
                node: self.node_id(),
                contract_id,
            })
    }

    async fn deployment_delete(&self, contract_id: ContractId) -> grid_node::Result<()> {
        self.deployments.lock().unwrap().remove(&contract_id);
        Ok(())
    }
}

/// Pool that hands out the same stalled node for every node ID
#[derive(Default)]
pub struct StalledPool {
    pub node: Arc<StalledNode>,
}

#[async_trait]
impl NodeClientPool for StalledPool {
    async fn get_node_client(
        &self,
        _registry: &dyn ContractRegistry,
        _node: NodeId,
    ) -> grid_node::Result<Arc<dyn NodeClient>> {
        Ok(self.node.clone())
    }
}
