//! Node client and pool traits
//!
//! A `NodeClient` is a live RPC handle to one node. The pool resolves a node
//! ID to such a handle, consulting the registry for the node's twin when the
//! transport needs it.

use crate::error::Result;
use async_trait::async_trait;
use grid_registry::ContractRegistry;
use grid_types::{ContractId, Deployment, NodeId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Software versions reported by a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemVersion {
    pub os: String,
    pub agent: String,
}

/// RPC surface of a remote node
#[async_trait]
pub trait NodeClient: Send + Sync {
    fn node_id(&self) -> NodeId;

    /// Version query, also used as a liveness probe
    async fn system_version(&self) -> Result<SystemVersion>;

    /// Submit a new deployment; `contract_id` must already be set
    async fn deployment_deploy(&self, deployment: Deployment) -> Result<()>;

    /// Replace an existing deployment with a higher version
    async fn deployment_update(&self, deployment: Deployment) -> Result<()>;

    /// Current deployment with per-workload results
    async fn deployment_get(&self, contract_id: ContractId) -> Result<Deployment>;

    async fn deployment_delete(&self, contract_id: ContractId) -> Result<()>;
}

/// Resolves node IDs to live clients
#[async_trait]
pub trait NodeClientPool: Send + Sync {
    async fn get_node_client(
        &self,
        registry: &dyn ContractRegistry,
        node: NodeId,
    ) -> Result<Arc<dyn NodeClient>>;
}
