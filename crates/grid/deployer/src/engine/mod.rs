//! Deployment engine
//!
//! The engine performs the low-level create/update/delete of per-node
//! deployments and their node contracts. Resource deployers describe the
//! desired deployments; the engine makes nodes and registry match them.

pub mod node;

pub use node::NodeDeploymentEngine;

use crate::error::EngineResult;
use async_trait::async_trait;
use grid_registry::ContractRegistry;
use grid_types::{ContractMap, Deployment, NodeId};
use std::collections::BTreeMap;

/// Desired deployments keyed by target node
pub type DeploymentMap = BTreeMap<NodeId, Deployment>;

/// Applies desired per-node deployments and reads back their state
#[async_trait]
pub trait DeploymentEngine: Send + Sync {
    /// Move the node contracts in `contracts` to `deployments`
    ///
    /// Nodes only in `deployments` are created, nodes in both are updated
    /// and nodes only in `contracts` are torn down. An empty `deployments`
    /// removes everything.
    ///
    /// `contracts` is edited in place as soon as a node contract is created
    /// or canceled, before the next remote call. After an error, or after
    /// the returned future is dropped, it still holds every contract that
    /// exists on chain.
    async fn deploy(
        &self,
        registry: &dyn ContractRegistry,
        contracts: &mut ContractMap,
        deployments: &DeploymentMap,
    ) -> EngineResult<()>;

    /// Fetch the current deployment for every contract in `contracts`
    async fn get_deployments(
        &self,
        registry: &dyn ContractRegistry,
        contracts: &ContractMap,
    ) -> EngineResult<DeploymentMap>;
}
