//! Node client error types

use grid_types::{ContractId, NodeId, ValidationError};
use thiserror::Error;

/// Errors returned by node clients and the client pool
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node {node} is unreachable: {reason}")]
    Unreachable { node: NodeId, reason: String },

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("deployment {contract_id} not found on node {node}")]
    DeploymentNotFound { node: NodeId, contract_id: ContractId },

    #[error("deployment {contract_id} already exists on node {node}")]
    DeploymentExists { node: NodeId, contract_id: ContractId },

    #[error("deployment {contract_id} update must raise version above {current}, got {proposed}")]
    StaleVersion {
        contract_id: ContractId,
        current: u32,
        proposed: u32,
    },

    #[error("deployment rejected: {0}")]
    InvalidDeployment(#[from] ValidationError),

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl NodeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, NodeError::DeploymentNotFound { .. })
    }
}

/// Result type for node operations
pub type Result<T> = std::result::Result<T, NodeError>;
