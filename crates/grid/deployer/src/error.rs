//! Deployer error types

use grid_node::NodeError;
use grid_registry::RegistryError;
use grid_types::{ContractId, NodeId, ValidationError};
use thiserror::Error;

/// Errors raised by the deployment engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("node {node}: {source}")]
    Node {
        node: NodeId,
        #[source]
        source: NodeError,
    },

    #[error("registry error for node {node}: {source}")]
    Registry {
        node: NodeId,
        #[source]
        source: RegistryError,
    },

    #[error("invalid deployment for node {node}: {source}")]
    InvalidDeployment {
        node: NodeId,
        #[source]
        source: ValidationError,
    },

    #[error("failed to hash deployment for node {node}: {source}")]
    Encoding {
        node: NodeId,
        #[source]
        source: serde_json::Error,
    },

    #[error("workload {workload} failed on node {node}: {reason}")]
    WorkloadFailed {
        node: NodeId,
        workload: String,
        reason: String,
    },

    #[error("timed out waiting for deployment {contract_id} on node {node}")]
    Timeout { node: NodeId, contract_id: ContractId },
}

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors returned by the gateway deployer
#[derive(Debug, Error)]
pub enum DeployerError {
    #[error("node {node} is unreachable: {reason}")]
    NodeUnreachable { node: NodeId, reason: String },

    #[error("invalid gateway: {0}")]
    InvalidGateway(#[from] ValidationError),

    #[error("failed to encode gateway payload: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("contract registry error: {0}")]
    Contract(#[from] RegistryError),

    #[error("deployment engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("failed to decode result of workload {workload}: {source}")]
    ResultDecode {
        workload: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for deployer operations
pub type Result<T> = std::result::Result<T, DeployerError>;
