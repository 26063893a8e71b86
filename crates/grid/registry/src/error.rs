//! Registry error types

use grid_types::ContractId;
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Contract not found: {0}")]
    ContractNotFound(ContractId),

    #[error("Contract is canceled: {0}")]
    ContractCanceled(ContractId),

    #[error("Name already reserved: {0}")]
    NameTaken(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Contract {contract_id} has unexpected kind, expected {expected}")]
    WrongKind {
        contract_id: ContractId,
        expected: &'static str,
    },

    #[error("Contract {contract_id} is not owned by {owner}")]
    Unauthorized {
        contract_id: ContractId,
        owner: String,
    },

    #[error("Chain error: {0}")]
    Chain(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
