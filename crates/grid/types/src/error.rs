//! Validation error types

use thiserror::Error;

/// Errors raised when a deployment or payload breaks a domain rule
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("gateway name must not be empty")]
    EmptyName,

    #[error("gateway name is too long: {len} characters, max {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("gateway name contains invalid character {0:?}")]
    InvalidNameCharacter(char),

    #[error("gateway must have at least one backend")]
    NoBackends,

    #[error("invalid backend {backend:?}: {reason}")]
    InvalidBackend { backend: String, reason: String },

    #[error("deployment has no workloads")]
    NoWorkloads,

    #[error("workload name must not be empty")]
    EmptyWorkloadName,

    #[error("duplicate workload name: {0}")]
    DuplicateWorkload(String),

    #[error("signature requirement cannot be met: required {required}, available {available}")]
    UnreachableSignatureWeight { required: u32, available: u32 },
}

/// Result type for validation
pub type Result<T> = std::result::Result<T, ValidationError>;
