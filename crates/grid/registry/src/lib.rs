//! Grid Registry - Contract registry trait and implementations
//!
//! The registry is the source of truth for which name and node contracts
//! are live. The deployer and the deployment engine consume it through the
//! `ContractRegistry` trait.
//!
//! ## In-Memory vs Chain
//!
//! `InMemoryContractRegistry` is suitable for development and testing.
//! Production deployments use a chain client that implements the same trait.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod contract;
pub mod error;
pub mod memory;

// Re-exports
pub use contract::ContractRegistry;
pub use error::{RegistryError, Result};
pub use memory::{ContractKind, ContractRecord, ContractState, InMemoryContractRegistry};
