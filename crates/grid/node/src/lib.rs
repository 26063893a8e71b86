//! Grid Node - Node client traits and implementations
//!
//! - **NodeClient**: RPC surface of one remote node (version probe,
//!   deployment calls)
//! - **NodeClientPool**: resolves node IDs to live clients
//!
//! The in-memory node and pool are suitable for development and testing.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod client;
pub mod error;
pub mod memory;

// Re-exports
pub use client::{NodeClient, NodeClientPool, SystemVersion};
pub use error::{NodeError, Result};
pub use memory::{InMemoryNode, InMemoryNodeClientPool};
