//! Grid Deployer - Gateway name reconciliation
//!
//! A `GatewayNameDeployer` keeps one user-declared gateway in step with
//! the world:
//!
//! - **deploy**: reserve the gateway name and commit the node deployment
//! - **cancel**: tear the deployment down and release the name
//! - **sync**: drop bookkeeping for contracts that disappeared and read
//!   back what the node reports
//!
//! Node work goes through a `DeploymentEngine`; `NodeDeploymentEngine` is
//! the implementation that talks to nodes through a `NodeClientPool`.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod engine;
pub mod error;
pub mod gateway_name;

#[cfg(test)]
mod testing;

// Re-exports
pub use config::{DeployerConfig, EngineConfig};
pub use engine::{DeploymentEngine, DeploymentMap, NodeDeploymentEngine};
pub use error::{DeployerError, EngineError, EngineResult, Result};
pub use gateway_name::{DeployerContext, GatewayNameDeployer, GatewayNameState};
