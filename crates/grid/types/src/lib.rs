//! Grid Types - Core types for node deployments
//!
//! This crate defines the data model shared by the registry, node and
//! deployer crates:
//!
//! - **Identifiers**: `NodeId`, `TwinId`, `ContractId`
//! - **Deployments**: versioned workload sets a node accepts
//! - **Gateways**: the named-proxy payload and its domain rules
//! - **Identity**: the requesting twin and its signing key

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod deployment;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod ids;

pub use deployment::{
    Deployment, ResultState, SignatureRequest, SignatureRequirement, Workload, WorkloadResult,
    WorkloadType,
};
pub use error::{Result, ValidationError};
pub use gateway::{Backend, GatewayNameProxy, GatewayNameProxyData, GatewayProxyResult};
pub use identity::Identity;
pub use ids::{ContractId, ContractMap, NodeId, TwinId};
