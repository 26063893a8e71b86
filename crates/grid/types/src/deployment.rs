//! Node deployment wire model
//!
//! A deployment is the unit a node accepts: a versioned list of workloads
//! owned by one twin and bound to one node contract.

use crate::error::{Result, ValidationError};
use crate::ids::{ContractId, TwinId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Kind of workload carried by a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkloadType {
    /// Gateway that exposes a reserved name and proxies to backends
    NamedProxy,
}

impl fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadType::NamedProxy => write!(f, "named-proxy"),
        }
    }
}

/// State a node reports for a workload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultState {
    /// Nothing reported yet
    #[default]
    Init,
    Unchanged,
    Ok,
    Error,
    Deleted,
    Paused,
}

impl ResultState {
    /// Whether the node considers the workload up
    pub fn is_okay(&self) -> bool {
        matches!(self, ResultState::Ok | ResultState::Unchanged)
    }
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultState::Init => write!(f, "init"),
            ResultState::Unchanged => write!(f, "unchanged"),
            ResultState::Ok => write!(f, "ok"),
            ResultState::Error => write!(f, "error"),
            ResultState::Deleted => write!(f, "deleted"),
            ResultState::Paused => write!(f, "paused"),
        }
    }
}

/// Outcome a node reports after applying a workload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadResult {
    /// When the node produced this result
    pub created: Option<DateTime<Utc>>,

    pub state: ResultState,

    /// Error message when `state` is `Error`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    /// Type-specific result payload
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A single workload inside a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub version: u32,

    #[serde(rename = "type")]
    pub workload_type: WorkloadType,

    /// Unique within the deployment
    pub name: String,

    /// Marshaled type-specific payload
    pub data: serde_json::Value,

    #[serde(default)]
    pub result: WorkloadResult,
}

/// A twin allowed to sign a deployment, with its weight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequest {
    pub twin_id: TwinId,
    pub weight: u32,
}

/// Signatures a node requires before accepting a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequirement {
    pub requests: Vec<SignatureRequest>,
    pub weight_required: u32,
}

impl SignatureRequirement {
    /// Requirement satisfied by a single twin signing alone
    pub fn single(twin_id: TwinId) -> Self {
        Self {
            requests: vec![SignatureRequest { twin_id, weight: 1 }],
            weight_required: 1,
        }
    }
}

/// Deployment submitted to and reported by a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// Zero until the engine commits the deployment
    pub version: u32,

    pub twin_id: TwinId,

    /// Node contract backing this deployment, `NONE` before creation
    #[serde(default)]
    pub contract_id: ContractId,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metadata: String,

    pub workloads: Vec<Workload>,

    pub signature_requirement: SignatureRequirement,
}

#[derive(Serialize)]
struct HashedWorkload<'a> {
    version: u32,
    workload_type: WorkloadType,
    name: &'a str,
    data: &'a serde_json::Value,
}

#[derive(Serialize)]
struct HashedDeployment<'a> {
    version: u32,
    twin_id: TwinId,
    metadata: &'a str,
    workloads: Vec<HashedWorkload<'a>>,
    signature_requirement: &'a SignatureRequirement,
}

impl Deployment {
    /// Find a workload by name
    pub fn get(&self, name: &str) -> Option<&Workload> {
        self.workloads.iter().find(|w| w.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Workload> {
        self.workloads.iter_mut().find(|w| w.name == name)
    }

    /// Check structural rules a node enforces before accepting a deployment
    pub fn validate(&self) -> Result<()> {
        if self.workloads.is_empty() {
            return Err(ValidationError::NoWorkloads);
        }

        let mut names = HashSet::new();
        for workload in &self.workloads {
            if workload.name.is_empty() {
                return Err(ValidationError::EmptyWorkloadName);
            }
            if !names.insert(workload.name.as_str()) {
                return Err(ValidationError::DuplicateWorkload(workload.name.clone()));
            }
        }

        let available: u32 = self
            .signature_requirement
            .requests
            .iter()
            .map(|r| r.weight)
            .sum();
        let required = self.signature_requirement.weight_required;
        if required == 0 || available < required {
            return Err(ValidationError::UnreachableSignatureWeight {
                required,
                available,
            });
        }

        Ok(())
    }

    /// Content hash recorded on the node contract
    ///
    /// Covers everything the owner declares; results and the contract ID
    /// are excluded since the node and the registry fill them in.
    pub fn challenge_hash(&self) -> std::result::Result<String, serde_json::Error> {
        let view = HashedDeployment {
            version: self.version,
            twin_id: self.twin_id,
            metadata: &self.metadata,
            workloads: self
                .workloads
                .iter()
                .map(|w| HashedWorkload {
                    version: w.version,
                    workload_type: w.workload_type,
                    name: &w.name,
                    data: &w.data,
                })
                .collect(),
            signature_requirement: &self.signature_requirement,
        };
        let bytes = serde_json::to_vec(&view)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}
