//! In-memory node and client pool
//!
//! `InMemoryNode` stores deployments the way a node agent would and reports
//! results for them. Used for development and by the deployer's
//! integration tests.

use crate::client::{NodeClient, NodeClientPool, SystemVersion};
use crate::error::{NodeError, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use grid_registry::ContractRegistry;
use grid_types::{
    ContractId, Deployment, GatewayProxyResult, NodeId, ResultState, Workload, WorkloadResult,
    WorkloadType,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// A node that keeps its deployments in memory
pub struct InMemoryNode {
    node: NodeId,
    /// Domain gateway names are published under
    domain: String,
    version: SystemVersion,
    reachable: AtomicBool,
    deployments: DashMap<ContractId, Deployment>,
}

impl InMemoryNode {
    pub fn new(node: NodeId, domain: impl Into<String>) -> Self {
        Self {
            node,
            domain: domain.into(),
            version: SystemVersion {
                os: "v3.0.0".into(),
                agent: "v0.5.0".into(),
            },
            reachable: AtomicBool::new(true),
            deployments: DashMap::new(),
        }
    }

    /// Simulate the node dropping off (or returning to) the network
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Stored deployment, results included
    pub fn deployment(&self, contract_id: ContractId) -> Option<Deployment> {
        self.deployments.get(&contract_id).map(|d| d.clone())
    }

    pub fn deployment_count(&self) -> usize {
        self.deployments.len()
    }

    /// Mark a workload deleted, as the node does when it decommissions one
    /// on its own. Returns false if no such workload exists.
    pub fn delete_workload(&self, contract_id: ContractId, name: &str) -> bool {
        let Some(mut deployment) = self.deployments.get_mut(&contract_id) else {
            return false;
        };
        match deployment.get_mut(name) {
            Some(workload) => {
                workload.result = WorkloadResult {
                    created: Some(Utc::now()),
                    state: ResultState::Deleted,
                    error: String::new(),
                    data: serde_json::Value::Null,
                };
                true
            }
            None => false,
        }
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(NodeError::Unreachable {
                node: self.node,
                reason: "connection refused".into(),
            })
        }
    }

    fn provision(&self, workload: &Workload) -> WorkloadResult {
        match workload.workload_type {
            WorkloadType::NamedProxy => {
                let fqdn = format!("{}.{}", workload.name, self.domain);
                match serde_json::to_value(GatewayProxyResult { fqdn }) {
                    Ok(data) => WorkloadResult {
                        created: Some(Utc::now()),
                        state: ResultState::Ok,
                        error: String::new(),
                        data,
                    },
                    Err(e) => WorkloadResult {
                        created: Some(Utc::now()),
                        state: ResultState::Error,
                        error: e.to_string(),
                        data: serde_json::Value::Null,
                    },
                }
            }
        }
    }

    /// Fill in results, keeping those of workloads whose version is unchanged
    fn apply(&self, deployment: &mut Deployment, previous: Option<&Deployment>) {
        for workload in &mut deployment.workloads {
            let kept = previous
                .and_then(|p| p.get(&workload.name))
                .filter(|old| old.version == workload.version && old.data == workload.data)
                .map(|old| old.result.clone());
            workload.result = match kept {
                Some(result) => result,
                None => self.provision(workload),
            };
        }
    }
}

#[async_trait]
impl NodeClient for InMemoryNode {
    fn node_id(&self) -> NodeId {
        self.node
    }

    async fn system_version(&self) -> Result<SystemVersion> {
        self.ensure_reachable()?;
        Ok(self.version.clone())
    }

    async fn deployment_deploy(&self, mut deployment: Deployment) -> Result<()> {
        self.ensure_reachable()?;
        deployment.validate()?;

        let contract_id = deployment.contract_id;
        if self.deployments.contains_key(&contract_id) {
            return Err(NodeError::DeploymentExists {
                node: self.node,
                contract_id,
            });
        }

        self.apply(&mut deployment, None);
        self.deployments.insert(contract_id, deployment);
        info!(node = %self.node, contract_id = %contract_id, "Deployment accepted");
        Ok(())
    }

    async fn deployment_update(&self, mut deployment: Deployment) -> Result<()> {
        self.ensure_reachable()?;
        deployment.validate()?;

        let contract_id = deployment.contract_id;
        let previous = self
            .deployment(contract_id)
            .ok_or(NodeError::DeploymentNotFound {
                node: self.node,
                contract_id,
            })?;
        if deployment.version <= previous.version {
            return Err(NodeError::StaleVersion {
                contract_id,
                current: previous.version,
                proposed: deployment.version,
            });
        }

        self.apply(&mut deployment, Some(&previous));
        self.deployments.insert(contract_id, deployment);
        info!(node = %self.node, contract_id = %contract_id, "Deployment updated");
        Ok(())
    }

    async fn deployment_get(&self, contract_id: ContractId) -> Result<Deployment> {
        self.ensure_reachable()?;
        self.deployment(contract_id)
            .ok_or(NodeError::DeploymentNotFound {
                node: self.node,
                contract_id,
            })
    }

    async fn deployment_delete(&self, contract_id: ContractId) -> Result<()> {
        self.ensure_reachable()?;
        match self.deployments.remove(&contract_id) {
            Some(_) => {
                info!(node = %self.node, contract_id = %contract_id, "Deployment deleted");
                Ok(())
            }
            None => Err(NodeError::DeploymentNotFound {
                node: self.node,
                contract_id,
            }),
        }
    }
}

/// Pool over a fixed set of in-memory nodes
pub struct InMemoryNodeClientPool {
    nodes: DashMap<NodeId, Arc<InMemoryNode>>,
}

impl InMemoryNodeClientPool {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    pub fn add_node(&self, node: Arc<InMemoryNode>) {
        self.nodes.insert(node.node_id(), node);
    }

    pub fn node(&self, node: NodeId) -> Option<Arc<InMemoryNode>> {
        self.nodes.get(&node).map(|n| Arc::clone(&n))
    }
}

impl Default for InMemoryNodeClientPool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeClientPool for InMemoryNodeClientPool {
    async fn get_node_client(
        &self,
        _registry: &dyn ContractRegistry,
        node: NodeId,
    ) -> Result<Arc<dyn NodeClient>> {
        debug!(node = %node, "Resolving node client");
        let client = self.node(node).ok_or(NodeError::NodeNotFound(node))?;
        Ok(client)
    }
}
