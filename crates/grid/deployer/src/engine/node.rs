//! Engine that drives node clients and the contract registry directly

use super::{DeploymentEngine, DeploymentMap};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use futures::future::try_join_all;
use grid_node::{NodeClient, NodeClientPool};
use grid_registry::ContractRegistry;
use grid_types::{ContractId, ContractMap, Deployment, Identity, NodeId, ResultState};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Deployment engine backed by a node client pool
pub struct NodeDeploymentEngine {
    identity: Arc<Identity>,
    pool: Arc<dyn NodeClientPool>,
    config: EngineConfig,
}

impl NodeDeploymentEngine {
    pub fn new(identity: Arc<Identity>, pool: Arc<dyn NodeClientPool>, config: EngineConfig) -> Self {
        Self {
            identity,
            pool,
            config,
        }
    }

    async fn client(
        &self,
        registry: &dyn ContractRegistry,
        node: NodeId,
    ) -> EngineResult<Arc<dyn NodeClient>> {
        self.pool
            .get_node_client(registry, node)
            .await
            .map_err(|source| EngineError::Node { node, source })
    }

    /// Create the node contract and submit the deployment
    ///
    /// The contract is recorded in `current` before the node is called, and
    /// dropped again only once it is canceled.
    async fn create(
        &self,
        registry: &dyn ContractRegistry,
        node: NodeId,
        mut deployment: Deployment,
        current: &mut ContractMap,
    ) -> EngineResult<()> {
        deployment
            .validate()
            .map_err(|source| EngineError::InvalidDeployment { node, source })?;
        let client = self.client(registry, node).await?;
        let hash = deployment
            .challenge_hash()
            .map_err(|source| EngineError::Encoding { node, source })?;

        let contract_id = registry
            .create_node_contract(&self.identity, node, &hash)
            .await
            .map_err(|source| EngineError::Registry { node, source })?;
        current.insert(node, contract_id);
        deployment.contract_id = contract_id;

        if let Err(source) = client.deployment_deploy(deployment).await {
            match registry
                .ensure_contract_canceled(&self.identity, contract_id)
                .await
            {
                Ok(()) => {
                    current.remove(&node);
                }
                Err(e) => warn!(
                    node = %node,
                    contract_id = %contract_id,
                    error = %e,
                    "Could not cancel contract of rejected deployment, keeping it for cleanup"
                ),
            }
            return Err(EngineError::Node { node, source });
        }

        info!(node = %node, contract_id = %contract_id, "Deployment created");
        self.wait(client.as_ref(), node, contract_id).await
    }

    async fn update(
        &self,
        registry: &dyn ContractRegistry,
        node: NodeId,
        contract_id: ContractId,
        mut deployment: Deployment,
    ) -> EngineResult<()> {
        let client = self.client(registry, node).await?;
        let current = client
            .deployment_get(contract_id)
            .await
            .map_err(|source| EngineError::Node { node, source })?;

        let next_version = current.version + 1;
        deployment.contract_id = contract_id;
        deployment.version = current.version;
        for workload in &mut deployment.workloads {
            workload.version = current
                .get(&workload.name)
                .filter(|old| old.workload_type == workload.workload_type && old.data == workload.data)
                .map(|old| old.version)
                .unwrap_or(next_version);
        }

        let unchanged = deployment.workloads.len() == current.workloads.len()
            && deployment.challenge_hash().ok() == current.challenge_hash().ok();
        if unchanged {
            debug!(node = %node, contract_id = %contract_id, "Deployment unchanged");
            return Ok(());
        }

        deployment.version = next_version;
        deployment
            .validate()
            .map_err(|source| EngineError::InvalidDeployment { node, source })?;
        let hash = deployment
            .challenge_hash()
            .map_err(|source| EngineError::Encoding { node, source })?;

        registry
            .update_node_contract(&self.identity, contract_id, &hash)
            .await
            .map_err(|source| EngineError::Registry { node, source })?;
        client
            .deployment_update(deployment)
            .await
            .map_err(|source| EngineError::Node { node, source })?;

        info!(node = %node, contract_id = %contract_id, version = next_version, "Deployment updated");
        self.wait(client.as_ref(), node, contract_id).await
    }

    /// Cancel the node contract, then ask the node to drop the deployment
    async fn delete(
        &self,
        registry: &dyn ContractRegistry,
        node: NodeId,
        contract_id: ContractId,
        current: &mut ContractMap,
    ) -> EngineResult<()> {
        registry
            .ensure_contract_canceled(&self.identity, contract_id)
            .await
            .map_err(|source| EngineError::Registry { node, source })?;
        current.remove(&node);

        // nodes drop deployments of canceled contracts on their own
        match self.client(registry, node).await {
            Ok(client) => match client.deployment_delete(contract_id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(node = %node, contract_id = %contract_id, error = %e, "Node did not delete deployment"),
            },
            Err(e) => warn!(node = %node, error = %e, "Node unavailable for deployment delete"),
        }

        info!(node = %node, contract_id = %contract_id, "Deployment deleted");
        Ok(())
    }

    /// Poll until every workload has a result
    async fn wait(
        &self,
        client: &dyn NodeClient,
        node: NodeId,
        contract_id: ContractId,
    ) -> EngineResult<()> {
        let deadline = Instant::now() + self.config.deploy_timeout;
        loop {
            let deployment = client
                .deployment_get(contract_id)
                .await
                .map_err(|source| EngineError::Node { node, source })?;

            let pending = deployment
                .workloads
                .iter()
                .any(|w| w.result.state == ResultState::Init);
            if !pending {
                if let Some(failed) = deployment
                    .workloads
                    .iter()
                    .find(|w| w.result.state == ResultState::Error)
                {
                    return Err(EngineError::WorkloadFailed {
                        node,
                        workload: failed.name.clone(),
                        reason: failed.result.error.clone(),
                    });
                }
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(EngineError::Timeout { node, contract_id });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[async_trait]
impl DeploymentEngine for NodeDeploymentEngine {
    #[instrument(skip_all, fields(previous = contracts.len(), desired = deployments.len()))]
    async fn deploy(
        &self,
        registry: &dyn ContractRegistry,
        contracts: &mut ContractMap,
        deployments: &DeploymentMap,
    ) -> EngineResult<()> {
        for (node, deployment) in deployments {
            let result = match contracts.get(node).copied() {
                None => {
                    self.create(registry, *node, deployment.clone(), contracts)
                        .await
                }
                Some(contract_id) => {
                    self.update(registry, *node, contract_id, deployment.clone())
                        .await
                }
            };
            if let Err(e) = result {
                warn!(node = %node, error = %e, "Deployment failed");
                return Err(e);
            }
        }

        let stale: Vec<(NodeId, ContractId)> = contracts
            .iter()
            .filter(|(node, _)| !deployments.contains_key(node))
            .map(|(node, contract_id)| (*node, *contract_id))
            .collect();
        for (node, contract_id) in stale {
            if let Err(e) = self.delete(registry, node, contract_id, contracts).await {
                warn!(node = %node, error = %e, "Deployment teardown failed");
                return Err(e);
            }
        }

        Ok(())
    }

    #[instrument(skip_all, fields(contracts = contracts.len()))]
    async fn get_deployments(
        &self,
        registry: &dyn ContractRegistry,
        contracts: &ContractMap,
    ) -> EngineResult<DeploymentMap> {
        let fetches = contracts.iter().map(|(node, contract_id)| async move {
            let client = self.client(registry, *node).await?;
            let deployment = client
                .deployment_get(*contract_id)
                .await
                .map_err(|source| EngineError::Node {
                    node: *node,
                    source,
                })?;
            Ok::<_, EngineError>((*node, deployment))
        });

        let deployments = try_join_all(fetches).await?;
        Ok(deployments.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeployerConfig;
    use crate::testing::StalledPool;
    use grid_node::{InMemoryNode, InMemoryNodeClientPool, NodeError};
    use grid_registry::InMemoryContractRegistry;
    use grid_types::{GatewayNameProxy, SignatureRequirement, TwinId};
    use std::time::Duration;

    struct Harness {
        registry: InMemoryContractRegistry,
        pool: Arc<InMemoryNodeClientPool>,
        engine: NodeDeploymentEngine,
    }

    fn harness(nodes: &[u32]) -> Harness {
        let identity = Arc::new(Identity::from_seed(TwinId::new(11), &[3u8; 32]));
        let pool = Arc::new(InMemoryNodeClientPool::new());
        for id in nodes {
            pool.add_node(Arc::new(InMemoryNode::new(
                NodeId::new(*id),
                format!("gw{}.grid.test", id),
            )));
        }
        let engine = NodeDeploymentEngine::new(
            identity,
            pool.clone(),
            DeployerConfig::for_testing().engine,
        );
        Harness {
            registry: InMemoryContractRegistry::with_first_id(100),
            pool,
            engine,
        }
    }

    fn deployment(name: &str, backend: &str) -> Deployment {
        let gw = GatewayNameProxy::new(name, vec![backend.into()]);
        Deployment {
            version: 0,
            twin_id: TwinId::new(11),
            contract_id: ContractId::NONE,
            metadata: String::new(),
            workloads: vec![gw.to_workload().unwrap()],
            signature_requirement: SignatureRequirement::single(TwinId::new(11)),
        }
    }

    #[tokio::test]
    async fn test_create_records_contract() {
        let h = harness(&[10]);
        let desired = DeploymentMap::from([(NodeId::new(10), deployment("name", "a"))]);

        let mut contracts = ContractMap::new();
        h.engine
            .deploy(&h.registry, &mut contracts, &desired)
            .await
            .unwrap();

        assert_eq!(contracts, ContractMap::from([(NodeId::new(10), ContractId::new(100))]));
        let node = h.pool.node(NodeId::new(10)).unwrap();
        assert!(node.deployment(ContractId::new(100)).is_some());
    }

    #[tokio::test]
    async fn test_update_bumps_version_only_on_change() {
        let h = harness(&[10]);
        let desired = DeploymentMap::from([(NodeId::new(10), deployment("name", "a"))]);
        let mut contracts = ContractMap::new();
        h.engine
            .deploy(&h.registry, &mut contracts, &desired)
            .await
            .unwrap();
        let created = contracts.clone();
        let node = h.pool.node(NodeId::new(10)).unwrap();

        h.engine
            .deploy(&h.registry, &mut contracts, &desired)
            .await
            .unwrap();
        assert_eq!(contracts, created);
        assert_eq!(node.deployment(ContractId::new(100)).unwrap().version, 0);

        let changed = DeploymentMap::from([(NodeId::new(10), deployment("name", "b"))]);
        h.engine
            .deploy(&h.registry, &mut contracts, &changed)
            .await
            .unwrap();
        assert_eq!(contracts, created);
        let stored = node.deployment(ContractId::new(100)).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.workloads[0].version, 1);
    }

    #[tokio::test]
    async fn test_empty_target_tears_down() {
        let h = harness(&[10]);
        let desired = DeploymentMap::from([(NodeId::new(10), deployment("name", "a"))]);
        let mut contracts = ContractMap::new();
        h.engine
            .deploy(&h.registry, &mut contracts, &desired)
            .await
            .unwrap();

        h.engine
            .deploy(&h.registry, &mut contracts, &DeploymentMap::new())
            .await
            .unwrap();

        assert!(contracts.is_empty());
        assert!(!h.registry.is_valid_contract(ContractId::new(100)).await.unwrap());
        assert_eq!(h.pool.node(NodeId::new(10)).unwrap().deployment_count(), 0);
    }

    #[tokio::test]
    async fn test_partial_progress_is_reported() {
        let h = harness(&[10, 20]);
        h.pool.node(NodeId::new(20)).unwrap().set_reachable(false);
        let desired = DeploymentMap::from([
            (NodeId::new(10), deployment("first", "a")),
            (NodeId::new(20), deployment("second", "a")),
        ]);

        let mut contracts = ContractMap::new();
        let result = h.engine.deploy(&h.registry, &mut contracts, &desired).await;

        assert!(matches!(
            result,
            Err(EngineError::Node {
                source: NodeError::Unreachable { .. },
                ..
            })
        ));
        // node 10 committed; the contract for the rejected node 20 was released
        assert_eq!(contracts, ContractMap::from([(NodeId::new(10), ContractId::new(100))]));
        assert!(!h.registry.is_valid_contract(ContractId::new(101)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_deploy_keeps_created_contract() {
        let registry = InMemoryContractRegistry::with_first_id(100);
        let pool = Arc::new(StalledPool::default());
        let engine = NodeDeploymentEngine::new(
            Arc::new(Identity::from_seed(TwinId::new(11), &[3u8; 32])),
            pool.clone(),
            DeployerConfig::for_testing().engine,
        );
        let desired = DeploymentMap::from([(NodeId::new(10), deployment("name", "a"))]);

        let mut contracts = ContractMap::new();
        let elapsed = tokio::time::timeout(
            Duration::from_millis(100),
            engine.deploy(&registry, &mut contracts, &desired),
        )
        .await;

        assert!(elapsed.is_err());
        assert_eq!(contracts, ContractMap::from([(NodeId::new(10), ContractId::new(100))]));
        assert!(registry.is_valid_contract(ContractId::new(100)).await.unwrap());
        assert_eq!(pool.node.deployment_count(), 1);

        // the recorded contract is enough to tear the deployment down
        engine
            .deploy(&registry, &mut contracts, &DeploymentMap::new())
            .await
            .unwrap();
        assert!(contracts.is_empty());
        assert_eq!(registry.active_count(), 0);
        assert_eq!(pool.node.deployment_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_node_times_out() {
        let registry = InMemoryContractRegistry::with_first_id(100);
        let engine = NodeDeploymentEngine::new(
            Arc::new(Identity::from_seed(TwinId::new(11), &[3u8; 32])),
            Arc::new(StalledPool::default()),
            DeployerConfig::for_testing().engine,
        );
        let desired = DeploymentMap::from([(NodeId::new(10), deployment("name", "a"))]);

        let mut contracts = ContractMap::new();
        let err = engine
            .deploy(&registry, &mut contracts, &desired)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Timeout { .. }));
        assert_eq!(contracts, ContractMap::from([(NodeId::new(10), ContractId::new(100))]));
    }

    #[tokio::test]
    async fn test_get_deployments_fetches_every_node() {
        let h = harness(&[10, 20]);
        let desired = DeploymentMap::from([
            (NodeId::new(10), deployment("first", "a")),
            (NodeId::new(20), deployment("second", "a")),
        ]);
        let mut contracts = ContractMap::new();
        h.engine
            .deploy(&h.registry, &mut contracts, &desired)
            .await
            .unwrap();

        let fetched = h.engine.get_deployments(&h.registry, &contracts).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[&NodeId::new(20)].workloads[0].name, "second");
        assert_eq!(
            fetched[&NodeId::new(10)].workloads[0].result.state,
            ResultState::Ok
        );
    }
}
