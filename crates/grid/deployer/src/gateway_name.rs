//! Gateway name deployer
//!
//! Reconciles one user-declared gateway against its name contract, its
//! node deployment, and the workload state the node reports.
//!
//! Bookkeeping (`node_deployment_id`, `name_contract_id`, `id`) is written
//! as soon as each remote call completes, and the engine records node
//! contracts in `node_deployment_id` the moment they are created. A failed
//! or dropped call therefore leaves behind what actually exists on chain
//! and on the node. Two partial states are
//! reachable this way:
//!
//! - name contract live, no node deployment (deploy failed after the name
//!   was reserved)
//! - node deployment gone, name contract still set (cancel failed to
//!   release the name)
//!
//! Retrying `deploy` or `cancel` from either state converges.

use crate::config::DeployerConfig;
use crate::engine::{DeploymentEngine, DeploymentMap};
use crate::error::{DeployerError, Result};
use grid_node::{NodeClientPool, NodeError};
use grid_registry::ContractRegistry;
use grid_types::{
    ContractId, ContractMap, Deployment, GatewayNameProxy, GatewayProxyResult, Identity, NodeId,
    SignatureRequirement, WorkloadType,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Shared handles a deployer works through
///
/// Owned by the enclosing client and cloned into every deployer; all
/// handles must tolerate concurrent use.
#[derive(Clone)]
pub struct DeployerContext {
    pub identity: Arc<Identity>,
    pub registry: Arc<dyn ContractRegistry>,
    pub pool: Arc<dyn NodeClientPool>,
    pub engine: Arc<dyn DeploymentEngine>,
    pub config: DeployerConfig,
}

/// Persisted form of a gateway deployer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayNameState {
    #[serde(default)]
    pub id: String,
    pub node: NodeId,
    pub gw: GatewayNameProxy,
    #[serde(default)]
    pub node_deployment_id: ContractMap,
    #[serde(default)]
    pub name_contract_id: ContractId,
}

/// Reconciler for a single gateway name resource
///
/// Operations take `&mut self`; share a deployer between tasks only behind
/// a mutex.
pub struct GatewayNameDeployer {
    /// Opaque resource ID, empty while no deployment has committed
    pub id: String,
    pub node: NodeId,
    pub gw: GatewayNameProxy,
    pub node_deployment_id: ContractMap,
    pub name_contract_id: ContractId,
    ctx: DeployerContext,
}

impl std::fmt::Debug for GatewayNameDeployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayNameDeployer")
            .field("id", &self.id)
            .field("node", &self.node)
            .field("gw", &self.gw)
            .field("node_deployment_id", &self.node_deployment_id)
            .field("name_contract_id", &self.name_contract_id)
            .finish_non_exhaustive()
    }
}

impl GatewayNameDeployer {
    /// New deployer with empty bookkeeping
    pub fn new(node: NodeId, gw: GatewayNameProxy, ctx: DeployerContext) -> Self {
        Self {
            id: String::new(),
            node,
            gw,
            node_deployment_id: ContractMap::new(),
            name_contract_id: ContractId::NONE,
            ctx,
        }
    }

    /// Restore a deployer from persisted state
    pub fn from_state(state: GatewayNameState, ctx: DeployerContext) -> Self {
        Self {
            id: state.id,
            node: state.node,
            gw: state.gw,
            node_deployment_id: state.node_deployment_id,
            name_contract_id: state.name_contract_id,
            ctx,
        }
    }

    pub fn state(&self) -> GatewayNameState {
        GatewayNameState {
            id: self.id.clone(),
            node: self.node,
            gw: self.gw.clone(),
            node_deployment_id: self.node_deployment_id.clone(),
            name_contract_id: self.name_contract_id,
        }
    }

    /// Whether the deployer holds any on-chain contract
    pub fn is_live(&self) -> bool {
        !self.node_deployment_id.is_empty() || self.name_contract_id.is_some()
    }

    /// Check that the target node answers a version query
    #[instrument(skip(self), fields(node = %self.node))]
    pub async fn validate(&self) -> Result<()> {
        let probe = async {
            let client = self
                .ctx
                .pool
                .get_node_client(self.ctx.registry.as_ref(), self.node)
                .await?;
            let version = client.system_version().await?;
            Ok::<_, NodeError>(version)
        };

        let timeout = self.ctx.config.probe_timeout;
        match tokio::time::timeout(timeout, probe).await {
            Ok(Ok(version)) => {
                debug!(os = %version.os, agent = %version.agent, "Node reachable");
                Ok(())
            }
            Ok(Err(e)) => Err(self.unreachable(e)),
            Err(_) => Err(DeployerError::NodeUnreachable {
                node: self.node,
                reason: format!("no response within {}ms", timeout.as_millis()),
            }),
        }
    }

    fn unreachable(&self, error: NodeError) -> DeployerError {
        DeployerError::NodeUnreachable {
            node: self.node,
            reason: error.to_string(),
        }
    }

    /// Build the deployment this gateway needs, keyed by its node
    ///
    /// Versions are left at zero; the engine assigns them on commit.
    pub fn generate_versionless_deployments(&self) -> Result<DeploymentMap> {
        let twin_id = self.ctx.identity.twin_id();
        let workload = self.gw.to_workload().map_err(DeployerError::Encoding)?;

        let deployment = Deployment {
            version: 0,
            twin_id,
            contract_id: ContractId::NONE,
            metadata: String::new(),
            workloads: vec![workload],
            signature_requirement: SignatureRequirement::single(twin_id),
        };
        Ok(DeploymentMap::from([(self.node, deployment)]))
    }

    /// Reserve the name and commit the node deployment
    #[instrument(skip(self), fields(node = %self.node, name = %self.gw.name))]
    pub async fn deploy(&mut self) -> Result<()> {
        self.gw.validate()?;
        self.validate().await?;

        let registry = self.ctx.registry.as_ref();
        let identity = self.ctx.identity.as_ref();

        if self.name_contract_id.is_some() {
            self.name_contract_id = registry
                .invalidate_name_contract(identity, self.name_contract_id, &self.gw.name)
                .await?;
            if self.name_contract_id.is_none() {
                info!("Previous name contract released");
            }
        }
        if self.name_contract_id.is_none() {
            self.name_contract_id = registry
                .create_name_contract(identity, &self.gw.name)
                .await?;
            info!(contract_id = %self.name_contract_id, "Name contract created");
        }

        let deployments = self.generate_versionless_deployments()?;
        let result = self
            .ctx
            .engine
            .deploy(registry, &mut self.node_deployment_id, &deployments)
            .await;

        if let Err(e) = result {
            warn!(
                error = %e,
                contracts = ?self.node_deployment_id,
                "Deployment failed, keeping committed contracts"
            );
            return Err(e.into());
        }

        if self.id.is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
        info!(id = %self.id, contracts = ?self.node_deployment_id, "Gateway deployed");
        Ok(())
    }

    /// Tear down the node deployment, then release the name
    #[instrument(skip(self), fields(node = %self.node, name = %self.gw.name))]
    pub async fn cancel(&mut self) -> Result<()> {
        let registry = self.ctx.registry.as_ref();

        let result = self
            .ctx
            .engine
            .deploy(registry, &mut self.node_deployment_id, &DeploymentMap::new())
            .await;

        if let Err(e) = result {
            warn!(error = %e, contracts = ?self.node_deployment_id, "Teardown failed");
            return Err(e.into());
        }

        if self.name_contract_id.is_some() {
            registry
                .ensure_contract_canceled(&self.ctx.identity, self.name_contract_id)
                .await?;
            info!(contract_id = %self.name_contract_id, "Name contract released");
            self.name_contract_id = ContractId::NONE;
        }

        self.id.clear();
        info!("Gateway canceled");
        Ok(())
    }

    /// Drop bookkeeping for contracts the registry no longer considers valid
    #[instrument(skip(self), fields(node = %self.node, name = %self.gw.name))]
    pub async fn sync_contracts(&mut self) -> Result<()> {
        let registry = self.ctx.registry.as_ref();

        let valid = registry
            .delete_invalid_contracts(&self.node_deployment_id)
            .await?;
        if valid.len() != self.node_deployment_id.len() {
            warn!(
                before = ?self.node_deployment_id,
                after = ?valid,
                "Dropped invalid node contracts"
            );
        }
        self.node_deployment_id = valid;

        if self.name_contract_id.is_some()
            && !registry.is_valid_contract(self.name_contract_id).await?
        {
            warn!(contract_id = %self.name_contract_id, "Name contract is no longer valid");
            self.name_contract_id = ContractId::NONE;
            self.id.clear();
        }
        Ok(())
    }

    /// Reconcile bookkeeping with the registry, then observe the node
    ///
    /// Only the output field `gw.fqdn` is taken from the node. If the
    /// workload is gone, the desired state is reset so the caller sees the
    /// gateway as missing.
    #[instrument(skip(self), fields(node = %self.node, name = %self.gw.name))]
    pub async fn sync(&mut self) -> Result<()> {
        self.sync_contracts().await?;

        if self.node_deployment_id.is_empty() {
            debug!("No node deployment left");
            self.gw = GatewayNameProxy::default();
            return Ok(());
        }

        let deployments = self
            .ctx
            .engine
            .get_deployments(self.ctx.registry.as_ref(), &self.node_deployment_id)
            .await?;

        let workload = deployments.get(&self.node).and_then(|deployment| {
            deployment
                .workloads
                .iter()
                .find(|w| w.workload_type == WorkloadType::NamedProxy)
        });

        match workload {
            Some(workload) if workload.result.state.is_okay() => {
                let result: GatewayProxyResult =
                    serde_json::from_value(workload.result.data.clone()).map_err(|source| {
                        DeployerError::ResultDecode {
                            workload: workload.name.clone(),
                            source,
                        }
                    })?;
                debug!(fqdn = %result.fqdn, "Gateway resolved");
                self.gw.fqdn = result.fqdn;
            }
            other => {
                warn!(
                    state = ?other.map(|w| w.result.state),
                    "Gateway workload is not running on the node, resetting"
                );
                self.gw = GatewayNameProxy::default();
            }
        }
        Ok(())
    }
}
