//! Deployer configuration
//!
//! Bounds the remote calls the deployer and the engine make. Loading these
//! values from files or flags is left to the embedding binary.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the gateway deployer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployerConfig {
    /// Timeout of the node liveness probe
    #[serde(with = "duration_serde")]
    pub probe_timeout: Duration,

    /// Engine configuration
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(10),
            engine: EngineConfig::default(),
        }
    }
}

impl DeployerConfig {
    /// Short timeouts for tests against in-memory backends
    pub fn for_testing() -> Self {
        Self {
            probe_timeout: Duration::from_millis(200),
            engine: EngineConfig {
                poll_interval: Duration::from_millis(5),
                deploy_timeout: Duration::from_millis(500),
            },
        }
    }
}

/// Configuration for the node deployment engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between polls while waiting for workload results
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// How long a node may take to report results for a deployment
    #[serde(with = "duration_serde")]
    pub deploy_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            deploy_timeout: Duration::from_secs(120),
        }
    }
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
