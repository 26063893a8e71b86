//! Gateway name proxy payload
//!
//! `GatewayNameProxy` is the desired state a user declares. Only the
//! `GatewayNameProxyData` subset is sent to the node; `fqdn` is filled in
//! from the node's `GatewayProxyResult`.

use crate::deployment::{Workload, WorkloadResult, WorkloadType};
use crate::error::{Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a reserved gateway name
pub const MAX_NAME_LEN: usize = 50;

/// Upstream address a gateway forwards to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Backend(String);

impl Backend {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the address against the gateway mode
    ///
    /// With TLS passthrough the stream is forwarded untouched, so the
    /// address must name its port explicitly.
    pub fn validate(&self, tls_passthrough: bool) -> Result<()> {
        if self.0.is_empty() {
            return Err(self.invalid("address is empty"));
        }
        if self.0.chars().any(char::is_whitespace) {
            return Err(self.invalid("address contains whitespace"));
        }
        if tls_passthrough {
            let port = self
                .0
                .rsplit_once(':')
                .filter(|(host, _)| !host.is_empty() && !host.contains("://"))
                .and_then(|(_, port)| port.parse::<u16>().ok());
            if port.is_none() {
                return Err(self.invalid("tls passthrough requires a host:port address"));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> ValidationError {
        ValidationError::InvalidBackend {
            backend: self.0.clone(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Backend {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// Desired state of a gateway that exposes a reserved name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayNameProxy {
    pub name: String,

    #[serde(default)]
    pub tls_passthrough: bool,

    pub backends: Vec<Backend>,

    /// Resolved hostname, reported by the node
    #[serde(default)]
    pub fqdn: String,
}

/// Payload the node receives for a named-proxy workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayNameProxyData {
    pub name: String,
    pub tls_passthrough: bool,
    pub backends: Vec<Backend>,
}

/// Result payload the node reports for a named-proxy workload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayProxyResult {
    pub fqdn: String,
}

impl GatewayNameProxy {
    pub fn new(name: impl Into<String>, backends: Vec<Backend>) -> Self {
        Self {
            name: name.into(),
            backends,
            ..Default::default()
        }
    }

    pub fn with_tls_passthrough(mut self, tls_passthrough: bool) -> Self {
        self.tls_passthrough = tls_passthrough;
        self
    }

    /// True for the reset state: no name, no backends, no fqdn
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let len = self.name.chars().count();
        if len > MAX_NAME_LEN {
            return Err(ValidationError::NameTooLong {
                len,
                max: MAX_NAME_LEN,
            });
        }
        if let Some(c) = self
            .name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(ValidationError::InvalidNameCharacter(c));
        }

        if self.backends.is_empty() {
            return Err(ValidationError::NoBackends);
        }
        for backend in &self.backends {
            backend.validate(self.tls_passthrough)?;
        }
        Ok(())
    }

    /// Node-facing payload; `fqdn` is an output and never sent
    pub fn data(&self) -> GatewayNameProxyData {
        GatewayNameProxyData {
            name: self.name.clone(),
            tls_passthrough: self.tls_passthrough,
            backends: self.backends.clone(),
        }
    }

    /// Build the workload for this gateway, named after the gateway
    pub fn to_workload(&self) -> serde_json::Result<Workload> {
        Ok(Workload {
            version: 0,
            workload_type: WorkloadType::NamedProxy,
            name: self.name.clone(),
            data: serde_json::to_value(self.data())?,
            result: WorkloadResult::default(),
        })
    }
}
