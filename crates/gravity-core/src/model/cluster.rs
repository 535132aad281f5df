// ── Cluster-scoped configuration documents ──
//
// Small resources stored per cluster: SMTP, alerts, log forwarders,
// certificate, environment, configuration, persistent storage, auth
// gateway, plus read-only views (endpoints, nodes, audit events).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl SmtpConfig {
    pub fn check(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(CoreError::bad_parameter("SMTP host is required"));
        }
        if self.port == 0 {
            return Err(CoreError::bad_parameter("SMTP port is required"));
        }
        Ok(())
    }
}

/// Monitoring alert definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub name: String,
    /// Alerting expression.
    pub formula: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogForwarder {
    pub name: String,
    /// `host:port` of the remote syslog receiver.
    pub address: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "tcp".into()
}

impl LogForwarder {
    pub fn check(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CoreError::bad_parameter("log forwarder name is required"));
        }
        if self.address.is_empty() {
            return Err(CoreError::bad_parameter("log forwarder address is required"));
        }
        Ok(())
    }
}

/// Certificate served by the cluster web endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCertificate {
    pub certificate: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub private_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEnvironment {
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfiguration {
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentStorage {
    #[serde(default)]
    pub mount_exclude: Vec<String>,
    #[serde(default)]
    pub vendor_include: Vec<String>,
    #[serde(default)]
    pub device_exclude: Vec<String>,
}

/// Settings of the cluster's authentication gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGateway {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_users: Option<u32>,
    #[serde(default)]
    pub public_addr: Vec<String>,
}

/// One exposed application endpoint with its reachable addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    pub hostname: String,
    pub advertise_ip: String,
    pub role: String,
    pub profile: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}
