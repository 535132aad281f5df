// ── Agent-reported server information ──

use serde::{Deserialize, Serialize};

/// System information one install/expand agent reports about its server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub hostname: String,
    pub advertise_addr: String,
    /// Node profile the agent was started with.
    pub role: String,
    #[serde(default)]
    pub os: OsInfo,
    #[serde(default)]
    pub num_cpus: u32,
    #[serde(default)]
    pub memory_mb: u64,
    #[serde(default)]
    pub volumes: Vec<VolumeInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub path: String,
    pub free_mb: u64,
}

/// A set of server infos, searchable by address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerInfos(pub Vec<ServerInfo>);

impl ServerInfos {
    pub fn find_by_ip(&self, addr: &str) -> Option<&ServerInfo> {
        self.0.iter().find(|info| info.advertise_addr == addr)
    }
}

impl From<Vec<ServerInfo>> for ServerInfos {
    fn from(infos: Vec<ServerInfo>) -> Self {
        Self(infos)
    }
}

/// Snapshot of the servers connected to an operation's agents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReport {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub servers: Vec<ServerInfo>,
}
