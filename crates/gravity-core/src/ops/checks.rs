//! Preflight checks against servers joining a cluster.
//!
//! [`check_servers`] merges agent-reported server information with the
//! cluster's server list, derives requirements from each server's node
//! profile, and runs the checks through a [`Remote`]. [`RemoteCommands`]
//! is the `Remote` that proxies to an [`AgentService`] bound to one
//! operation.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::model::{Manifest, Requirements, Server, ServerInfo, ServerInfos, SiteOperationKey};
use crate::ops::agents::AgentService;

// ── Probes ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProbeSeverity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProbeStatus {
    Running,
    Failed,
}

/// Outcome of one check on one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub checker: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub error: String,
    pub status: ProbeStatus,
    pub severity: ProbeSeverity,
}

impl Probe {
    pub fn failed(checker: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            checker: checker.into(),
            detail: String::new(),
            error: error.into(),
            status: ProbeStatus::Failed,
            severity: ProbeSeverity::Critical,
        }
    }

    pub fn warning(checker: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            severity: ProbeSeverity::Warning,
            ..Self::failed(checker, error)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == ProbeStatus::Failed
    }
}

/// Result of validating a set of servers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateServersResponse {
    pub probes: Vec<Probe>,
}

impl ValidateServersResponse {
    /// Failed probes of warning severity.
    pub fn warnings(&self) -> Vec<&Probe> {
        self.probes
            .iter()
            .filter(|p| p.is_failed() && p.severity == ProbeSeverity::Warning)
            .collect()
    }

    /// Failed probes of critical severity.
    pub fn failures(&self) -> Vec<&Probe> {
        self.probes
            .iter()
            .filter(|p| p.is_failed() && p.severity == ProbeSeverity::Critical)
            .collect()
    }
}

/// Collapse failed probes into one human-readable `BadParameter`.
///
/// Meant for display only; callers that need individual failures use
/// [`ValidateServersResponse::failures`].
pub fn format_validation_error(probes: &[&Probe]) -> CoreError {
    let mut message = String::from("The following checks failed:");
    for probe in probes {
        let _ = write!(message, "\n[×] {}", probe.error);
        if !probe.detail.is_empty() {
            let _ = write!(message, " ({})", probe.detail);
        }
    }
    CoreError::bad_parameter(message)
}

// ── Remote commands ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortsRequest {
    /// Servers that listen, by address.
    pub listen: Vec<String>,
    pub tcp_ports: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthRequest {
    pub addrs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub profile: String,
    pub requirements: Requirements,
}

/// Commands that reach the servers under test.
#[async_trait]
pub trait Remote: Send + Sync {
    async fn exec(&self, addr: &str, args: &[String]) -> Result<Bytes>;
    async fn check_ports(&self, req: PortsRequest) -> Result<Vec<Probe>>;
    async fn check_bandwidth(&self, req: BandwidthRequest) -> Result<Vec<Probe>>;
    async fn check_disks(&self, addr: &str, req: DiskRequest) -> Result<Vec<Probe>>;
    async fn validate(&self, addr: &str, req: ValidateRequest) -> Result<Vec<Probe>>;
}

/// A [`Remote`] bound to exactly one operation. Every call goes to the
/// agents of that operation.
#[derive(Clone)]
pub struct RemoteCommands {
    key: SiteOperationKey,
    agents: Arc<dyn AgentService>,
}

impl RemoteCommands {
    pub fn new(key: SiteOperationKey, agents: Arc<dyn AgentService>) -> Self {
        Self { key, agents }
    }

    pub fn key(&self) -> &SiteOperationKey {
        &self.key
    }
}

#[async_trait]
impl Remote for RemoteCommands {
    async fn exec(&self, addr: &str, args: &[String]) -> Result<Bytes> {
        self.agents.exec(&self.key, addr, args).await
    }

    async fn check_ports(&self, req: PortsRequest) -> Result<Vec<Probe>> {
        self.agents.check_ports(&self.key, req).await
    }

    async fn check_bandwidth(&self, req: BandwidthRequest) -> Result<Vec<Probe>> {
        self.agents.check_bandwidth(&self.key, req).await
    }

    async fn check_disks(&self, addr: &str, req: DiskRequest) -> Result<Vec<Probe>> {
        self.agents.check_disks(&self.key, addr, req).await
    }

    async fn validate(&self, addr: &str, req: ValidateRequest) -> Result<Vec<Probe>> {
        self.agents.validate(&self.key, addr, req).await
    }
}

// ── Local requirement checks ─────────────────────────────────────────

/// Compare reported server information with a profile's requirements.
pub fn check_requirements(info: &ServerInfo, requirements: &Requirements) -> Vec<Probe> {
    let mut probes = Vec::new();
    let host = &info.hostname;

    if info.num_cpus < requirements.min_cpus {
        probes.push(Probe::failed(
            "cpu",
            format!(
                "server {host} has {} CPUs, at least {} required",
                info.num_cpus, requirements.min_cpus
            ),
        ));
    }
    if info.memory_mb < requirements.min_ram_mb {
        probes.push(Probe::failed(
            "ram",
            format!(
                "server {host} has {}MB RAM, at least {}MB required",
                info.memory_mb, requirements.min_ram_mb
            ),
        ));
    }
    if !requirements.os.is_empty()
        && !requirements
            .os
            .iter()
            .any(|os| os.eq_ignore_ascii_case(&info.os.name))
    {
        probes.push(Probe::failed(
            "os",
            format!(
                "server {host} runs unsupported OS {:?}, supported: {}",
                info.os.name,
                requirements.os.join(", ")
            ),
        ));
    }
    for volume in &requirements.volumes {
        match info.volumes.iter().find(|v| v.path == volume.path) {
            Some(found) if found.free_mb < volume.min_free_mb => probes.push(Probe::failed(
                "disk",
                format!(
                    "server {host} has {}MB free on {}, at least {}MB required",
                    found.free_mb, volume.path, volume.min_free_mb
                ),
            )),
            Some(_) => {}
            None => probes.push(Probe::warning(
                "disk",
                format!("server {host} did not report volume {}", volume.path),
            )),
        }
    }

    probes
}

// ── Server checks ────────────────────────────────────────────────────

/// Inputs of one preflight run.
pub struct CheckServersRequest<'a> {
    /// Servers of the cluster (or of the operation) to check.
    pub servers: &'a [Server],
    /// What the agents reported.
    pub infos: &'a ServerInfos,
    pub manifest: &'a Manifest,
}

/// Run local and remote checks for every server.
///
/// Each server must have reported through an agent and its role must name
/// a profile of the manifest.
pub async fn check_servers(
    remote: &dyn Remote,
    req: CheckServersRequest<'_>,
) -> Result<ValidateServersResponse> {
    let mut probes = Vec::new();
    let mut tcp_ports: Vec<u16> = Vec::new();

    for server in req.servers {
        let info = req.infos.find_by_ip(&server.advertise_ip).ok_or_else(|| {
            CoreError::bad_parameter(format!(
                "no agent information for server {} ({})",
                server.hostname, server.advertise_ip
            ))
        })?;
        let profile = req.manifest.profile(&server.role).map_err(|_| {
            CoreError::bad_parameter(format!(
                "server {} has unknown role {:?}",
                server.hostname, server.role
            ))
        })?;
        debug!(server = %server.hostname, profile = %profile.name, "Checking server");

        probes.extend(check_requirements(info, &profile.requirements));
        probes.extend(
            remote
                .validate(
                    &server.advertise_ip,
                    ValidateRequest {
                        profile: profile.name.clone(),
                        requirements: profile.requirements.clone(),
                    },
                )
                .await?,
        );
        if !profile.requirements.volumes.is_empty() {
            let paths = profile
                .requirements
                .volumes
                .iter()
                .map(|v| v.path.clone())
                .collect();
            probes.extend(
                remote
                    .check_disks(&server.advertise_ip, DiskRequest { paths })
                    .await?,
            );
        }
        for port in &profile.requirements.tcp_ports {
            if !tcp_ports.contains(port) {
                tcp_ports.push(*port);
            }
        }
    }

    if req.servers.len() > 1 {
        let addrs: Vec<String> = req.servers.iter().map(|s| s.advertise_ip.clone()).collect();
        if !tcp_ports.is_empty() {
            probes.extend(
                remote
                    .check_ports(PortsRequest {
                        listen: addrs.clone(),
                        tcp_ports,
                    })
                    .await?,
            );
        }
        probes.extend(remote.check_bandwidth(BandwidthRequest { addrs }).await?);
    }

    Ok(ValidateServersResponse { probes })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model::{ClusterRole, NodeProfile, OsInfo, VolumeInfo, VolumeRequirement};

    #[derive(Default)]
    struct RecordingRemote {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingRemote {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl Remote for RecordingRemote {
        async fn exec(&self, addr: &str, _args: &[String]) -> Result<Bytes> {
            self.record(format!("exec {addr}"));
            Ok(Bytes::new())
        }

        async fn check_ports(&self, req: PortsRequest) -> Result<Vec<Probe>> {
            self.record(format!("ports {:?}", req.tcp_ports));
            Ok(Vec::new())
        }

        async fn check_bandwidth(&self, req: BandwidthRequest) -> Result<Vec<Probe>> {
            self.record(format!("bandwidth {}", req.addrs.len()));
            Ok(Vec::new())
        }

        async fn check_disks(&self, addr: &str, _req: DiskRequest) -> Result<Vec<Probe>> {
            self.record(format!("disks {addr}"));
            Ok(Vec::new())
        }

        async fn validate(&self, addr: &str, req: ValidateRequest) -> Result<Vec<Probe>> {
            self.record(format!("validate {addr} {}", req.profile));
            Ok(vec![Probe::warning("kernel", "old kernel")])
        }
    }

    fn manifest() -> Manifest {
        Manifest {
            profiles: vec![NodeProfile {
                name: "master".into(),
                description: String::new(),
                requirements: Requirements {
                    min_cpus: 2,
                    min_ram_mb: 4096,
                    os: vec!["ubuntu".into()],
                    tcp_ports: vec![6443, 2379],
                    volumes: vec![VolumeRequirement {
                        path: "/var/lib/gravity".into(),
                        min_free_mb: 10_000,
                    }],
                },
            }],
            ..Default::default()
        }
    }

    fn info(addr: &str, cpus: u32) -> ServerInfo {
        ServerInfo {
            hostname: format!("node-{addr}"),
            advertise_addr: addr.into(),
            role: "master".into(),
            os: OsInfo {
                name: "Ubuntu".into(),
                version: "18.04".into(),
            },
            num_cpus: cpus,
            memory_mb: 8192,
            volumes: vec![VolumeInfo {
                path: "/var/lib/gravity".into(),
                free_mb: 50_000,
            }],
        }
    }

    fn server(addr: &str) -> Server {
        Server {
            advertise_ip: addr.into(),
            hostname: format!("node-{addr}"),
            role: "master".into(),
            cluster_role: ClusterRole::Master,
            instance_type: None,
        }
    }

    #[test]
    fn requirements_flag_small_servers() {
        let probes = check_requirements(&info("10.0.0.1", 1), &manifest().profiles[0].requirements);
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].checker, "cpu");
        assert!(probes[0].is_failed());
    }

    #[test]
    fn warnings_and_failures_split() {
        let resp = ValidateServersResponse {
            probes: vec![
                Probe::failed("cpu", "too few CPUs"),
                Probe::warning("disk", "slow disk"),
            ],
        };
        assert_eq!(resp.failures().len(), 1);
        assert_eq!(resp.warnings().len(), 1);

        let err = format_validation_error(&resp.failures());
        assert!(err.is_bad_parameter());
        assert!(err.to_string().contains("too few CPUs"));
    }

    #[tokio::test]
    async fn check_servers_drives_remote() {
        let remote = RecordingRemote::default();
        let servers = vec![server("10.0.0.1"), server("10.0.0.2")];
        let infos = ServerInfos(vec![info("10.0.0.1", 4), info("10.0.0.2", 4)]);
        let manifest = manifest();

        let resp = check_servers(
            &remote,
            CheckServersRequest {
                servers: &servers,
                infos: &infos,
                manifest: &manifest,
            },
        )
        .await
        .unwrap();

        assert!(resp.failures().is_empty());
        assert_eq!(resp.warnings().len(), 2);

        let calls = remote.calls.lock().unwrap().clone();
        assert!(calls.contains(&"validate 10.0.0.1 master".to_owned()));
        assert!(calls.contains(&"disks 10.0.0.2".to_owned()));
        assert!(calls.contains(&"ports [6443, 2379]".to_owned()));
        assert!(calls.contains(&"bandwidth 2".to_owned()));
    }

    #[tokio::test]
    async fn check_servers_requires_agent_info() {
        let remote = RecordingRemote::default();
        let servers = vec![server("10.0.0.9")];
        let infos = ServerInfos(vec![info("10.0.0.1", 4)]);
        let manifest = manifest();

        let err = check_servers(
            &remote,
            CheckServersRequest {
                servers: &servers,
                infos: &infos,
                manifest: &manifest,
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_bad_parameter());
    }
}
