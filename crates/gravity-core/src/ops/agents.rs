//! Remote agent coordination during install and expand.
//!
//! Agents run on the servers joining a cluster. They report system
//! information and execute commands on behalf of one operation. The RPC
//! layer behind [`AgentService`] lives outside this crate.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::model::{AgentReport, Flavor, ServerInfo, ServerInfos, SiteOperationKey};
use crate::ops::checks::{BandwidthRequest, DiskRequest, PortsRequest, Probe, ValidateRequest};

/// Agent RPC surface, always scoped to one operation.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// System information of every agent connected for the operation.
    async fn get_server_infos(&self, key: &SiteOperationKey) -> Result<ServerInfos>;

    /// Run a command on the server at `addr` and return its combined output.
    async fn exec(&self, key: &SiteOperationKey, addr: &str, args: &[String]) -> Result<Bytes>;

    /// Listen on and dial the requested ports between servers.
    async fn check_ports(&self, key: &SiteOperationKey, req: PortsRequest) -> Result<Vec<Probe>>;

    async fn check_bandwidth(
        &self,
        key: &SiteOperationKey,
        req: BandwidthRequest,
    ) -> Result<Vec<Probe>>;

    async fn check_disks(
        &self,
        key: &SiteOperationKey,
        addr: &str,
        req: DiskRequest,
    ) -> Result<Vec<Probe>>;

    /// Validate the server at `addr` against a node profile.
    async fn validate(
        &self,
        key: &SiteOperationKey,
        addr: &str,
        req: ValidateRequest,
    ) -> Result<Vec<Probe>>;

    /// Tell every agent of the operation to shut down.
    async fn stop_agents(&self, key: &SiteOperationKey) -> Result<()>;
}

/// Servers added and removed between two reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportDiff {
    pub added: Vec<ServerInfo>,
    /// `None` when there was no previous report.
    pub removed: Option<Vec<ServerInfo>>,
}

/// Remaining node counts per profile and servers beyond the flavor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlavorMatch {
    /// Only profiles still short of servers. Satisfied profiles are absent.
    pub needed: BTreeMap<String, u32>,
    pub extra: Vec<ServerInfo>,
}

impl FlavorMatch {
    pub fn is_satisfied(&self) -> bool {
        self.needed.is_empty()
    }
}

impl AgentReport {
    /// Servers that joined or left since `previous`, by advertise address.
    pub fn diff(&self, previous: Option<&AgentReport>) -> ReportDiff {
        let Some(previous) = previous else {
            return ReportDiff {
                added: self.servers.clone(),
                removed: None,
            };
        };

        let current: HashSet<&str> = self
            .servers
            .iter()
            .map(|s| s.advertise_addr.as_str())
            .collect();
        let before: HashSet<&str> = previous
            .servers
            .iter()
            .map(|s| s.advertise_addr.as_str())
            .collect();

        let added = self
            .servers
            .iter()
            .filter(|s| !before.contains(s.advertise_addr.as_str()))
            .cloned()
            .collect();
        let removed = previous
            .servers
            .iter()
            .filter(|s| !current.contains(s.advertise_addr.as_str()))
            .cloned()
            .collect();

        ReportDiff {
            added,
            removed: Some(removed),
        }
    }

    /// Match connected servers against `flavor`.
    ///
    /// Each server decrements the count of its role. A role reaching zero
    /// leaves the map, so later servers with that role count as extra.
    pub fn match_flavor(&self, flavor: &Flavor) -> FlavorMatch {
        let mut needed: BTreeMap<String, u32> = flavor
            .nodes
            .iter()
            .filter(|node| node.count > 0)
            .map(|node| (node.profile.clone(), node.count))
            .collect();
        let mut extra = Vec::new();

        for server in &self.servers {
            match needed.get_mut(&server.role) {
                Some(count) => {
                    *count -= 1;
                    if *count == 0 {
                        needed.remove(&server.role);
                    }
                }
                None => extra.push(server.clone()),
            }
        }

        FlavorMatch { needed, extra }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FlavorNode, OsInfo};
    use pretty_assertions::assert_eq;

    fn server(addr: &str, role: &str) -> ServerInfo {
        ServerInfo {
            hostname: format!("{role}-{addr}"),
            advertise_addr: addr.into(),
            role: role.into(),
            os: OsInfo::default(),
            num_cpus: 4,
            memory_mb: 8192,
            volumes: Vec::new(),
        }
    }

    fn report(servers: Vec<ServerInfo>) -> AgentReport {
        AgentReport {
            message: String::new(),
            servers,
        }
    }

    #[test]
    fn diff_without_previous_adds_everything() {
        let current = report(vec![server("10.0.0.1", "master"), server("10.0.0.2", "node")]);
        let diff = current.diff(None);
        assert_eq!(diff.added, current.servers);
        assert_eq!(diff.removed, None);
    }

    #[test]
    fn diff_by_advertise_address() {
        let s1 = server("10.0.0.1", "master");
        let s2 = server("10.0.0.2", "node");
        let s3 = server("10.0.0.3", "node");
        let a = report(vec![s1.clone(), s2.clone()]);
        let b = report(vec![s1, s3.clone()]);

        let diff = b.diff(Some(&a));
        assert_eq!(diff.added, vec![s3]);
        assert_eq!(diff.removed, Some(vec![s2]));
    }

    #[test]
    fn diff_of_identical_reports_is_empty() {
        let a = report(vec![server("10.0.0.1", "master")]);
        let diff = a.diff(Some(&a.clone()));
        assert!(diff.added.is_empty());
        assert_eq!(diff.removed, Some(Vec::new()));
    }

    fn flavor(nodes: &[(&str, u32)]) -> Flavor {
        Flavor {
            name: "test".into(),
            nodes: nodes
                .iter()
                .map(|(profile, count)| FlavorNode {
                    profile: (*profile).into(),
                    count: *count,
                })
                .collect(),
        }
    }

    #[test]
    fn match_flavor_counts_down() {
        let api = server("10.0.0.3", "api");
        let r = report(vec![
            server("10.0.0.1", "worker"),
            server("10.0.0.2", "db"),
            api.clone(),
        ]);
        let result = r.match_flavor(&flavor(&[("worker", 3), ("db", 2)]));

        let expected: BTreeMap<String, u32> =
            [("worker".to_owned(), 2), ("db".to_owned(), 1)].into();
        assert_eq!(result.needed, expected);
        assert_eq!(result.extra, vec![api]);
        assert!(!result.is_satisfied());
    }

    #[test]
    fn satisfied_roles_are_removed() {
        let extra_db = server("10.0.0.3", "db");
        let r = report(vec![
            server("10.0.0.1", "worker"),
            server("10.0.0.2", "db"),
            extra_db.clone(),
        ]);
        let result = r.match_flavor(&flavor(&[("worker", 1), ("db", 1)]));

        assert!(result.needed.is_empty());
        assert!(!result.needed.contains_key("db"));
        assert_eq!(result.extra, vec![extra_db]);
        assert!(result.is_satisfied());
    }
}
