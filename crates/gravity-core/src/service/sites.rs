use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{AUDIT_EVENT, OperatorService};
use crate::error::{CoreError, Result};
use crate::model::{ClusterNode, Endpoint, NewSite, Site, SiteKey, SiteOperation, SiteState};
use crate::operator::{
    ActivateSiteRequest, Audit, AuditEventRequest, ClusterReportRequest,
    CompleteFinalInstallStepRequest, DeactivateSiteRequest, Endpoints, NodeAccessResult, Sites,
    Status, ValidateRemoteAccessRequest, ValidateRemoteAccessResponse, ValidateServersRequest,
    Validation,
};
use crate::ops::checks::{
    CheckServersRequest, RemoteCommands, ValidateServersResponse, check_requirements,
    check_servers,
};
use crate::ops::utils::active_operations;

const MAX_DOMAIN_LENGTH: usize = 253;

/// Command run on each node to prove the agents can reach it.
const REMOTE_ACCESS_PROBE: &[&str] = &["gravity", "version"];

fn check_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(CoreError::bad_parameter("cluster name cannot be empty"));
    }
    if domain.len() > MAX_DOMAIN_LENGTH {
        return Err(CoreError::bad_parameter(format!(
            "cluster name is longer than {MAX_DOMAIN_LENGTH} characters"
        )));
    }
    let valid_label = |label: &str| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if !domain.split('.').all(valid_label) {
        return Err(CoreError::bad_parameter(format!(
            "cluster name {domain:?} is not a valid DNS name"
        )));
    }
    Ok(())
}

// ── Clusters ─────────────────────────────────────────────────────────

#[async_trait]
impl Sites for OperatorService {
    async fn create_site(&self, req: NewSite) -> Result<Site> {
        req.check()?;
        check_domain_name(&req.domain_name)?;
        let app = self.apps.get_app(&req.app_package).await?;

        let site = Site {
            domain: req.domain_name,
            account_id: req.account_id,
            state: SiteState::NotInstalled,
            reason: String::new(),
            app,
            cluster_state: Default::default(),
            provisioner: req.provisioner,
            created: Utc::now(),
            created_by: req.created_by,
            labels: req.labels,
            local: req.local,
            final_install_step_complete: false,
        };
        let site = self.backend.create_site(site).await?;
        info!(cluster = %site.domain, app = %site.app.package, "Cluster created");
        Ok(site)
    }

    async fn get_sites(&self, account_id: &str) -> Result<Vec<Site>> {
        self.backend.get_sites(account_id).await
    }

    async fn get_site(&self, key: &SiteKey) -> Result<Site> {
        self.site(key).await
    }

    async fn get_local_site(&self) -> Result<Site> {
        self.backend.get_local_site().await
    }

    async fn get_site_by_domain(&self, domain: &str) -> Result<Site> {
        self.backend.get_site_by_domain(domain).await
    }

    async fn delete_site(&self, key: &SiteKey) -> Result<()> {
        self.site(key).await?;
        self.backend.delete_site(key).await?;
        info!(cluster = %key.site_domain, "Cluster deleted");
        Ok(())
    }

    async fn deactivate_site(&self, req: DeactivateSiteRequest) -> Result<()> {
        let mut site = self.site(&req.key).await?;
        site.state = if req.stopped {
            SiteState::Offline
        } else {
            SiteState::Degraded
        };
        site.reason = req.reason;
        warn!(cluster = %site.domain, state = %site.state, reason = %site.reason, "Cluster deactivated");
        self.backend.update_site(site).await
    }

    async fn activate_site(&self, req: ActivateSiteRequest) -> Result<()> {
        let mut site = self.site(&req.key).await?;
        site.state = SiteState::Active;
        site.reason.clear();
        info!(cluster = %site.domain, "Cluster activated");
        self.backend.update_site(site).await
    }

    async fn complete_final_install_step(
        &self,
        req: CompleteFinalInstallStepRequest,
    ) -> Result<()> {
        let mut site = self.site(&req.key).await?;
        site.final_install_step_complete = true;
        self.backend.update_site(site).await
    }

    async fn get_site_report(&self, req: ClusterReportRequest) -> Result<Bytes> {
        let site = self.site(&req.key).await?;
        let mut operations = self.backend.get_operations(&req.key).await?;
        if let Some(since) = req.since {
            let cutoff = chrono::Duration::from_std(since)
                .map(|window| Utc::now() - window)
                .map_err(|e| CoreError::bad_parameter(format!("invalid report window: {e}")))?;
            operations.retain(|op| op.updated >= cutoff);
        }
        let report = json!({
            "generated": Utc::now(),
            "cluster": site,
            "operations": operations,
        });
        serde_json::to_vec_pretty(&report)
            .map(Bytes::from)
            .map_err(|e| CoreError::Internal(format!("encoding cluster report: {e}")))
    }
}

// ── Validation ───────────────────────────────────────────────────────

impl OperatorService {
    /// The operation whose agents validate servers: the requested one, or
    /// the cluster's active operation.
    async fn checked_operation(
        &self,
        req: &ValidateServersRequest,
    ) -> Result<Option<SiteOperation>> {
        if let Some(id) = &req.operation_id {
            return self.operation(&req.key.operation(id.clone())).await.map(Some);
        }
        let ops = self.backend.get_operations(&req.key).await?;
        Ok(active_operations(&ops).first().map(|&op| op.clone()))
    }
}

#[async_trait]
impl Validation for OperatorService {
    async fn validate_servers(
        &self,
        req: ValidateServersRequest,
    ) -> Result<ValidateServersResponse> {
        let site = self.site(&req.key).await?;
        let manifest = &site.app.manifest;

        if let Some(agents) = &self.agents {
            if let Some(op) = self.checked_operation(&req).await? {
                let key = op.key();
                let infos = agents.get_server_infos(&key).await?;
                let servers = if op.servers.is_empty() {
                    &site.cluster_state.servers
                } else {
                    &op.servers
                };
                debug!(operation = %key, servers = servers.len(), "Running preflight checks");
                let remote = RemoteCommands::new(key, agents.clone());
                return check_servers(
                    &remote,
                    CheckServersRequest {
                        servers,
                        infos: &infos,
                        manifest,
                    },
                )
                .await;
            }
        }

        let mut probes = Vec::new();
        for info in &req.servers {
            let profile = manifest.profile(&info.role).map_err(|_| {
                CoreError::bad_parameter(format!(
                    "server {} has unknown role {:?}",
                    info.hostname, info.role
                ))
            })?;
            probes.extend(check_requirements(info, &profile.requirements));
        }
        Ok(ValidateServersResponse { probes })
    }

    async fn validate_domain_name(&self, domain: &str) -> Result<()> {
        check_domain_name(domain)?;
        match self.backend.get_site_by_domain(domain).await {
            Ok(_) => Err(CoreError::already_exists(format!(
                "cluster {domain} already exists"
            ))),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn validate_remote_access(
        &self,
        req: ValidateRemoteAccessRequest,
    ) -> Result<ValidateRemoteAccessResponse> {
        let agents = self.agents()?;
        let key = req.key.operation(req.operation_id.clone());
        let op = self.operation(&key).await?;

        let addrs = if req.node_addrs.is_empty() {
            op.servers.iter().map(|s| s.advertise_ip.clone()).collect()
        } else {
            req.node_addrs
        };
        let args: Vec<String> = REMOTE_ACCESS_PROBE.iter().map(|&a| a.to_owned()).collect();

        let mut results = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let output = agents.exec(&key, &addr, &args).await?;
            results.push(NodeAccessResult {
                addr,
                output: String::from_utf8_lossy(&output).into_owned(),
            });
        }
        Ok(ValidateRemoteAccessResponse { results })
    }
}

// ── Status, endpoints, audit ─────────────────────────────────────────

#[async_trait]
impl Status for OperatorService {
    async fn check_site_status(&self, key: &SiteKey) -> Result<()> {
        let site = self.site(key).await?;
        match site.state {
            SiteState::Degraded | SiteState::Offline => Err(CoreError::ClusterDegraded {
                domain: site.domain,
                reason: if site.reason.is_empty() {
                    site.state.to_string()
                } else {
                    site.reason
                },
            }),
            _ => Ok(()),
        }
    }

    async fn get_cluster_nodes(&self, key: &SiteKey) -> Result<Vec<ClusterNode>> {
        let site = self.site(key).await?;
        Ok(site
            .cluster_state
            .servers
            .into_iter()
            .map(|server| ClusterNode {
                hostname: server.hostname,
                advertise_ip: server.advertise_ip,
                role: server.cluster_role.to_string(),
                profile: server.role,
            })
            .collect())
    }
}

#[async_trait]
impl Endpoints for OperatorService {
    async fn get_application_endpoints(&self, key: &SiteKey) -> Result<Vec<Endpoint>> {
        let site = self.site(key).await?;
        let servers = &site.cluster_state.servers;
        Ok(site
            .app
            .manifest
            .endpoints
            .iter()
            .map(|spec| Endpoint {
                name: spec.name.clone(),
                description: spec.description.clone(),
                addresses: servers
                    .iter()
                    .map(|s| format!("{}://{}:{}", spec.scheme, s.advertise_ip, spec.port))
                    .collect(),
            })
            .collect())
    }
}

#[async_trait]
impl Audit for OperatorService {
    async fn emit_audit_event(&self, req: AuditEventRequest) -> Result<()> {
        self.site(&req.key).await?;
        info!(
            cluster = %req.key.site_domain,
            event = %req.event.name,
            code = %req.event.code,
            "Audit event"
        );
        // Sortable name keeps audit events in emission order.
        let name = format!(
            "{:020}-{}",
            Utc::now().timestamp_micros(),
            uuid::Uuid::new_v4().simple()
        );
        self.put_document(&req.key.site_domain, AUDIT_EVENT, &name, &req.event)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_names() {
        assert!(check_domain_name("example.com").is_ok());
        assert!(check_domain_name("prod-1.example.com").is_ok());
        assert!(check_domain_name("").is_err_and(|e| e.is_bad_parameter()));
        assert!(check_domain_name("-bad.example.com").is_err_and(|e| e.is_bad_parameter()));
        assert!(check_domain_name("a..b").is_err_and(|e| e.is_bad_parameter()));
        assert!(check_domain_name("under_score.com").is_err_and(|e| e.is_bad_parameter()));
    }
}
