use std::collections::BTreeSet;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use tracing::{debug, info};

use super::{CONFIGURATION, ENVIRONMENT, NewOperation, OperatorService, SINGLETON};
use crate::error::{CoreError, Result};
use crate::model::{
    AgentReport, ClusterConfiguration, ClusterEnvironment, ExpandDetails, InstallDetails, LogEntry,
    OperationDetails, OperationState, OperationType, ProgressEntry, ProvisioningToken,
    ProvisioningTokenType, ReconfigureDetails, Server, ShrinkDetails, SiteKey, SiteOperation,
    SiteOperationKey, SiteState, UninstallDetails, UpdateDetails,
};
use crate::operator::{
    AppInstallerRequest, CreateClusterGarbageCollectOperationRequest,
    CreateClusterReconfigureOperationRequest, CreateSiteAppUpdateOperationRequest,
    CreateSiteExpandOperationRequest, CreateSiteInstallOperationRequest,
    CreateSiteShrinkOperationRequest, CreateSiteUninstallOperationRequest, Install, LogStream,
    OperationUpdateRequest, Operations, SetOperationStateRequest,
};
use crate::ops::filter::OperationsFilter;
use crate::ops::state::cluster_state_for;
use crate::users::generate_token;

/// Address of the agent user provisioned for a cluster's install.
fn agent_user(domain: &str) -> String {
    format!("agent@{domain}")
}

fn format_log_line(entry: &LogEntry) -> String {
    if entry.asset.is_empty() {
        entry.message.clone()
    } else {
        format!("[{}] {}", entry.asset, entry.message)
    }
}

/// Add `servers` to `existing`, replacing entries with the same address.
fn merge_servers(existing: &mut Vec<Server>, servers: &[Server]) {
    for server in servers {
        existing.retain(|s| s.advertise_ip != server.advertise_ip);
        existing.push(server.clone());
    }
}

impl OperatorService {
    fn expect_type(op: &SiteOperation, expected: OperationType) -> Result<()> {
        let actual = op.operation_type();
        if actual == expected {
            return Ok(());
        }
        Err(CoreError::bad_parameter(format!(
            "operation {} has type {actual}, expected {expected}",
            op.id
        )))
    }

    fn expect_unfinished(op: &SiteOperation) -> Result<()> {
        if op.is_finished() {
            return Err(CoreError::compare_failed(format!(
                "operation {} is already {}",
                op.id, op.state
            )));
        }
        Ok(())
    }

    /// A state of the operation's own type, never behind the current one.
    fn expect_forward(op: &SiteOperation, next: OperationState) -> Result<()> {
        let op_type = op.operation_type();
        if !next.belongs_to(op_type) {
            return Err(CoreError::bad_parameter(format!(
                "state {next} does not apply to {op_type} operations"
            )));
        }
        if next.step() < op.state.step() {
            return Err(CoreError::compare_failed(format!(
                "operation {} cannot move back from {} to {next}",
                op.id, op.state
            )));
        }
        Ok(())
    }

    /// Side effects of a finished operation beyond the cluster state.
    async fn apply_completion(&self, op: &SiteOperation) -> Result<()> {
        let key = op.site_key();
        match &op.details {
            OperationDetails::Install(_) | OperationDetails::Expand(_) => {
                let mut site = self.backend.get_site(&key).await?;
                merge_servers(&mut site.cluster_state.servers, &op.servers);
                self.backend.update_site(site).await?;
            }
            OperationDetails::Shrink(details) => {
                let removed: BTreeSet<&str> = details
                    .servers
                    .iter()
                    .map(|s| s.advertise_ip.as_str())
                    .collect();
                let mut site = self.backend.get_site(&key).await?;
                site.cluster_state
                    .servers
                    .retain(|s| !removed.contains(s.advertise_ip.as_str()));
                self.backend.update_site(site).await?;
            }
            OperationDetails::Update(details) => {
                let mut site = self.backend.get_site(&key).await?;
                site.app = self.apps.get_app(&details.update_package).await?;
                self.backend.update_site(site).await?;
            }
            OperationDetails::UpdateEnviron(details) => {
                let env = ClusterEnvironment {
                    env: details.env.clone(),
                };
                self.put_document(&op.site_domain, ENVIRONMENT, SINGLETON, &env)
                    .await?;
            }
            OperationDetails::UpdateConfig(details) => {
                let config = ClusterConfiguration {
                    config: details.config.clone(),
                };
                self.put_document(&op.site_domain, CONFIGURATION, SINGLETON, &config)
                    .await?;
            }
            OperationDetails::Uninstall(_) => {
                self.backend.delete_site(&key).await?;
                info!(cluster = %op.site_domain, "Cluster uninstalled");
            }
            OperationDetails::GarbageCollect | OperationDetails::Reconfigure(_) => {}
        }
        Ok(())
    }

    async fn update_operation_servers(
        &self,
        key: &SiteOperationKey,
        req: OperationUpdateRequest,
        expected: OperationType,
    ) -> Result<()> {
        req.check()?;
        let mut op = self.operation(key).await?;
        Self::expect_type(&op, expected)?;
        Self::expect_unfinished(&op)?;

        if !req.profiles.is_empty() {
            match &mut op.details {
                OperationDetails::Install(details) => details.profiles = req.profiles,
                OperationDetails::Expand(details) => details.profiles = req.profiles,
                _ => {}
            }
        }
        debug!(operation = %key, servers = req.servers.len(), "Updating operation servers");
        op.servers = req.servers;
        op.updated = Utc::now();
        self.backend.update_operation(op).await
    }

    async fn agent_report(
        &self,
        key: &SiteOperationKey,
        expected: OperationType,
    ) -> Result<AgentReport> {
        let agents = self.agents()?;
        let op = self.operation(key).await?;
        Self::expect_type(&op, expected)?;
        let infos = agents.get_server_infos(key).await?;

        let mut report = AgentReport {
            message: String::new(),
            servers: infos.0,
        };
        let flavor = match &op.details {
            OperationDetails::Install(InstallDetails {
                flavor: Some(name), ..
            }) => {
                let site = self.backend.get_site(&op.site_key()).await?;
                Some(site.app.manifest.flavor(name)?.clone())
            }
            _ => None,
        };
        let matched = flavor.map(|f| report.match_flavor(&f));
        report.message = match matched {
            Some(matched) if !matched.is_satisfied() => {
                let waiting: Vec<String> = matched
                    .needed
                    .iter()
                    .map(|(role, count)| format!("{count} x {role}"))
                    .collect();
                format!("waiting for servers: {}", waiting.join(", "))
            }
            _ => format!("{} server(s) connected", report.servers.len()),
        };
        Ok(report)
    }

    async fn start_operation(
        &self,
        key: &SiteOperationKey,
        expected: OperationType,
        next: OperationState,
    ) -> Result<()> {
        let mut op = self.operation(key).await?;
        Self::expect_type(&op, expected)?;
        if !op.state.is_initiated() {
            return Err(CoreError::compare_failed(format!(
                "operation {} has already started",
                op.id
            )));
        }
        op.state = next;
        op.updated = Utc::now();
        self.backend.update_operation(op).await?;
        self.backend
            .create_progress_entry(ProgressEntry::in_progress(key, "Operation has started"))
            .await?;
        info!(operation = %key, state = %next, "Operation started");
        Ok(())
    }
}

// ── Operations ───────────────────────────────────────────────────────

#[async_trait]
impl Operations for OperatorService {
    async fn get_site_operations(
        &self,
        key: &SiteKey,
        filter: &OperationsFilter,
    ) -> Result<Vec<SiteOperation>> {
        key.check()?;
        let ops = self.backend.get_operations(key).await?;
        Ok(filter.filter(ops))
    }

    async fn get_site_operation(&self, key: &SiteOperationKey) -> Result<SiteOperation> {
        self.operation(key).await
    }

    async fn create_site_install_operation(
        &self,
        req: CreateSiteInstallOperationRequest,
    ) -> Result<SiteOperationKey> {
        let site = self.site(&req.key).await?;
        if site.state != SiteState::NotInstalled {
            return Err(CoreError::compare_failed(format!(
                "cluster {} is {}, expected {}",
                site.domain,
                site.state,
                SiteState::NotInstalled
            )));
        }
        if let Some(flavor) = &req.flavor {
            site.app.manifest.flavor(flavor)?;
        }

        let mut new = NewOperation::new(
            req.key.clone(),
            OperationDetails::Install(InstallDetails {
                profiles: req.profiles,
                flavor: req.flavor,
            }),
        );
        new.created_by = req.created_by;
        let key = self.create_operation(new).await?;

        self.users
            .create_provisioning_token(ProvisioningToken {
                token: generate_token(),
                token_type: ProvisioningTokenType::Install,
                account_id: key.account_id.clone(),
                site_domain: key.site_domain.clone(),
                operation_id: Some(key.operation_id.clone()),
                user_email: agent_user(&key.site_domain),
                expires: None,
            })
            .await?;
        Ok(key)
    }

    async fn create_site_expand_operation(
        &self,
        req: CreateSiteExpandOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.check()?;
        let site = self.site(&req.key).await?;
        if site.state != SiteState::Active {
            return Err(CoreError::compare_failed(format!(
                "cluster {} is {}, expand needs an active cluster",
                site.domain, site.state
            )));
        }
        for profile in req.profiles.keys() {
            site.app.manifest.profile(profile)?;
        }
        let mut new = NewOperation::new(
            req.key,
            OperationDetails::Expand(ExpandDetails {
                profiles: req.profiles,
            }),
        );
        new.created_by = req.created_by;
        self.create_operation(new).await
    }

    async fn create_site_shrink_operation(
        &self,
        req: CreateSiteShrinkOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.check()?;
        let site = self.site(&req.key).await?;
        let servers: Vec<Server> = req
            .servers
            .iter()
            .map(|hostname| {
                site.cluster_state
                    .servers
                    .iter()
                    .find(|s| &s.hostname == hostname)
                    .cloned()
                    .ok_or_else(|| CoreError::not_found("server", hostname))
            })
            .collect::<Result<_>>()?;
        if site.cluster_state.servers.len() <= servers.len() {
            return Err(CoreError::bad_parameter(
                "cannot remove the last server of a cluster",
            ));
        }

        let mut new = NewOperation::new(
            req.key,
            OperationDetails::Shrink(ShrinkDetails {
                servers: servers.clone(),
                force: req.force,
                node_removed: req.node_removed,
            }),
        );
        new.created_by = req.created_by;
        new.servers = servers;
        new.force = req.force;
        self.create_operation(new).await
    }

    async fn create_site_app_update_operation(
        &self,
        req: CreateSiteAppUpdateOperationRequest,
    ) -> Result<SiteOperationKey> {
        let site = self.site(&req.key).await?;
        if !site.app.package.same_package(&req.app_package) {
            return Err(CoreError::bad_parameter(format!(
                "cluster {} runs {}, cannot update to {}",
                site.domain, site.app.package, req.app_package
            )));
        }
        self.apps.get_app(&req.app_package).await?;

        let mut new = NewOperation::new(
            req.key,
            OperationDetails::Update(UpdateDetails {
                update_package: req.app_package,
                manual: req.manual,
            }),
        );
        new.created_by = req.created_by;
        self.create_operation(new).await
    }

    async fn create_site_uninstall_operation(
        &self,
        req: CreateSiteUninstallOperationRequest,
    ) -> Result<SiteOperationKey> {
        let mut new = NewOperation::new(
            req.key,
            OperationDetails::Uninstall(UninstallDetails { force: req.force }),
        );
        new.force = req.force;
        self.create_operation(new).await
    }

    async fn create_cluster_garbage_collect_operation(
        &self,
        req: CreateClusterGarbageCollectOperationRequest,
    ) -> Result<SiteOperationKey> {
        self.create_operation(NewOperation::new(req.key, OperationDetails::GarbageCollect))
            .await
    }

    async fn create_cluster_reconfigure_operation(
        &self,
        req: CreateClusterReconfigureOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.check()?;
        self.create_operation(NewOperation::new(
            req.key,
            OperationDetails::Reconfigure(ReconfigureDetails {
                advertise_addr: req.advertise_addr,
            }),
        ))
        .await
    }

    async fn get_site_operation_progress(&self, key: &SiteOperationKey) -> Result<ProgressEntry> {
        key.check()?;
        self.backend.get_last_progress_entry(key).await
    }

    async fn create_progress_entry(
        &self,
        key: &SiteOperationKey,
        mut entry: ProgressEntry,
    ) -> Result<()> {
        self.operation(key).await?;
        entry.site_domain.clone_from(&key.site_domain);
        entry.operation_id.clone_from(&key.operation_id);
        self.backend.create_progress_entry(entry).await
    }

    async fn get_site_operation_logs(&self, key: &SiteOperationKey) -> Result<LogStream> {
        self.operation(key).await?;
        let entries = self.backend.get_logs(key).await?;
        Ok(stream::iter(entries)
            .map(|entry| Ok(format_log_line(&entry)))
            .boxed())
    }

    async fn create_log_entry(&self, key: &SiteOperationKey, entry: LogEntry) -> Result<()> {
        self.operation(key).await?;
        self.backend.append_log(key, entry).await
    }

    async fn set_operation_state(
        &self,
        key: &SiteOperationKey,
        req: SetOperationStateRequest,
    ) -> Result<()> {
        let mut op = self.operation(key).await?;
        Self::expect_unfinished(&op)?;
        Self::expect_forward(&op, req.state)?;

        let op_type = op.operation_type();
        info!(operation = %key, from = %op.state, to = %req.state, "Operation state changed");
        op.state = req.state;
        op.updated = Utc::now();
        self.backend.update_operation(op.clone()).await?;

        if let Some(mut entry) = req.progress {
            entry.site_domain.clone_from(&key.site_domain);
            entry.operation_id.clone_from(&key.operation_id);
            self.backend.create_progress_entry(entry).await?;
        }
        if let Some(state) = cluster_state_for(op_type, req.state) {
            self.set_site_state(&op.site_key(), state).await?;
        }
        if req.state.is_completed() {
            self.apply_completion(&op).await?;
        }
        Ok(())
    }

    async fn update_install_operation_state(
        &self,
        key: &SiteOperationKey,
        req: OperationUpdateRequest,
    ) -> Result<()> {
        self.update_operation_servers(key, req, OperationType::Install)
            .await
    }

    async fn update_expand_operation_state(
        &self,
        key: &SiteOperationKey,
        req: OperationUpdateRequest,
    ) -> Result<()> {
        self.update_operation_servers(key, req, OperationType::Expand)
            .await
    }

    async fn delete_site_operation(&self, key: &SiteOperationKey) -> Result<()> {
        let op = self.operation(key).await?;
        if !op.state.is_initiated() {
            return Err(CoreError::compare_failed(format!(
                "operation {} has started and cannot be deleted",
                op.id
            )));
        }
        self.backend.delete_operation(key).await?;

        // Undo the state the operation put the cluster in.
        let restored = match op.operation_type() {
            OperationType::Install => Some(SiteState::NotInstalled),
            OperationType::Expand => Some(SiteState::Active),
            _ => None,
        };
        if let Some(state) = restored {
            self.set_site_state(&op.site_key(), state).await?;
        }
        info!(operation = %key, "Operation deleted");
        Ok(())
    }
}

// ── Install and expand ───────────────────────────────────────────────

#[async_trait]
impl Install for OperatorService {
    async fn get_app_installer(&self, req: AppInstallerRequest) -> Result<Bytes> {
        self.backend.get_account(&req.account_id).await?;
        self.apps
            .get_app_installer(&req.application, req.cache_images)
            .await
    }

    async fn get_site_install_operation_agent_report(
        &self,
        key: &SiteOperationKey,
    ) -> Result<AgentReport> {
        self.agent_report(key, OperationType::Install).await
    }

    async fn site_install_operation_start(&self, key: &SiteOperationKey) -> Result<()> {
        self.start_operation(key, OperationType::Install, OperationState::InstallPrechecks)
            .await
    }

    async fn get_site_expand_operation_agent_report(
        &self,
        key: &SiteOperationKey,
    ) -> Result<AgentReport> {
        self.agent_report(key, OperationType::Expand).await
    }

    async fn site_expand_operation_start(&self, key: &SiteOperationKey) -> Result<()> {
        self.start_operation(key, OperationType::Expand, OperationState::ExpandPrechecks)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClusterRole;

    fn server(ip: &str, hostname: &str) -> Server {
        Server {
            advertise_ip: ip.into(),
            hostname: hostname.into(),
            role: "worker".into(),
            cluster_role: ClusterRole::Node,
            instance_type: None,
        }
    }

    #[test]
    fn merge_replaces_same_address() {
        let mut existing = vec![server("10.0.0.1", "a"), server("10.0.0.2", "b")];
        merge_servers(&mut existing, &[server("10.0.0.2", "b2"), server("10.0.0.3", "c")]);
        let hosts: Vec<&str> = existing.iter().map(|s| s.hostname.as_str()).collect();
        assert_eq!(hosts, ["a", "b2", "c"]);
    }

    #[test]
    fn log_lines_carry_asset() {
        let entry = LogEntry {
            asset: "node-1".into(),
            message: "pulling images".into(),
        };
        assert_eq!(format_log_line(&entry), "[node-1] pulling images");
    }
}
