//! Per-call routing between the local operator and remote clusters.
//!
//! A cluster that is marked local, or has not finished installing, is
//! served in-process. Any other cluster is served by its own controller,
//! reached through a pooled [`RemoteOperator`](crate::remote::RemoteOperator).
//! During install the agents talk to the wizard process, so agent reports
//! and server enrollment go to the wizard instead.
//!
//! Calls that mint credentials or create operations from scratch never
//! leave the process.

pub mod pool;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::config::RouterConfig;
use crate::error::Result;
use crate::model::{
    Account, AgentReport, Alert, ApiKey, AuthGateway, ClusterCertificate, ClusterConfiguration,
    ClusterEnvironment, ClusterNode, Endpoint, InstallToken, Locator, LogEntry, LogForwarder,
    NewAccount, NewSite, PersistentStorage, ProgressEntry, ProvisioningToken, Site, SiteKey,
    SiteOperation, SiteOperationKey, SmtpConfig, User, UserInvite, UserToken,
};
use crate::operator::{
    Accounts, ActivateSiteRequest, ApiKeys, AppInstallerRequest, Audit, AuditEventRequest,
    Certificates, ClusterConfig, ClusterReportRequest, CompleteFinalInstallStepRequest,
    CreateClusterGarbageCollectOperationRequest, CreateClusterReconfigureOperationRequest,
    CreateSiteAppUpdateOperationRequest, CreateSiteExpandOperationRequest,
    CreateSiteInstallOperationRequest, CreateSiteShrinkOperationRequest,
    CreateSiteUninstallOperationRequest, CreateUpdateConfigOperationRequest,
    CreateUpdateEnvOperationRequest, CreateUserInviteRequest, CreateUserResetRequest,
    DeactivateSiteRequest, DeleteUserInviteRequest, DownloadUpdateRequest,
    EnablePeriodicUpdatesRequest, Endpoints, Identity, Install, Leader, LogForwarders, LogStream,
    Monitoring, NewApiKeyRequest, NewInstallTokenRequest, OperationUpdateRequest, Operations,
    Operator, PersistentStorageConfig, ResetUserPasswordRequest, RuntimeEnvironment,
    SetOperationStateRequest, Sites, Smtp, SshSignRequest, SshSignResponse, Status,
    TlsSignRequest, TlsSignResponse, Tokens, UpdateCertificateRequest,
    UpdatePersistentStorageRequest, UpdateUserRequest, Updates, Users, Validation,
    ValidateRemoteAccessRequest, ValidateRemoteAccessResponse, ValidateServersRequest,
};
use crate::ops::checks::ValidateServersResponse;
use crate::ops::filter::OperationsFilter;
use crate::storage::Backend;

pub use pool::{ClientFactory, ClientPool, RemoteClientFactory};

pub struct Router {
    local: Arc<dyn Operator>,
    backend: Arc<dyn Backend>,
    pool: ClientPool,
    config: RouterConfig,
}

impl Router {
    pub fn new(
        local: Arc<dyn Operator>,
        backend: Arc<dyn Backend>,
        factory: Arc<dyn ClientFactory>,
        config: RouterConfig,
    ) -> Self {
        Self {
            local,
            backend,
            pool: ClientPool::new(factory),
            config,
        }
    }

    pub fn local(&self) -> Arc<dyn Operator> {
        Arc::clone(&self.local)
    }

    pub fn pool(&self) -> &ClientPool {
        &self.pool
    }

    /// Operator serving `domain`.
    pub async fn pick_client(&self, domain: &str) -> Result<Arc<dyn Operator>> {
        let site = self.backend.get_site_by_domain(domain).await?;
        if site.local || !site.state.is_installed() {
            debug!(cluster = domain, state = %site.state, "Routing locally");
            return Ok(self.local());
        }
        let endpoint = self.config.endpoint_for(domain)?;
        debug!(cluster = domain, %endpoint, "Routing to cluster controller");
        self.pool.get(&endpoint)
    }

    /// Operator of the wizard installing `cluster`.
    pub async fn wizard_client(&self, cluster: &str) -> Result<Arc<dyn Operator>> {
        if self.config.wizard {
            return Ok(self.local());
        }
        let endpoint = self.config.wizard_endpoint_for(cluster)?;
        debug!(cluster, %endpoint, "Routing to install wizard");
        self.pool.get(&endpoint)
    }
}

// ── Accounts and clusters ────────────────────────────────────────────

#[async_trait]
impl Accounts for Router {
    async fn create_account(&self, req: NewAccount) -> Result<Account> {
        self.local.create_account(req).await
    }

    async fn get_account(&self, account_id: &str) -> Result<Account> {
        self.local.get_account(account_id).await
    }

    async fn get_accounts(&self) -> Result<Vec<Account>> {
        self.local.get_accounts().await
    }
}

#[async_trait]
impl Sites for Router {
    async fn create_site(&self, req: NewSite) -> Result<Site> {
        self.local.create_site(req).await
    }

    async fn get_sites(&self, account_id: &str) -> Result<Vec<Site>> {
        self.local.get_sites(account_id).await
    }

    async fn get_site(&self, key: &SiteKey) -> Result<Site> {
        self.pick_client(&key.site_domain).await?.get_site(key).await
    }

    async fn get_local_site(&self) -> Result<Site> {
        self.local.get_local_site().await
    }

    async fn get_site_by_domain(&self, domain: &str) -> Result<Site> {
        self.local.get_site_by_domain(domain).await
    }

    async fn delete_site(&self, key: &SiteKey) -> Result<()> {
        self.local.delete_site(key).await
    }

    async fn deactivate_site(&self, req: DeactivateSiteRequest) -> Result<()> {
        self.pick_client(&req.key.site_domain)
            .await?
            .deactivate_site(req)
            .await
    }

    async fn activate_site(&self, req: ActivateSiteRequest) -> Result<()> {
        self.pick_client(&req.key.site_domain)
            .await?
            .activate_site(req)
            .await
    }

    async fn complete_final_install_step(
        &self,
        req: CompleteFinalInstallStepRequest,
    ) -> Result<()> {
        self.pick_client(&req.key.site_domain)
            .await?
            .complete_final_install_step(req)
            .await
    }

    async fn get_site_report(&self, req: ClusterReportRequest) -> Result<Bytes> {
        self.pick_client(&req.key.site_domain)
            .await?
            .get_site_report(req)
            .await
    }
}

// ── Operations ───────────────────────────────────────────────────────

#[async_trait]
impl Operations for Router {
    async fn get_site_operations(
        &self,
        key: &SiteKey,
        filter: &OperationsFilter,
    ) -> Result<Vec<SiteOperation>> {
        self.pick_client(&key.site_domain)
            .await?
            .get_site_operations(key, filter)
            .await
    }

    async fn get_site_operation(&self, key: &SiteOperationKey) -> Result<SiteOperation> {
        self.pick_client(&key.site_domain)
            .await?
            .get_site_operation(key)
            .await
    }

    async fn create_site_install_operation(
        &self,
        req: CreateSiteInstallOperationRequest,
    ) -> Result<SiteOperationKey> {
        self.local.create_site_install_operation(req).await
    }

    async fn create_site_expand_operation(
        &self,
        req: CreateSiteExpandOperationRequest,
    ) -> Result<SiteOperationKey> {
        self.pick_client(&req.key.site_domain)
            .await?
            .create_site_expand_operation(req)
            .await
    }

    async fn create_site_shrink_operation(
        &self,
        req: CreateSiteShrinkOperationRequest,
    ) -> Result<SiteOperationKey> {
        self.pick_client(&req.key.site_domain)
            .await?
            .create_site_shrink_operation(req)
            .await
    }

    async fn create_site_app_update_operation(
        &self,
        req: CreateSiteAppUpdateOperationRequest,
    ) -> Result<SiteOperationKey> {
        self.pick_client(&req.key.site_domain)
            .await?
            .create_site_app_update_operation(req)
            .await
    }

    async fn create_site_uninstall_operation(
        &self,
        req: CreateSiteUninstallOperationRequest,
    ) -> Result<SiteOperationKey> {
        self.pick_client(&req.key.site_domain)
            .await?
            .create_site_uninstall_operation(req)
            .await
    }

    async fn create_cluster_garbage_collect_operation(
        &self,
        req: CreateClusterGarbageCollectOperationRequest,
    ) -> Result<SiteOperationKey> {
        self.pick_client(&req.key.site_domain)
            .await?
            .create_cluster_garbage_collect_operation(req)
            .await
    }

    async fn create_cluster_reconfigure_operation(
        &self,
        req: CreateClusterReconfigureOperationRequest,
    ) -> Result<SiteOperationKey> {
        self.pick_client(&req.key.site_domain)
            .await?
            .create_cluster_reconfigure_operation(req)
            .await
    }

    async fn get_site_operation_progress(&self, key: &SiteOperationKey) -> Result<ProgressEntry> {
        self.pick_client(&key.site_domain)
            .await?
            .get_site_operation_progress(key)
            .await
    }

    async fn create_progress_entry(
        &self,
        key: &SiteOperationKey,
        entry: ProgressEntry,
    ) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .create_progress_entry(key, entry)
            .await
    }

    async fn get_site_operation_logs(&self, key: &SiteOperationKey) -> Result<LogStream> {
        self.pick_client(&key.site_domain)
            .await?
            .get_site_operation_logs(key)
            .await
    }

    async fn create_log_entry(&self, key: &SiteOperationKey, entry: LogEntry) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .create_log_entry(key, entry)
            .await
    }

    async fn set_operation_state(
        &self,
        key: &SiteOperationKey,
        req: SetOperationStateRequest,
    ) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .set_operation_state(key, req)
            .await
    }

    async fn update_install_operation_state(
        &self,
        key: &SiteOperationKey,
        req: OperationUpdateRequest,
    ) -> Result<()> {
        // Servers not known yet: the provisioner fills them in locally.
        if req.servers.is_empty() {
            return self.local.update_install_operation_state(key, req).await;
        }
        self.wizard_client(&key.site_domain)
            .await?
            .update_install_operation_state(key, req)
            .await
    }

    async fn update_expand_operation_state(
        &self,
        key: &SiteOperationKey,
        req: OperationUpdateRequest,
    ) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .update_expand_operation_state(key, req)
            .await
    }

    async fn delete_site_operation(&self, key: &SiteOperationKey) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .delete_site_operation(key)
            .await
    }
}

#[async_trait]
impl Validation for Router {
    async fn validate_servers(
        &self,
        req: ValidateServersRequest,
    ) -> Result<ValidateServersResponse> {
        self.pick_client(&req.key.site_domain)
            .await?
            .validate_servers(req)
            .await
    }

    async fn validate_domain_name(&self, domain: &str) -> Result<()> {
        self.local.validate_domain_name(domain).await
    }

    async fn validate_remote_access(
        &self,
        req: ValidateRemoteAccessRequest,
    ) -> Result<ValidateRemoteAccessResponse> {
        self.pick_client(&req.key.site_domain)
            .await?
            .validate_remote_access(req)
            .await
    }
}

// ── Identity and users ───────────────────────────────────────────────

#[async_trait]
impl Identity for Router {
    async fn upsert_user(&self, key: &SiteKey, user: User) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .upsert_user(key, user)
            .await
    }

    async fn get_user(&self, key: &SiteKey, name: &str) -> Result<User> {
        self.pick_client(&key.site_domain)
            .await?
            .get_user(key, name)
            .await
    }

    async fn get_users(&self, account_id: &str) -> Result<Vec<User>> {
        self.local.get_users(account_id).await
    }

    async fn delete_local_user(&self, name: &str) -> Result<()> {
        self.local.delete_local_user(name).await
    }

    async fn sign_tls_key(&self, req: TlsSignRequest) -> Result<TlsSignResponse> {
        self.local.sign_tls_key(req).await
    }

    async fn sign_ssh_key(&self, req: SshSignRequest) -> Result<SshSignResponse> {
        self.local.sign_ssh_key(req).await
    }

    async fn upsert_auth_gateway(&self, key: &SiteKey, gateway: AuthGateway) -> Result<()> {
        self.local.upsert_auth_gateway(key, gateway).await
    }

    async fn get_auth_gateway(&self, key: &SiteKey) -> Result<AuthGateway> {
        self.pick_client(&key.site_domain)
            .await?
            .get_auth_gateway(key)
            .await
    }
}

#[async_trait]
impl Users for Router {
    async fn create_user_invite(&self, req: CreateUserInviteRequest) -> Result<UserToken> {
        self.pick_client(&req.key.site_domain)
            .await?
            .create_user_invite(req)
            .await
    }

    async fn get_user_invites(&self, key: &SiteKey) -> Result<Vec<UserInvite>> {
        self.pick_client(&key.site_domain)
            .await?
            .get_user_invites(key)
            .await
    }

    async fn delete_user_invite(&self, req: DeleteUserInviteRequest) -> Result<()> {
        self.pick_client(&req.key.site_domain)
            .await?
            .delete_user_invite(req)
            .await
    }

    async fn create_user_reset(&self, req: CreateUserResetRequest) -> Result<UserToken> {
        self.pick_client(&req.key.site_domain)
            .await?
            .create_user_reset(req)
            .await
    }

    async fn reset_user_password(&self, req: ResetUserPasswordRequest) -> Result<String> {
        self.pick_client(&req.key.site_domain)
            .await?
            .reset_user_password(req)
            .await
    }

    async fn update_user(&self, req: UpdateUserRequest) -> Result<()> {
        self.pick_client(&req.key.site_domain)
            .await?
            .update_user(req)
            .await
    }
}

#[async_trait]
impl Tokens for Router {
    async fn create_install_token(&self, req: NewInstallTokenRequest) -> Result<InstallToken> {
        self.local.create_install_token(req).await
    }

    async fn create_provisioning_token(&self, token: ProvisioningToken) -> Result<()> {
        self.local.create_provisioning_token(token).await
    }

    async fn get_expand_token(&self, key: &SiteKey) -> Result<ProvisioningToken> {
        self.pick_client(&key.site_domain)
            .await?
            .get_expand_token(key)
            .await
    }

    async fn get_trusted_cluster_token(&self, key: &SiteKey) -> Result<String> {
        self.pick_client(&key.site_domain)
            .await?
            .get_trusted_cluster_token(key)
            .await
    }
}

#[async_trait]
impl ApiKeys for Router {
    async fn create_api_key(&self, req: NewApiKeyRequest) -> Result<ApiKey> {
        self.local.create_api_key(req).await
    }

    async fn get_api_keys(&self, user_email: &str) -> Result<Vec<ApiKey>> {
        self.local.get_api_keys(user_email).await
    }

    async fn delete_api_key(&self, user_email: &str, token: &str) -> Result<()> {
        self.local.delete_api_key(user_email, token).await
    }
}

// ── Cluster documents ────────────────────────────────────────────────

#[async_trait]
impl Monitoring for Router {
    async fn get_alerts(&self, key: &SiteKey) -> Result<Vec<Alert>> {
        self.pick_client(&key.site_domain)
            .await?
            .get_alerts(key)
            .await
    }

    async fn update_alert(&self, key: &SiteKey, alert: Alert) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .update_alert(key, alert)
            .await
    }

    async fn delete_alert(&self, key: &SiteKey, name: &str) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .delete_alert(key, name)
            .await
    }
}

#[async_trait]
impl Smtp for Router {
    async fn get_smtp_config(&self, key: &SiteKey) -> Result<SmtpConfig> {
        self.pick_client(&key.site_domain)
            .await?
            .get_smtp_config(key)
            .await
    }

    async fn update_smtp_config(&self, key: &SiteKey, config: SmtpConfig) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .update_smtp_config(key, config)
            .await
    }

    async fn delete_smtp_config(&self, key: &SiteKey) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .delete_smtp_config(key)
            .await
    }
}

#[async_trait]
impl LogForwarders for Router {
    async fn get_log_forwarders(&self, key: &SiteKey) -> Result<Vec<LogForwarder>> {
        self.pick_client(&key.site_domain)
            .await?
            .get_log_forwarders(key)
            .await
    }

    async fn create_log_forwarder(&self, key: &SiteKey, forwarder: LogForwarder) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .create_log_forwarder(key, forwarder)
            .await
    }

    async fn update_log_forwarder(&self, key: &SiteKey, forwarder: LogForwarder) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .update_log_forwarder(key, forwarder)
            .await
    }

    async fn delete_log_forwarder(&self, key: &SiteKey, name: &str) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .delete_log_forwarder(key, name)
            .await
    }
}

#[async_trait]
impl Certificates for Router {
    async fn get_cluster_certificate(
        &self,
        key: &SiteKey,
        with_secrets: bool,
    ) -> Result<ClusterCertificate> {
        self.pick_client(&key.site_domain)
            .await?
            .get_cluster_certificate(key, with_secrets)
            .await
    }

    async fn update_cluster_certificate(
        &self,
        req: UpdateCertificateRequest,
    ) -> Result<ClusterCertificate> {
        self.pick_client(&req.key.site_domain)
            .await?
            .update_cluster_certificate(req)
            .await
    }

    async fn delete_cluster_certificate(&self, key: &SiteKey) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .delete_cluster_certificate(key)
            .await
    }
}

#[async_trait]
impl Leader for Router {
    async fn step_down(&self, key: &SiteKey) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .step_down(key)
            .await
    }
}

// ── Install and updates ──────────────────────────────────────────────

#[async_trait]
impl Install for Router {
    async fn get_app_installer(&self, req: AppInstallerRequest) -> Result<Bytes> {
        self.local.get_app_installer(req).await
    }

    async fn get_site_install_operation_agent_report(
        &self,
        key: &SiteOperationKey,
    ) -> Result<AgentReport> {
        self.wizard_client(&key.site_domain)
            .await?
            .get_site_install_operation_agent_report(key)
            .await
    }

    async fn site_install_operation_start(&self, key: &SiteOperationKey) -> Result<()> {
        self.wizard_client(&key.site_domain)
            .await?
            .site_install_operation_start(key)
            .await
    }

    async fn get_site_expand_operation_agent_report(
        &self,
        key: &SiteOperationKey,
    ) -> Result<AgentReport> {
        self.pick_client(&key.site_domain)
            .await?
            .get_site_expand_operation_agent_report(key)
            .await
    }

    async fn site_expand_operation_start(&self, key: &SiteOperationKey) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .site_expand_operation_start(key)
            .await
    }
}

#[async_trait]
impl Updates for Router {
    async fn check_for_update(&self, key: &SiteKey) -> Result<Option<Locator>> {
        self.pick_client(&key.site_domain)
            .await?
            .check_for_update(key)
            .await
    }

    async fn download_update(&self, req: DownloadUpdateRequest) -> Result<()> {
        self.pick_client(&req.key.site_domain)
            .await?
            .download_update(req)
            .await
    }

    async fn enable_periodic_updates(&self, req: EnablePeriodicUpdatesRequest) -> Result<()> {
        self.pick_client(&req.key.site_domain)
            .await?
            .enable_periodic_updates(req)
            .await
    }

    async fn disable_periodic_updates(&self, key: &SiteKey) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .disable_periodic_updates(key)
            .await
    }
}

#[async_trait]
impl RuntimeEnvironment for Router {
    async fn get_cluster_environment_variables(
        &self,
        key: &SiteKey,
    ) -> Result<ClusterEnvironment> {
        self.pick_client(&key.site_domain)
            .await?
            .get_cluster_environment_variables(key)
            .await
    }

    async fn create_update_env_operation(
        &self,
        req: CreateUpdateEnvOperationRequest,
    ) -> Result<SiteOperationKey> {
        self.pick_client(&req.key.site_domain)
            .await?
            .create_update_env_operation(req)
            .await
    }
}

#[async_trait]
impl ClusterConfig for Router {
    async fn get_cluster_configuration(&self, key: &SiteKey) -> Result<ClusterConfiguration> {
        self.pick_client(&key.site_domain)
            .await?
            .get_cluster_configuration(key)
            .await
    }

    async fn create_update_config_operation(
        &self,
        req: CreateUpdateConfigOperationRequest,
    ) -> Result<SiteOperationKey> {
        self.pick_client(&req.key.site_domain)
            .await?
            .create_update_config_operation(req)
            .await
    }
}

#[async_trait]
impl PersistentStorageConfig for Router {
    async fn get_persistent_storage(&self, key: &SiteKey) -> Result<PersistentStorage> {
        self.pick_client(&key.site_domain)
            .await?
            .get_persistent_storage(key)
            .await
    }

    async fn update_persistent_storage(&self, req: UpdatePersistentStorageRequest) -> Result<()> {
        self.pick_client(&req.key.site_domain)
            .await?
            .update_persistent_storage(req)
            .await
    }
}

#[async_trait]
impl Audit for Router {
    async fn emit_audit_event(&self, req: AuditEventRequest) -> Result<()> {
        self.pick_client(&req.key.site_domain)
            .await?
            .emit_audit_event(req)
            .await
    }
}

#[async_trait]
impl Endpoints for Router {
    async fn get_application_endpoints(&self, key: &SiteKey) -> Result<Vec<Endpoint>> {
        self.pick_client(&key.site_domain)
            .await?
            .get_application_endpoints(key)
            .await
    }
}

#[async_trait]
impl Status for Router {
    async fn check_site_status(&self, key: &SiteKey) -> Result<()> {
        self.pick_client(&key.site_domain)
            .await?
            .check_site_status(key)
            .await
    }

    async fn get_cluster_nodes(&self, key: &SiteKey) -> Result<Vec<ClusterNode>> {
        self.pick_client(&key.site_domain)
            .await?
            .get_cluster_nodes(key)
            .await
    }
}

impl Operator for Router {
    fn local_operator(&self) -> Option<Arc<dyn Operator>> {
        Some(self.local())
    }
}
