//! [`Operator`] over the portal HTTP API.
//!
//! Every method maps to one portal endpoint under `portal/v1/`. Cluster
//! resources live under `accounts/{account}/sites/{domain}/`, operation
//! resources under `.../operations/common/{id}/`. Errors come back as
//! [`CoreError`] kinds through `From<gravity_api::Error>`, so callers
//! classify a remote failure exactly like a local one.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;

use gravity_api::PortalClient;

use crate::config::PortalConfig;
use crate::error::{CoreError, Result};
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

// ── Paths ────────────────────────────────────────────────────────────

fn site_path(key: &SiteKey, rest: &str) -> String {
    format!("accounts/{}/sites/{}{rest}", key.account_id, key.site_domain)
}

fn operations_path(key: &SiteKey, rest: &str) -> String {
    site_path(key, &format!("/operations{rest}"))
}

fn operation_path(key: &SiteOperationKey, rest: &str) -> String {
    operations_path(&key.site_key(), &format!("/common/{}{rest}", key.operation_id))
}

/// Remote operator bound to one portal.
#[derive(Debug, Clone)]
pub struct RemoteOperator {
    client: PortalClient,
}

impl RemoteOperator {
    pub fn new(client: PortalClient) -> Self {
        Self { client }
    }

    /// Build the HTTP client from a portal configuration.
    pub fn connect(config: &PortalConfig) -> Result<Self> {
        let client =
            PortalClient::new(config.url.as_str(), config.credentials(), &config.transport())?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &PortalClient {
        &self.client
    }

    async fn post_empty(&self, path: &str) -> Result<()> {
        Ok(self.client.post_no_response(path, &json!({})).await?)
    }
}

// ── Accounts and clusters ────────────────────────────────────────────

#[async_trait]
impl Accounts for RemoteOperator {
    async fn create_account(&self, req: NewAccount) -> Result<Account> {
        Ok(self.client.post("accounts", &req).await?)
    }

    async fn get_account(&self, account_id: &str) -> Result<Account> {
        Ok(self.client.get(&format!("accounts/{account_id}")).await?)
    }

    async fn get_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.client.get("accounts").await?)
    }
}

#[async_trait]
impl Sites for RemoteOperator {
    async fn create_site(&self, req: NewSite) -> Result<Site> {
        req.check()?;
        let path = format!("accounts/{}/sites", req.account_id);
        Ok(self.client.post(&path, &req).await?)
    }

    async fn get_sites(&self, account_id: &str) -> Result<Vec<Site>> {
        Ok(self
            .client
            .get(&format!("accounts/{account_id}/sites"))
            .await?)
    }

    async fn get_site(&self, key: &SiteKey) -> Result<Site> {
        key.check()?;
        Ok(self.client.get(&site_path(key, "")).await?)
    }

    async fn get_local_site(&self) -> Result<Site> {
        Ok(self.client.get("localsite").await?)
    }

    async fn get_site_by_domain(&self, domain: &str) -> Result<Site> {
        Ok(self.client.get(&format!("sites/domain/{domain}")).await?)
    }

    async fn delete_site(&self, key: &SiteKey) -> Result<()> {
        key.check()?;
        Ok(self.client.delete(&site_path(key, "")).await?)
    }

    async fn deactivate_site(&self, req: DeactivateSiteRequest) -> Result<()> {
        req.key.check()?;
        Ok(self
            .client
            .post_no_response(&site_path(&req.key, "/deactivate"), &req)
            .await?)
    }

    async fn activate_site(&self, req: ActivateSiteRequest) -> Result<()> {
        req.key.check()?;
        Ok(self
            .client
            .post_no_response(&site_path(&req.key, "/activate"), &req)
            .await?)
    }

    async fn complete_final_install_step(
        &self,
        req: CompleteFinalInstallStepRequest,
    ) -> Result<()> {
        req.key.check()?;
        Ok(self
            .client
            .post_no_response(&site_path(&req.key, "/complete"), &req)
            .await?)
    }

    async fn get_site_report(&self, req: ClusterReportRequest) -> Result<Bytes> {
        req.key.check()?;
        let params: Vec<(&str, String)> = req
            .since
            .map(|since| ("since", since.as_secs().to_string()))
            .into_iter()
            .collect();
        Ok(self
            .client
            .get_file(&site_path(&req.key, "/report"), &params)
            .await?)
    }
}

// ── Operations ───────────────────────────────────────────────────────

#[async_trait]
impl Operations for RemoteOperator {
    async fn get_site_operations(
        &self,
        key: &SiteKey,
        filter: &OperationsFilter,
    ) -> Result<Vec<SiteOperation>> {
        key.check()?;
        Ok(self
            .client
            .get_with_query(&operations_path(key, ""), &filter.url_values())
            .await?)
    }

    async fn get_site_operation(&self, key: &SiteOperationKey) -> Result<SiteOperation> {
        key.check()?;
        Ok(self.client.get(&operation_path(key, "")).await?)
    }

    async fn create_site_install_operation(
        &self,
        req: CreateSiteInstallOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.key.check()?;
        Ok(self
            .client
            .post(&operations_path(&req.key, "/install"), &req)
            .await?)
    }

    async fn create_site_expand_operation(
        &self,
        req: CreateSiteExpandOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.check()?;
        Ok(self
            .client
            .post(&operations_path(&req.key, "/expand"), &req)
            .await?)
    }

    async fn create_site_shrink_operation(
        &self,
        req: CreateSiteShrinkOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.check()?;
        Ok(self
            .client
            .post(&operations_path(&req.key, "/shrink"), &req)
            .await?)
    }

    async fn create_site_app_update_operation(
        &self,
        req: CreateSiteAppUpdateOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.key.check()?;
        Ok(self
            .client
            .post(&operations_path(&req.key, "/update"), &req)
            .await?)
    }

    async fn create_site_uninstall_operation(
        &self,
        req: CreateSiteUninstallOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.key.check()?;
        Ok(self
            .client
            .post(&operations_path(&req.key, "/uninstall"), &req)
            .await?)
    }

    async fn create_cluster_garbage_collect_operation(
        &self,
        req: CreateClusterGarbageCollectOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.key.check()?;
        Ok(self
            .client
            .post(&operations_path(&req.key, "/gc"), &req)
            .await?)
    }

    async fn create_cluster_reconfigure_operation(
        &self,
        req: CreateClusterReconfigureOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.check()?;
        Ok(self
            .client
            .post(&operations_path(&req.key, "/reconfigure"), &req)
            .await?)
    }

    async fn get_site_operation_progress(&self, key: &SiteOperationKey) -> Result<ProgressEntry> {
        key.check()?;
        Ok(self.client.get(&operation_path(key, "/progress")).await?)
    }

    async fn create_progress_entry(
        &self,
        key: &SiteOperationKey,
        entry: ProgressEntry,
    ) -> Result<()> {
        key.check()?;
        Ok(self
            .client
            .post_no_response(&operation_path(key, "/progress"), &entry)
            .await?)
    }

    async fn get_site_operation_logs(&self, key: &SiteOperationKey) -> Result<LogStream> {
        key.check()?;
        let lines = self.client.stream_lines(&operation_path(key, "/logs")).await?;
        Ok(lines.map(|line| line.map_err(CoreError::from)).boxed())
    }

    async fn create_log_entry(&self, key: &SiteOperationKey, entry: LogEntry) -> Result<()> {
        key.check()?;
        Ok(self
            .client
            .post_no_response(&operation_path(key, "/logs/entry"), &entry)
            .await?)
    }

    async fn set_operation_state(
        &self,
        key: &SiteOperationKey,
        req: SetOperationStateRequest,
    ) -> Result<()> {
        key.check()?;
        Ok(self
            .client
            .put_no_response(&operation_path(key, "/state"), &req)
            .await?)
    }

    async fn update_install_operation_state(
        &self,
        key: &SiteOperationKey,
        req: OperationUpdateRequest,
    ) -> Result<()> {
        key.check()?;
        req.check()?;
        let path = operations_path(&key.site_key(), &format!("/install/{}", key.operation_id));
        Ok(self.client.put_no_response(&path, &req).await?)
    }

    async fn update_expand_operation_state(
        &self,
        key: &SiteOperationKey,
        req: OperationUpdateRequest,
    ) -> Result<()> {
        key.check()?;
        req.check()?;
        let path = operations_path(&key.site_key(), &format!("/expand/{}", key.operation_id));
        Ok(self.client.put_no_response(&path, &req).await?)
    }

    async fn delete_site_operation(&self, key: &SiteOperationKey) -> Result<()> {
        key.check()?;
        Ok(self.client.delete(&operation_path(key, "")).await?)
    }
}

#[async_trait]
impl Validation for RemoteOperator {
    async fn validate_servers(
        &self,
        req: ValidateServersRequest,
    ) -> Result<ValidateServersResponse> {
        req.key.check()?;
        Ok(self
            .client
            .post(&site_path(&req.key, "/prechecks/servers"), &req)
            .await?)
    }

    async fn validate_domain_name(&self, domain: &str) -> Result<()> {
        Ok(self
            .client
            .get_file(&format!("domains/{domain}"), &[])
            .await
            .map(|_| ())?)
    }

    async fn validate_remote_access(
        &self,
        req: ValidateRemoteAccessRequest,
    ) -> Result<ValidateRemoteAccessResponse> {
        req.key.check()?;
        let key = req.key.operation(req.operation_id.clone());
        Ok(self
            .client
            .post(&operation_path(&key, "/remote-access"), &req)
            .await?)
    }
}

// ── Identity and users ───────────────────────────────────────────────

#[async_trait]
impl Identity for RemoteOperator {
    async fn upsert_user(&self, key: &SiteKey, user: User) -> Result<()> {
        key.check()?;
        Ok(self
            .client
            .post_no_response(&site_path(key, "/users"), &user)
            .await?)
    }

    async fn get_user(&self, key: &SiteKey, name: &str) -> Result<User> {
        key.check()?;
        Ok(self
            .client
            .get(&site_path(key, &format!("/users/{name}")))
            .await?)
    }

    async fn get_users(&self, account_id: &str) -> Result<Vec<User>> {
        Ok(self
            .client
            .get(&format!("accounts/{account_id}/users"))
            .await?)
    }

    async fn delete_local_user(&self, name: &str) -> Result<()> {
        Ok(self.client.delete(&format!("users/{name}")).await?)
    }

    async fn sign_tls_key(&self, req: TlsSignRequest) -> Result<TlsSignResponse> {
        req.key.check()?;
        Ok(self
            .client
            .post(&site_path(&req.key, "/sign/tls"), &req)
            .await?)
    }

    async fn sign_ssh_key(&self, req: SshSignRequest) -> Result<SshSignResponse> {
        req.check()?;
        Ok(self
            .client
            .post(&site_path(&req.key, "/sign/ssh"), &req)
            .await?)
    }

    async fn upsert_auth_gateway(&self, key: &SiteKey, gateway: AuthGateway) -> Result<()> {
        key.check()?;
        Ok(self
            .client
            .post_no_response(&site_path(key, "/authgateway"), &gateway)
            .await?)
    }

    async fn get_auth_gateway(&self, key: &SiteKey) -> Result<AuthGateway> {
        key.check()?;
        Ok(self.client.get(&site_path(key, "/authgateway")).await?)
    }
}

#[async_trait]
impl Users for RemoteOperator {
    async fn create_user_invite(&self, req: CreateUserInviteRequest) -> Result<UserToken> {
        req.key.check()?;
        Ok(self
            .client
            .post(&site_path(&req.key, "/invites"), &req)
            .await?)
    }

    async fn get_user_invites(&self, key: &SiteKey) -> Result<Vec<UserInvite>> {
        key.check()?;
        Ok(self.client.get(&site_path(key, "/invites")).await?)
    }

    async fn delete_user_invite(&self, req: DeleteUserInviteRequest) -> Result<()> {
        req.key.check()?;
        Ok(self
            .client
            .delete(&site_path(&req.key, &format!("/invites/{}", req.name)))
            .await?)
    }

    async fn create_user_reset(&self, req: CreateUserResetRequest) -> Result<UserToken> {
        req.key.check()?;
        Ok(self
            .client
            .post(&site_path(&req.key, "/resets"), &req)
            .await?)
    }

    async fn reset_user_password(&self, req: ResetUserPasswordRequest) -> Result<String> {
        req.key.check()?;
        let path = site_path(&req.key, &format!("/users/{}/password", req.email));
        Ok(self.client.put(&path, &req).await?)
    }

    async fn update_user(&self, req: UpdateUserRequest) -> Result<()> {
        req.key.check()?;
        let path = site_path(&req.key, &format!("/users/{}", req.name));
        Ok(self.client.put_no_response(&path, &req).await?)
    }
}

#[async_trait]
impl Tokens for RemoteOperator {
    async fn create_install_token(&self, req: NewInstallTokenRequest) -> Result<InstallToken> {
        req.check()?;
        Ok(self.client.post("tokens/install", &req).await?)
    }

    async fn create_provisioning_token(&self, token: ProvisioningToken) -> Result<()> {
        token.check()?;
        Ok(self
            .client
            .post_no_response("tokens/provision", &token)
            .await?)
    }

    async fn get_expand_token(&self, key: &SiteKey) -> Result<ProvisioningToken> {
        key.check()?;
        Ok(self.client.get(&site_path(key, "/tokens/expand")).await?)
    }

    async fn get_trusted_cluster_token(&self, key: &SiteKey) -> Result<String> {
        key.check()?;
        Ok(self
            .client
            .get(&site_path(key, "/tokens/trustedcluster"))
            .await?)
    }
}

#[async_trait]
impl ApiKeys for RemoteOperator {
    async fn create_api_key(&self, req: NewApiKeyRequest) -> Result<ApiKey> {
        let path = format!("apikeys/user/{}", req.user_email);
        Ok(self.client.post(&path, &req).await?)
    }

    async fn get_api_keys(&self, user_email: &str) -> Result<Vec<ApiKey>> {
        Ok(self
            .client
            .get(&format!("apikeys/user/{user_email}"))
            .await?)
    }

    async fn delete_api_key(&self, user_email: &str, token: &str) -> Result<()> {
        Ok(self
            .client
            .delete(&format!("apikeys/user/{user_email}/{token}"))
            .await?)
    }
}

// ── Cluster documents ────────────────────────────────────────────────

#[async_trait]
impl Monitoring for RemoteOperator {
    async fn get_alerts(&self, key: &SiteKey) -> Result<Vec<Alert>> {
        key.check()?;
        Ok(self.client.get(&site_path(key, "/monitoring/alerts")).await?)
    }

    async fn update_alert(&self, key: &SiteKey, alert: Alert) -> Result<()> {
        key.check()?;
        let path = site_path(key, &format!("/monitoring/alerts/{}", alert.name));
        Ok(self.client.put_no_response(&path, &alert).await?)
    }

    async fn delete_alert(&self, key: &SiteKey, name: &str) -> Result<()> {
        key.check()?;
        Ok(self
            .client
            .delete(&site_path(key, &format!("/monitoring/alerts/{name}")))
            .await?)
    }
}

#[async_trait]
impl Smtp for RemoteOperator {
    async fn get_smtp_config(&self, key: &SiteKey) -> Result<SmtpConfig> {
        key.check()?;
        Ok(self.client.get(&site_path(key, "/smtp")).await?)
    }

    async fn update_smtp_config(&self, key: &SiteKey, config: SmtpConfig) -> Result<()> {
        key.check()?;
        Ok(self
            .client
            .put_no_response(&site_path(key, "/smtp"), &config)
            .await?)
    }

    async fn delete_smtp_config(&self, key: &SiteKey) -> Result<()> {
        key.check()?;
        Ok(self.client.delete(&site_path(key, "/smtp")).await?)
    }
}

#[async_trait]
impl LogForwarders for RemoteOperator {
    async fn get_log_forwarders(&self, key: &SiteKey) -> Result<Vec<LogForwarder>> {
        key.check()?;
        Ok(self.client.get(&site_path(key, "/logs/forwarders")).await?)
    }

    async fn create_log_forwarder(&self, key: &SiteKey, forwarder: LogForwarder) -> Result<()> {
        key.check()?;
        Ok(self
            .client
            .post_no_response(&site_path(key, "/logs/forwarders"), &forwarder)
            .await?)
    }

    async fn update_log_forwarder(&self, key: &SiteKey, forwarder: LogForwarder) -> Result<()> {
        key.check()?;
        let path = site_path(key, &format!("/logs/forwarders/{}", forwarder.name));
        Ok(self.client.put_no_response(&path, &forwarder).await?)
    }

    async fn delete_log_forwarder(&self, key: &SiteKey, name: &str) -> Result<()> {
        key.check()?;
        Ok(self
            .client
            .delete(&site_path(key, &format!("/logs/forwarders/{name}")))
            .await?)
    }
}

#[async_trait]
impl Certificates for RemoteOperator {
    async fn get_cluster_certificate(
        &self,
        key: &SiteKey,
        with_secrets: bool,
    ) -> Result<ClusterCertificate> {
        key.check()?;
        Ok(self
            .client
            .get_with_params(
                &site_path(key, "/certificate"),
                &[("with_secrets", with_secrets.to_string())],
            )
            .await?)
    }

    async fn update_cluster_certificate(
        &self,
        req: UpdateCertificateRequest,
    ) -> Result<ClusterCertificate> {
        req.check()?;
        Ok(self
            .client
            .post(&site_path(&req.key, "/certificate"), &req)
            .await?)
    }

    async fn delete_cluster_certificate(&self, key: &SiteKey) -> Result<()> {
        key.check()?;
        Ok(self.client.delete(&site_path(key, "/certificate")).await?)
    }
}

#[async_trait]
impl Leader for RemoteOperator {
    async fn step_down(&self, key: &SiteKey) -> Result<()> {
        key.check()?;
        self.post_empty(&site_path(key, "/stepdown")).await
    }
}

// ── Install and updates ──────────────────────────────────────────────

#[async_trait]
impl Install for RemoteOperator {
    async fn get_app_installer(&self, req: AppInstallerRequest) -> Result<Bytes> {
        let app = &req.application;
        let path = format!(
            "accounts/{}/apps/{}/{}/{}/installer",
            req.account_id, app.repository, app.name, app.version
        );
        Ok(self
            .client
            .get_file(&path, &[("cache_images", req.cache_images.to_string())])
            .await?)
    }

    async fn get_site_install_operation_agent_report(
        &self,
        key: &SiteOperationKey,
    ) -> Result<AgentReport> {
        key.check()?;
        let path = operations_path(
            &key.site_key(),
            &format!("/install/{}/agent-report", key.operation_id),
        );
        Ok(self.client.get(&path).await?)
    }

    async fn site_install_operation_start(&self, key: &SiteOperationKey) -> Result<()> {
        key.check()?;
        let path = operations_path(
            &key.site_key(),
            &format!("/install/{}/start", key.operation_id),
        );
        self.post_empty(&path).await
    }

    async fn get_site_expand_operation_agent_report(
        &self,
        key: &SiteOperationKey,
    ) -> Result<AgentReport> {
        key.check()?;
        let path = operations_path(
            &key.site_key(),
            &format!("/expand/{}/agent-report", key.operation_id),
        );
        Ok(self.client.get(&path).await?)
    }

    async fn site_expand_operation_start(&self, key: &SiteOperationKey) -> Result<()> {
        key.check()?;
        let path = operations_path(
            &key.site_key(),
            &format!("/expand/{}/start", key.operation_id),
        );
        self.post_empty(&path).await
    }
}

#[async_trait]
impl Updates for RemoteOperator {
    async fn check_for_update(&self, key: &SiteKey) -> Result<Option<Locator>> {
        key.check()?;
        Ok(self.client.get(&site_path(key, "/updates/check")).await?)
    }

    async fn download_update(&self, req: DownloadUpdateRequest) -> Result<()> {
        req.key.check()?;
        Ok(self
            .client
            .post_no_response(&site_path(&req.key, "/updates/download"), &req)
            .await?)
    }

    async fn enable_periodic_updates(&self, req: EnablePeriodicUpdatesRequest) -> Result<()> {
        req.check()?;
        Ok(self
            .client
            .post_no_response(&site_path(&req.key, "/updates/periodic/enable"), &req)
            .await?)
    }

    async fn disable_periodic_updates(&self, key: &SiteKey) -> Result<()> {
        key.check()?;
        self.post_empty(&site_path(key, "/updates/periodic/disable"))
            .await
    }
}

#[async_trait]
impl RuntimeEnvironment for RemoteOperator {
    async fn get_cluster_environment_variables(
        &self,
        key: &SiteKey,
    ) -> Result<ClusterEnvironment> {
        key.check()?;
        Ok(self.client.get(&site_path(key, "/envars")).await?)
    }

    async fn create_update_env_operation(
        &self,
        req: CreateUpdateEnvOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.key.check()?;
        Ok(self
            .client
            .post(&operations_path(&req.key, "/envars"), &req)
            .await?)
    }
}

#[async_trait]
impl ClusterConfig for RemoteOperator {
    async fn get_cluster_configuration(&self, key: &SiteKey) -> Result<ClusterConfiguration> {
        key.check()?;
        Ok(self.client.get(&site_path(key, "/config")).await?)
    }

    async fn create_update_config_operation(
        &self,
        req: CreateUpdateConfigOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.check()?;
        Ok(self
            .client
            .post(&operations_path(&req.key, "/config"), &req)
            .await?)
    }
}

#[async_trait]
impl PersistentStorageConfig for RemoteOperator {
    async fn get_persistent_storage(&self, key: &SiteKey) -> Result<PersistentStorage> {
        key.check()?;
        Ok(self.client.get(&site_path(key, "/persistentstorage")).await?)
    }

    async fn update_persistent_storage(&self, req: UpdatePersistentStorageRequest) -> Result<()> {
        req.key.check()?;
        Ok(self
            .client
            .put_no_response(&site_path(&req.key, "/persistentstorage"), &req.resource)
            .await?)
    }
}

#[async_trait]
impl Audit for RemoteOperator {
    async fn emit_audit_event(&self, req: AuditEventRequest) -> Result<()> {
        req.key.check()?;
        Ok(self
            .client
            .post_no_response(&site_path(&req.key, "/events"), &req.event)
            .await?)
    }
}

#[async_trait]
impl Endpoints for RemoteOperator {
    async fn get_application_endpoints(&self, key: &SiteKey) -> Result<Vec<Endpoint>> {
        key.check()?;
        Ok(self.client.get(&site_path(key, "/endpoints")).await?)
    }
}

#[async_trait]
impl Status for RemoteOperator {
    async fn check_site_status(&self, key: &SiteKey) -> Result<()> {
        key.check()?;
        Ok(self
            .client
            .get_file(&site_path(key, "/status"), &[])
            .await
            .map(|_| ())?)
    }

    async fn get_cluster_nodes(&self, key: &SiteKey) -> Result<Vec<ClusterNode>> {
        key.check()?;
        Ok(self.client.get(&site_path(key, "/nodes")).await?)
    }
}

impl Operator for RemoteOperator {}
