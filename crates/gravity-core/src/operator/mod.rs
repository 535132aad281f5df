//! The `Operator` capability contract.
//!
//! Every action the system supports against a cluster is a method on one
//! of the capability traits below. `Operator` is their union. The local
//! service, the access-control decorator, the remote HTTP adapter and the
//! router each implement the full union, so they can be stacked and
//! swapped behind `Arc<dyn Operator>`.
//!
//! All methods are async and object safe (`async-trait`). Requests carry
//! their own keys and are validated with `check()` before any I/O.

pub mod requests;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::model::{
    Account, AgentReport, Alert, ApiKey, AuthGateway, ClusterCertificate, ClusterConfiguration,
    ClusterEnvironment, ClusterNode, Endpoint, InstallToken, Locator, LogEntry, LogForwarder,
    NewAccount, NewSite, PersistentStorage, ProgressEntry, ProvisioningToken, Site,
    SiteKey, SiteOperation, SiteOperationKey, SmtpConfig, User, UserInvite, UserToken,
};
use crate::ops::checks::ValidateServersResponse;
use crate::ops::filter::OperationsFilter;

pub use requests::*;

/// Lines of operation log output, in order.
pub type LogStream = BoxStream<'static, Result<String>>;

// ── Capability groups ────────────────────────────────────────────────

#[async_trait]
pub trait Accounts: Send + Sync {
    async fn create_account(&self, req: NewAccount) -> Result<Account>;
    async fn get_account(&self, account_id: &str) -> Result<Account>;
    async fn get_accounts(&self) -> Result<Vec<Account>>;
}

#[async_trait]
pub trait Sites: Send + Sync {
    async fn create_site(&self, req: NewSite) -> Result<Site>;
    async fn get_sites(&self, account_id: &str) -> Result<Vec<Site>>;
    async fn get_site(&self, key: &SiteKey) -> Result<Site>;
    /// The cluster this controller runs on.
    async fn get_local_site(&self) -> Result<Site>;
    async fn get_site_by_domain(&self, domain: &str) -> Result<Site>;
    async fn delete_site(&self, key: &SiteKey) -> Result<()>;
    async fn deactivate_site(&self, req: DeactivateSiteRequest) -> Result<()>;
    async fn activate_site(&self, req: ActivateSiteRequest) -> Result<()>;
    async fn complete_final_install_step(&self, req: CompleteFinalInstallStepRequest)
    -> Result<()>;
    /// Diagnostic bundle for the cluster.
    async fn get_site_report(&self, req: ClusterReportRequest) -> Result<Bytes>;
}

#[async_trait]
pub trait Operations: Send + Sync {
    /// Operations of a cluster, newest first, narrowed by `filter`.
    async fn get_site_operations(
        &self,
        key: &SiteKey,
        filter: &OperationsFilter,
    ) -> Result<Vec<SiteOperation>>;
    async fn get_site_operation(&self, key: &SiteOperationKey) -> Result<SiteOperation>;

    async fn create_site_install_operation(
        &self,
        req: CreateSiteInstallOperationRequest,
    ) -> Result<SiteOperationKey>;
    async fn create_site_expand_operation(
        &self,
        req: CreateSiteExpandOperationRequest,
    ) -> Result<SiteOperationKey>;
    async fn create_site_shrink_operation(
        &self,
        req: CreateSiteShrinkOperationRequest,
    ) -> Result<SiteOperationKey>;
    async fn create_site_app_update_operation(
        &self,
        req: CreateSiteAppUpdateOperationRequest,
    ) -> Result<SiteOperationKey>;
    async fn create_site_uninstall_operation(
        &self,
        req: CreateSiteUninstallOperationRequest,
    ) -> Result<SiteOperationKey>;
    async fn create_cluster_garbage_collect_operation(
        &self,
        req: CreateClusterGarbageCollectOperationRequest,
    ) -> Result<SiteOperationKey>;
    async fn create_cluster_reconfigure_operation(
        &self,
        req: CreateClusterReconfigureOperationRequest,
    ) -> Result<SiteOperationKey>;

    /// Most recent progress entry.
    async fn get_site_operation_progress(&self, key: &SiteOperationKey) -> Result<ProgressEntry>;
    async fn create_progress_entry(&self, key: &SiteOperationKey, entry: ProgressEntry)
    -> Result<()>;
    async fn get_site_operation_logs(&self, key: &SiteOperationKey) -> Result<LogStream>;
    async fn create_log_entry(&self, key: &SiteOperationKey, entry: LogEntry) -> Result<()>;
    async fn set_operation_state(
        &self,
        key: &SiteOperationKey,
        req: SetOperationStateRequest,
    ) -> Result<()>;
    async fn update_install_operation_state(
        &self,
        key: &SiteOperationKey,
        req: OperationUpdateRequest,
    ) -> Result<()>;
    async fn update_expand_operation_state(
        &self,
        key: &SiteOperationKey,
        req: OperationUpdateRequest,
    ) -> Result<()>;
    /// Only operations that have not started can be deleted.
    async fn delete_site_operation(&self, key: &SiteOperationKey) -> Result<()>;
}

#[async_trait]
pub trait Validation: Send + Sync {
    async fn validate_servers(&self, req: ValidateServersRequest)
    -> Result<ValidateServersResponse>;
    async fn validate_domain_name(&self, domain: &str) -> Result<()>;
    async fn validate_remote_access(
        &self,
        req: ValidateRemoteAccessRequest,
    ) -> Result<ValidateRemoteAccessResponse>;
}

#[async_trait]
pub trait Identity: Send + Sync {
    async fn upsert_user(&self, key: &SiteKey, user: User) -> Result<()>;
    async fn get_user(&self, key: &SiteKey, name: &str) -> Result<User>;
    async fn get_users(&self, account_id: &str) -> Result<Vec<User>>;
    async fn delete_local_user(&self, name: &str) -> Result<()>;
    async fn sign_tls_key(&self, req: TlsSignRequest) -> Result<TlsSignResponse>;
    async fn sign_ssh_key(&self, req: SshSignRequest) -> Result<SshSignResponse>;
    async fn upsert_auth_gateway(&self, key: &SiteKey, gateway: AuthGateway) -> Result<()>;
    async fn get_auth_gateway(&self, key: &SiteKey) -> Result<AuthGateway>;
}

#[async_trait]
pub trait Users: Send + Sync {
    async fn create_user_invite(&self, req: CreateUserInviteRequest) -> Result<UserToken>;
    async fn get_user_invites(&self, key: &SiteKey) -> Result<Vec<UserInvite>>;
    async fn delete_user_invite(&self, req: DeleteUserInviteRequest) -> Result<()>;
    async fn create_user_reset(&self, req: CreateUserResetRequest) -> Result<UserToken>;
    /// Generates and returns a new password.
    async fn reset_user_password(&self, req: ResetUserPasswordRequest) -> Result<String>;
    async fn update_user(&self, req: UpdateUserRequest) -> Result<()>;
}

#[async_trait]
pub trait Tokens: Send + Sync {
    async fn create_install_token(&self, req: NewInstallTokenRequest) -> Result<InstallToken>;
    async fn create_provisioning_token(&self, token: ProvisioningToken) -> Result<()>;
    async fn get_expand_token(&self, key: &SiteKey) -> Result<ProvisioningToken>;
    async fn get_trusted_cluster_token(&self, key: &SiteKey) -> Result<String>;
}

#[async_trait]
pub trait ApiKeys: Send + Sync {
    async fn create_api_key(&self, req: NewApiKeyRequest) -> Result<ApiKey>;
    async fn get_api_keys(&self, user_email: &str) -> Result<Vec<ApiKey>>;
    async fn delete_api_key(&self, user_email: &str, token: &str) -> Result<()>;
}

#[async_trait]
pub trait Monitoring: Send + Sync {
    async fn get_alerts(&self, key: &SiteKey) -> Result<Vec<Alert>>;
    async fn update_alert(&self, key: &SiteKey, alert: Alert) -> Result<()>;
    async fn delete_alert(&self, key: &SiteKey, name: &str) -> Result<()>;
}

#[async_trait]
pub trait Smtp: Send + Sync {
    async fn get_smtp_config(&self, key: &SiteKey) -> Result<SmtpConfig>;
    async fn update_smtp_config(&self, key: &SiteKey, config: SmtpConfig) -> Result<()>;
    async fn delete_smtp_config(&self, key: &SiteKey) -> Result<()>;
}

#[async_trait]
pub trait LogForwarders: Send + Sync {
    async fn get_log_forwarders(&self, key: &SiteKey) -> Result<Vec<LogForwarder>>;
    /// Fails with `AlreadyExists` when a forwarder of that name exists.
    async fn create_log_forwarder(&self, key: &SiteKey, forwarder: LogForwarder) -> Result<()>;
    async fn update_log_forwarder(&self, key: &SiteKey, forwarder: LogForwarder) -> Result<()>;
    async fn delete_log_forwarder(&self, key: &SiteKey, name: &str) -> Result<()>;
}

#[async_trait]
pub trait Certificates: Send + Sync {
    async fn get_cluster_certificate(
        &self,
        key: &SiteKey,
        with_secrets: bool,
    ) -> Result<ClusterCertificate>;
    async fn update_cluster_certificate(
        &self,
        req: UpdateCertificateRequest,
    ) -> Result<ClusterCertificate>;
    async fn delete_cluster_certificate(&self, key: &SiteKey) -> Result<()>;
}

#[async_trait]
pub trait Leader: Send + Sync {
    /// Make the controller give up leadership.
    async fn step_down(&self, key: &SiteKey) -> Result<()>;
}

#[async_trait]
pub trait Install: Send + Sync {
    async fn get_app_installer(&self, req: AppInstallerRequest) -> Result<Bytes>;
    async fn get_site_install_operation_agent_report(
        &self,
        key: &SiteOperationKey,
    ) -> Result<AgentReport>;
    async fn site_install_operation_start(&self, key: &SiteOperationKey) -> Result<()>;
    async fn get_site_expand_operation_agent_report(
        &self,
        key: &SiteOperationKey,
    ) -> Result<AgentReport>;
    async fn site_expand_operation_start(&self, key: &SiteOperationKey) -> Result<()>;
}

#[async_trait]
pub trait Updates: Send + Sync {
    /// Newer version of the installed application, if the catalog has one.
    async fn check_for_update(&self, key: &SiteKey) -> Result<Option<Locator>>;
    async fn download_update(&self, req: DownloadUpdateRequest) -> Result<()>;
    async fn enable_periodic_updates(&self, req: EnablePeriodicUpdatesRequest) -> Result<()>;
    async fn disable_periodic_updates(&self, key: &SiteKey) -> Result<()>;
}

#[async_trait]
pub trait RuntimeEnvironment: Send + Sync {
    async fn get_cluster_environment_variables(&self, key: &SiteKey)
    -> Result<ClusterEnvironment>;
    async fn create_update_env_operation(
        &self,
        req: CreateUpdateEnvOperationRequest,
    ) -> Result<SiteOperationKey>;
}

#[async_trait]
pub trait ClusterConfig: Send + Sync {
    async fn get_cluster_configuration(&self, key: &SiteKey) -> Result<ClusterConfiguration>;
    async fn create_update_config_operation(
        &self,
        req: CreateUpdateConfigOperationRequest,
    ) -> Result<SiteOperationKey>;
}

#[async_trait]
pub trait PersistentStorageConfig: Send + Sync {
    async fn get_persistent_storage(&self, key: &SiteKey) -> Result<PersistentStorage>;
    async fn update_persistent_storage(&self, req: UpdatePersistentStorageRequest) -> Result<()>;
}

#[async_trait]
pub trait Audit: Send + Sync {
    async fn emit_audit_event(&self, req: AuditEventRequest) -> Result<()>;
}

#[async_trait]
pub trait Endpoints: Send + Sync {
    async fn get_application_endpoints(&self, key: &SiteKey) -> Result<Vec<Endpoint>>;
}

#[async_trait]
pub trait Status: Send + Sync {
    async fn check_site_status(&self, key: &SiteKey) -> Result<()>;
    async fn get_cluster_nodes(&self, key: &SiteKey) -> Result<Vec<ClusterNode>>;
}

// ── The union ────────────────────────────────────────────────────────

/// Every capability at once.
///
/// Implementations that wrap an in-process operator behind a remote one
/// override [`Operator::local_operator`]; access control uses it to retry
/// cluster lookups locally.
pub trait Operator:
    Accounts
    + Sites
    + Operations
    + Validation
    + Identity
    + Users
    + Tokens
    + ApiKeys
    + Monitoring
    + Smtp
    + LogForwarders
    + Certificates
    + Leader
    + Install
    + Updates
    + RuntimeEnvironment
    + ClusterConfig
    + PersistentStorageConfig
    + Audit
    + Endpoints
    + Status
{
    fn local_operator(&self) -> Option<Arc<dyn Operator>> {
        None
    }
}
