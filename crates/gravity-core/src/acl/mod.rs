//! Access control in front of an operator.
//!
//! [`OperatorAcl`] implements [`Operator`] by authorizing every call
//! against an [`AccessChecker`] and only then delegating to the wrapped
//! operator. A denied call returns the checker's error and touches
//! nothing.
//!
//! Three paths deviate from a plain permission check:
//!
//! - Self-service: users may manage their own password, API keys, install
//!   tokens and SSH certificates without the user-admin permission.
//! - `create_site` falls back to the caller's one-time install token. The
//!   token gets bound to the requested cluster and repository and the
//!   check is repeated against the narrow role the binding grants.
//! - Cluster lookups retry against the local operator when the wrapped
//!   operator exposes one and the first lookup fails.
//!
//! The check and the delegated call are not atomic: a role revoked in
//! between does not stop a call already past its check.

pub mod access;
pub mod rules;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::FromDer;

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
use crate::users;

use access::{AccessChecker, DEFAULT_NAMESPACE, ResourceContext, RoleSet};
use rules::Rule;

/// Identity the Kubernetes API forwarder authenticates with. Any user may
/// request a certificate for it.
pub const KUBE_FORWARDER_USER: &str = "kube-forwarder";

/// Common name of a PEM-encoded certificate signing request.
pub fn csr_common_name(pem: &str) -> Result<String> {
    let (_, pem) = parse_x509_pem(pem.as_bytes())
        .map_err(|e| CoreError::bad_parameter(format!("invalid CSR PEM: {e}")))?;
    let (_, csr) = X509CertificationRequest::from_der(&pem.contents)
        .map_err(|e| CoreError::bad_parameter(format!("invalid CSR: {e}")))?;
    let cn = csr
        .certification_request_info
        .subject
        .iter_common_name()
        .next()
        .ok_or_else(|| CoreError::bad_parameter("CSR has no common name"))?;
    cn.as_str()
        .map(str::to_owned)
        .map_err(|e| CoreError::bad_parameter(format!("invalid CSR common name: {e}")))
}

/// Authorizing wrapper around an [`Operator`].
pub struct OperatorAcl {
    operator: Arc<dyn Operator>,
    users: Arc<dyn users::Identity>,
    user: User,
    checker: Arc<dyn AccessChecker>,
}

impl OperatorAcl {
    pub fn new(
        operator: Arc<dyn Operator>,
        users: Arc<dyn users::Identity>,
        user: User,
        checker: Arc<dyn AccessChecker>,
    ) -> Self {
        Self {
            operator,
            users,
            user,
            checker,
        }
    }

    /// Wrap `operator` for `user` with the roles the user carries.
    pub fn for_user(
        operator: Arc<dyn Operator>,
        users: Arc<dyn users::Identity>,
        user: User,
    ) -> Self {
        let checker = Arc::new(RoleSet::for_user(&user));
        Self::new(operator, users, user, checker)
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    // ── Checks ───────────────────────────────────────────────────────

    fn check_with(checker: &dyn AccessChecker, ctx: &ResourceContext, rule: Rule) -> Result<()> {
        let mut last = None;
        for requirement in rule {
            let outcome = requirement.iter().try_for_each(|(kind, verb)| {
                checker.check_access_to_rule(ctx, DEFAULT_NAMESPACE, *kind, *verb, false)
            });
            match outcome {
                Ok(()) => return Ok(()),
                Err(err) => last = Some(err),
            }
        }
        Err(last.unwrap_or_else(|| CoreError::access_denied("no permission configured")))
    }

    fn check(&self, ctx: &ResourceContext, rule: Rule) -> Result<()> {
        Self::check_with(self.checker.as_ref(), ctx, rule)
    }

    /// Check outside any cluster.
    fn action(&self, rule: Rule) -> Result<()> {
        self.check(&ResourceContext::default(), rule)
    }

    /// Always allowed on the caller's own account.
    fn current_user_actions(&self, username: &str, rule: Rule) -> Result<()> {
        if username == self.user.name {
            return Ok(());
        }
        self.action(rule)
    }

    async fn cluster_context(&self, domain: &str) -> Result<ResourceContext> {
        let local = self.operator.local_operator();
        let site = find_cluster(self.operator.as_ref(), local.as_deref(), domain).await?;
        Ok(ResourceContext::cluster(
            site.domain,
            site.app.package.repository,
        ))
    }

    async fn cluster_action(&self, domain: &str, rule: Rule) -> Result<()> {
        let ctx = self.cluster_context(domain).await?;
        self.check(&ctx, rule)
    }

    /// Create a cluster on the strength of the caller's install token.
    async fn install_token_exchange(&self, req: &NewSite, ctx: &ResourceContext) -> Result<()> {
        let token = self.users.get_install_token_for_user(&self.user.name).await?;
        if token.account_id != req.account_id {
            return Err(CoreError::access_denied(format!(
                "install token is not valid for account {}",
                req.account_id
            )));
        }
        let token = self
            .users
            .update_install_token(
                &token.token,
                &req.domain_name,
                &req.app_package.repository,
            )
            .await?;
        debug!(user = %self.user.name, cluster = %req.domain_name, "Install token bound");
        Self::check_with(&RoleSet::for_install_token(&token), ctx, rules::CREATE_CLUSTER)
    }
}

/// Look `domain` up on `primary`, retrying on `local` when that fails.
async fn find_cluster<P, L>(primary: &P, local: Option<&L>, domain: &str) -> Result<Site>
where
    P: Sites + ?Sized,
    L: Sites + ?Sized,
{
    match primary.get_site_by_domain(domain).await {
        Ok(site) => Ok(site),
        Err(err) => match local {
            Some(local) => {
                warn!(cluster = domain, error = %err, "Cluster lookup failed, retrying locally");
                local.get_site_by_domain(domain).await
            }
            None => Err(err),
        },
    }
}

// ── Accounts and clusters ────────────────────────────────────────────

#[async_trait]
impl Accounts for OperatorAcl {
    async fn create_account(&self, req: NewAccount) -> Result<Account> {
        self.action(rules::CREATE_ACCOUNT)?;
        self.operator.create_account(req).await
    }

    async fn get_account(&self, account_id: &str) -> Result<Account> {
        self.action(rules::READ_ACCOUNT)?;
        self.operator.get_account(account_id).await
    }

    async fn get_accounts(&self) -> Result<Vec<Account>> {
        self.action(rules::LIST_ACCOUNTS)?;
        self.operator.get_accounts().await
    }
}

#[async_trait]
impl Sites for OperatorAcl {
    async fn create_site(&self, req: NewSite) -> Result<Site> {
        req.check()?;
        let ctx = ResourceContext::cluster(&req.domain_name, &req.app_package.repository);
        if let Err(err) = self.check(&ctx, rules::CREATE_CLUSTER) {
            warn!(
                user = %self.user.name,
                cluster = %req.domain_name,
                "No cluster create permission, trying install token"
            );
            match self.install_token_exchange(&req, &ctx).await {
                Ok(()) => {}
                Err(lookup) if lookup.is_not_found() => return Err(err),
                Err(other) => return Err(other),
            }
        }
        self.operator.create_site(req).await
    }

    async fn get_sites(&self, account_id: &str) -> Result<Vec<Site>> {
        self.action(rules::LIST_CLUSTERS)?;
        self.operator.get_sites(account_id).await
    }

    async fn get_site(&self, key: &SiteKey) -> Result<Site> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_CLUSTER).await?;
        self.operator.get_site(key).await
    }

    async fn get_local_site(&self) -> Result<Site> {
        self.action(rules::READ_CLUSTER)?;
        self.operator.get_local_site().await
    }

    async fn get_site_by_domain(&self, domain: &str) -> Result<Site> {
        self.cluster_action(domain, rules::READ_CLUSTER).await?;
        self.operator.get_site_by_domain(domain).await
    }

    async fn delete_site(&self, key: &SiteKey) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::DELETE_CLUSTER)
            .await?;
        self.operator.delete_site(key).await
    }

    async fn deactivate_site(&self, req: DeactivateSiteRequest) -> Result<()> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.deactivate_site(req).await
    }

    async fn activate_site(&self, req: ActivateSiteRequest) -> Result<()> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.activate_site(req).await
    }

    async fn complete_final_install_step(
        &self,
        req: CompleteFinalInstallStepRequest,
    ) -> Result<()> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.complete_final_install_step(req).await
    }

    async fn get_site_report(&self, req: ClusterReportRequest) -> Result<Bytes> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::READ_CLUSTER)
            .await?;
        self.operator.get_site_report(req).await
    }
}

// ── Operations ───────────────────────────────────────────────────────

#[async_trait]
impl Operations for OperatorAcl {
    async fn get_site_operations(
        &self,
        key: &SiteKey,
        filter: &OperationsFilter,
    ) -> Result<Vec<SiteOperation>> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_CLUSTER)
            .await?;
        self.operator.get_site_operations(key, filter).await
    }

    async fn get_site_operation(&self, key: &SiteOperationKey) -> Result<SiteOperation> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_CLUSTER)
            .await?;
        self.operator.get_site_operation(key).await
    }

    async fn create_site_install_operation(
        &self,
        req: CreateSiteInstallOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.create_site_install_operation(req).await
    }

    async fn create_site_expand_operation(
        &self,
        req: CreateSiteExpandOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.create_site_expand_operation(req).await
    }

    async fn create_site_shrink_operation(
        &self,
        req: CreateSiteShrinkOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.create_site_shrink_operation(req).await
    }

    async fn create_site_app_update_operation(
        &self,
        req: CreateSiteAppUpdateOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.create_site_app_update_operation(req).await
    }

    async fn create_site_uninstall_operation(
        &self,
        req: CreateSiteUninstallOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::DELETE_CLUSTER)
            .await?;
        self.operator.create_site_uninstall_operation(req).await
    }

    async fn create_cluster_garbage_collect_operation(
        &self,
        req: CreateClusterGarbageCollectOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator
            .create_cluster_garbage_collect_operation(req)
            .await
    }

    async fn create_cluster_reconfigure_operation(
        &self,
        req: CreateClusterReconfigureOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.create_cluster_reconfigure_operation(req).await
    }

    async fn get_site_operation_progress(&self, key: &SiteOperationKey) -> Result<ProgressEntry> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_CLUSTER)
            .await?;
        self.operator.get_site_operation_progress(key).await
    }

    async fn create_progress_entry(
        &self,
        key: &SiteOperationKey,
        entry: ProgressEntry,
    ) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.create_progress_entry(key, entry).await
    }

    async fn get_site_operation_logs(&self, key: &SiteOperationKey) -> Result<LogStream> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_CLUSTER)
            .await?;
        self.operator.get_site_operation_logs(key).await
    }

    async fn create_log_entry(&self, key: &SiteOperationKey, entry: LogEntry) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.create_log_entry(key, entry).await
    }

    async fn set_operation_state(
        &self,
        key: &SiteOperationKey,
        req: SetOperationStateRequest,
    ) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.set_operation_state(key, req).await
    }

    async fn update_install_operation_state(
        &self,
        key: &SiteOperationKey,
        req: OperationUpdateRequest,
    ) -> Result<()> {
        key.check()?;
        req.check()?;
        self.cluster_action(&key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.update_install_operation_state(key, req).await
    }

    async fn update_expand_operation_state(
        &self,
        key: &SiteOperationKey,
        req: OperationUpdateRequest,
    ) -> Result<()> {
        key.check()?;
        req.check()?;
        self.cluster_action(&key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.update_expand_operation_state(key, req).await
    }

    async fn delete_site_operation(&self, key: &SiteOperationKey) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.delete_site_operation(key).await
    }
}

#[async_trait]
impl Validation for OperatorAcl {
    async fn validate_servers(
        &self,
        req: ValidateServersRequest,
    ) -> Result<ValidateServersResponse> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::READ_CLUSTER)
            .await?;
        self.operator.validate_servers(req).await
    }

    async fn validate_domain_name(&self, domain: &str) -> Result<()> {
        self.action(rules::LIST_CLUSTERS)?;
        self.operator.validate_domain_name(domain).await
    }

    async fn validate_remote_access(
        &self,
        req: ValidateRemoteAccessRequest,
    ) -> Result<ValidateRemoteAccessResponse> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.validate_remote_access(req).await
    }
}

// ── Identity and users ───────────────────────────────────────────────

#[async_trait]
impl Identity for OperatorAcl {
    async fn upsert_user(&self, key: &SiteKey, user: User) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::UPSERT_USER)
            .await?;
        self.operator.upsert_user(key, user).await
    }

    async fn get_user(&self, key: &SiteKey, name: &str) -> Result<User> {
        key.check()?;
        self.current_user_actions(name, rules::READ_USER)?;
        self.operator.get_user(key, name).await
    }

    async fn get_users(&self, account_id: &str) -> Result<Vec<User>> {
        self.action(rules::GET_USERS)?;
        self.operator.get_users(account_id).await
    }

    async fn delete_local_user(&self, name: &str) -> Result<()> {
        self.action(rules::DELETE_USER)?;
        self.operator.delete_local_user(name).await
    }

    async fn sign_tls_key(&self, req: TlsSignRequest) -> Result<TlsSignResponse> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::READ_CLUSTER)
            .await?;
        let common_name = csr_common_name(&req.csr)?;
        if common_name != self.user.name && common_name != KUBE_FORWARDER_USER {
            self.action(rules::CREATE_USER)?;
        }
        self.operator.sign_tls_key(req).await
    }

    async fn sign_ssh_key(&self, req: SshSignRequest) -> Result<SshSignResponse> {
        req.check()?;
        self.cluster_action(&req.key.site_domain, rules::READ_CLUSTER)
            .await?;
        self.current_user_actions(&req.user, rules::CREATE_USER)?;
        self.operator.sign_ssh_key(req).await
    }

    async fn upsert_auth_gateway(&self, key: &SiteKey, gateway: AuthGateway) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::UPSERT_AUTH_GATEWAY)
            .await?;
        self.operator.upsert_auth_gateway(key, gateway).await
    }

    async fn get_auth_gateway(&self, key: &SiteKey) -> Result<AuthGateway> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_AUTH_GATEWAY)
            .await?;
        self.operator.get_auth_gateway(key).await
    }
}

#[async_trait]
impl Users for OperatorAcl {
    async fn create_user_invite(&self, req: CreateUserInviteRequest) -> Result<UserToken> {
        req.key.check()?;
        self.action(rules::CREATE_USER)?;
        self.operator.create_user_invite(req).await
    }

    async fn get_user_invites(&self, key: &SiteKey) -> Result<Vec<UserInvite>> {
        key.check()?;
        self.action(rules::LIST_USERS)?;
        self.operator.get_user_invites(key).await
    }

    async fn delete_user_invite(&self, req: DeleteUserInviteRequest) -> Result<()> {
        req.key.check()?;
        self.action(rules::DELETE_USER)?;
        self.operator.delete_user_invite(req).await
    }

    async fn create_user_reset(&self, req: CreateUserResetRequest) -> Result<UserToken> {
        req.key.check()?;
        self.action(rules::UPDATE_USER)?;
        self.operator.create_user_reset(req).await
    }

    async fn reset_user_password(&self, req: ResetUserPasswordRequest) -> Result<String> {
        req.key.check()?;
        self.current_user_actions(&req.email, rules::UPDATE_USER)?;
        self.operator.reset_user_password(req).await
    }

    async fn update_user(&self, req: UpdateUserRequest) -> Result<()> {
        req.key.check()?;
        self.current_user_actions(&req.name, rules::UPDATE_USER)?;
        self.operator.update_user(req).await
    }
}

#[async_trait]
impl Tokens for OperatorAcl {
    async fn create_install_token(&self, req: NewInstallTokenRequest) -> Result<InstallToken> {
        req.check()?;
        self.current_user_actions(&req.user_email, rules::CREATE_TOKEN)?;
        self.operator.create_install_token(req).await
    }

    async fn create_provisioning_token(&self, token: ProvisioningToken) -> Result<()> {
        token.check()?;
        self.cluster_action(&token.site_domain, rules::CREATE_TOKEN)
            .await?;
        self.operator.create_provisioning_token(token).await
    }

    async fn get_expand_token(&self, key: &SiteKey) -> Result<ProvisioningToken> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_TOKEN)
            .await?;
        self.operator.get_expand_token(key).await
    }

    async fn get_trusted_cluster_token(&self, key: &SiteKey) -> Result<String> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_TOKEN)
            .await?;
        self.operator.get_trusted_cluster_token(key).await
    }
}

#[async_trait]
impl ApiKeys for OperatorAcl {
    async fn create_api_key(&self, req: NewApiKeyRequest) -> Result<ApiKey> {
        self.current_user_actions(&req.user_email, rules::CREATE_API_KEY)?;
        self.operator.create_api_key(req).await
    }

    async fn get_api_keys(&self, user_email: &str) -> Result<Vec<ApiKey>> {
        self.current_user_actions(user_email, rules::LIST_API_KEYS)?;
        self.operator.get_api_keys(user_email).await
    }

    async fn delete_api_key(&self, user_email: &str, token: &str) -> Result<()> {
        self.current_user_actions(user_email, rules::DELETE_API_KEY)?;
        self.operator.delete_api_key(user_email, token).await
    }
}

// ── Cluster documents ────────────────────────────────────────────────

#[async_trait]
impl Monitoring for OperatorAcl {
    async fn get_alerts(&self, key: &SiteKey) -> Result<Vec<Alert>> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::LIST_ALERTS)
            .await?;
        self.operator.get_alerts(key).await
    }

    async fn update_alert(&self, key: &SiteKey, alert: Alert) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::UPSERT_ALERT)
            .await?;
        self.operator.update_alert(key, alert).await
    }

    async fn delete_alert(&self, key: &SiteKey, name: &str) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::DELETE_ALERT)
            .await?;
        self.operator.delete_alert(key, name).await
    }
}

#[async_trait]
impl Smtp for OperatorAcl {
    async fn get_smtp_config(&self, key: &SiteKey) -> Result<SmtpConfig> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_SMTP).await?;
        self.operator.get_smtp_config(key).await
    }

    async fn update_smtp_config(&self, key: &SiteKey, config: SmtpConfig) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::UPSERT_SMTP)
            .await?;
        self.operator.update_smtp_config(key, config).await
    }

    async fn delete_smtp_config(&self, key: &SiteKey) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::DELETE_SMTP)
            .await?;
        self.operator.delete_smtp_config(key).await
    }
}

#[async_trait]
impl LogForwarders for OperatorAcl {
    async fn get_log_forwarders(&self, key: &SiteKey) -> Result<Vec<LogForwarder>> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::LIST_LOG_FORWARDERS)
            .await?;
        self.operator.get_log_forwarders(key).await
    }

    async fn create_log_forwarder(&self, key: &SiteKey, forwarder: LogForwarder) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::CREATE_LOG_FORWARDER)
            .await?;
        self.operator.create_log_forwarder(key, forwarder).await
    }

    async fn update_log_forwarder(&self, key: &SiteKey, forwarder: LogForwarder) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::UPDATE_LOG_FORWARDER)
            .await?;
        self.operator.update_log_forwarder(key, forwarder).await
    }

    async fn delete_log_forwarder(&self, key: &SiteKey, name: &str) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::DELETE_LOG_FORWARDER)
            .await?;
        self.operator.delete_log_forwarder(key, name).await
    }
}

#[async_trait]
impl Certificates for OperatorAcl {
    async fn get_cluster_certificate(
        &self,
        key: &SiteKey,
        with_secrets: bool,
    ) -> Result<ClusterCertificate> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_CERTIFICATE)
            .await?;
        if with_secrets {
            // Private keys only for callers who could replace them.
            self.cluster_action(&key.site_domain, rules::UPSERT_CERTIFICATE)
                .await?;
        }
        self.operator.get_cluster_certificate(key, with_secrets).await
    }

    async fn update_cluster_certificate(
        &self,
        req: UpdateCertificateRequest,
    ) -> Result<ClusterCertificate> {
        req.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPSERT_CERTIFICATE)
            .await?;
        self.operator.update_cluster_certificate(req).await
    }

    async fn delete_cluster_certificate(&self, key: &SiteKey) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::DELETE_CERTIFICATE)
            .await?;
        self.operator.delete_cluster_certificate(key).await
    }
}

#[async_trait]
impl Leader for OperatorAcl {
    async fn step_down(&self, key: &SiteKey) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.step_down(key).await
    }
}

// ── Install and updates ──────────────────────────────────────────────

#[async_trait]
impl Install for OperatorAcl {
    async fn get_app_installer(&self, req: AppInstallerRequest) -> Result<Bytes> {
        let ctx = ResourceContext::repository(&req.application.repository);
        self.check(&ctx, rules::READ_APP)?;
        self.operator.get_app_installer(req).await
    }

    async fn get_site_install_operation_agent_report(
        &self,
        key: &SiteOperationKey,
    ) -> Result<AgentReport> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_CLUSTER)
            .await?;
        self.operator
            .get_site_install_operation_agent_report(key)
            .await
    }

    async fn site_install_operation_start(&self, key: &SiteOperationKey) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.site_install_operation_start(key).await
    }

    async fn get_site_expand_operation_agent_report(
        &self,
        key: &SiteOperationKey,
    ) -> Result<AgentReport> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_CLUSTER)
            .await?;
        self.operator.get_site_expand_operation_agent_report(key).await
    }

    async fn site_expand_operation_start(&self, key: &SiteOperationKey) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.site_expand_operation_start(key).await
    }
}

#[async_trait]
impl Updates for OperatorAcl {
    async fn check_for_update(&self, key: &SiteKey) -> Result<Option<Locator>> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_CLUSTER)
            .await?;
        self.operator.check_for_update(key).await
    }

    async fn download_update(&self, req: DownloadUpdateRequest) -> Result<()> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::DOWNLOAD_UPDATE)
            .await?;
        self.operator.download_update(req).await
    }

    async fn enable_periodic_updates(&self, req: EnablePeriodicUpdatesRequest) -> Result<()> {
        req.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.enable_periodic_updates(req).await
    }

    async fn disable_periodic_updates(&self, key: &SiteKey) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.disable_periodic_updates(key).await
    }
}

#[async_trait]
impl RuntimeEnvironment for OperatorAcl {
    async fn get_cluster_environment_variables(
        &self,
        key: &SiteKey,
    ) -> Result<ClusterEnvironment> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_RUNTIME_ENV)
            .await?;
        self.operator.get_cluster_environment_variables(key).await
    }

    async fn create_update_env_operation(
        &self,
        req: CreateUpdateEnvOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_RUNTIME_ENV)
            .await?;
        self.operator.create_update_env_operation(req).await
    }
}

#[async_trait]
impl ClusterConfig for OperatorAcl {
    async fn get_cluster_configuration(&self, key: &SiteKey) -> Result<ClusterConfiguration> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_CLUSTER_CONFIG)
            .await?;
        self.operator.get_cluster_configuration(key).await
    }

    async fn create_update_config_operation(
        &self,
        req: CreateUpdateConfigOperationRequest,
    ) -> Result<SiteOperationKey> {
        req.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_CLUSTER_CONFIG)
            .await?;
        self.operator.create_update_config_operation(req).await
    }
}

#[async_trait]
impl PersistentStorageConfig for OperatorAcl {
    async fn get_persistent_storage(&self, key: &SiteKey) -> Result<PersistentStorage> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_PERSISTENT_STORAGE)
            .await?;
        self.operator.get_persistent_storage(key).await
    }

    async fn update_persistent_storage(&self, req: UpdatePersistentStorageRequest) -> Result<()> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_PERSISTENT_STORAGE)
            .await?;
        self.operator.update_persistent_storage(req).await
    }
}

#[async_trait]
impl Audit for OperatorAcl {
    async fn emit_audit_event(&self, req: AuditEventRequest) -> Result<()> {
        req.key.check()?;
        self.cluster_action(&req.key.site_domain, rules::UPDATE_CLUSTER)
            .await?;
        self.operator.emit_audit_event(req).await
    }
}

#[async_trait]
impl Endpoints for OperatorAcl {
    async fn get_application_endpoints(&self, key: &SiteKey) -> Result<Vec<Endpoint>> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_CLUSTER)
            .await?;
        self.operator.get_application_endpoints(key).await
    }
}

#[async_trait]
impl Status for OperatorAcl {
    async fn check_site_status(&self, key: &SiteKey) -> Result<()> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_CLUSTER)
            .await?;
        self.operator.check_site_status(key).await
    }

    async fn get_cluster_nodes(&self, key: &SiteKey) -> Result<Vec<ClusterNode>> {
        key.check()?;
        self.cluster_action(&key.site_domain, rules::READ_CLUSTER)
            .await?;
        self.operator.get_cluster_nodes(key).await
    }
}

impl Operator for OperatorAcl {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn csr(common_name: &str) -> String {
        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::new(vec![]).unwrap();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, common_name);
        params.serialize_request(&key).unwrap().pem().unwrap()
    }

    #[test]
    fn reads_csr_common_name() {
        assert_eq!(csr_common_name(&csr("alice@example.com")).unwrap(), "alice@example.com");
    }

    #[test]
    fn rejects_garbage_csr() {
        let err = csr_common_name("not a csr").unwrap_err();
        assert!(err.is_bad_parameter());
    }

    // ── Cluster lookup ───────────────────────────────────────────────

    /// Knows no clusters at all.
    struct Unreachable;

    #[async_trait]
    impl Sites for Unreachable {
        async fn create_site(&self, _req: NewSite) -> Result<Site> {
            Err(CoreError::unsupported("create_site"))
        }

        async fn get_sites(&self, _account_id: &str) -> Result<Vec<Site>> {
            Ok(Vec::new())
        }

        async fn get_site(&self, key: &SiteKey) -> Result<Site> {
            Err(CoreError::not_found("cluster", &key.site_domain))
        }

        async fn get_local_site(&self) -> Result<Site> {
            Err(CoreError::not_found("cluster", "local"))
        }

        async fn get_site_by_domain(&self, domain: &str) -> Result<Site> {
            Err(CoreError::not_found("cluster", domain))
        }

        async fn delete_site(&self, _key: &SiteKey) -> Result<()> {
            Err(CoreError::unsupported("delete_site"))
        }

        async fn deactivate_site(&self, _req: DeactivateSiteRequest) -> Result<()> {
            Err(CoreError::unsupported("deactivate_site"))
        }

        async fn activate_site(&self, _req: ActivateSiteRequest) -> Result<()> {
            Err(CoreError::unsupported("activate_site"))
        }

        async fn complete_final_install_step(
            &self,
            _req: CompleteFinalInstallStepRequest,
        ) -> Result<()> {
            Err(CoreError::unsupported("complete_final_install_step"))
        }

        async fn get_site_report(&self, _req: ClusterReportRequest) -> Result<Bytes> {
            Err(CoreError::unsupported("get_site_report"))
        }
    }

    async fn local_service() -> crate::OperatorService {
        let package = Locator::new("gravitational.io", "telekube", "5.5.0");
        let catalog = crate::MemoryCatalog::new();
        catalog.add(crate::Application {
            package: package.clone(),
            manifest: Default::default(),
        });
        let service = crate::OperatorService::new(
            Arc::new(crate::MemoryBackend::new()),
            Arc::new(crate::IdentityService::new()),
            Arc::new(catalog),
        );
        service
            .create_account(NewAccount {
                id: Some("a1".into()),
                org: "example.com".into(),
            })
            .await
            .unwrap();
        service
            .create_site(NewSite::new("a1", "example.com", package))
            .await
            .unwrap();
        service
    }

    #[tokio::test]
    async fn cluster_lookup_retries_on_local_operator() {
        let local = local_service().await;

        let site = find_cluster(&Unreachable, Some(&local), "example.com")
            .await
            .unwrap();
        assert_eq!(site.domain, "example.com");
    }

    #[tokio::test]
    async fn cluster_lookup_without_local_operator_fails() {
        let err = find_cluster(&Unreachable, None::<&Unreachable>, "example.com")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn cluster_lookup_prefers_primary() {
        let primary = local_service().await;

        let site = find_cluster(&primary, Some(&Unreachable), "example.com")
            .await
            .unwrap();
        assert_eq!(site.domain, "example.com");
    }
}
