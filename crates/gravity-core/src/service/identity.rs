use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use super::{AUTH_GATEWAY, OperatorService, SINGLETON, TRUSTED_CLUSTER_TOKEN};
use crate::error::{CoreError, Result};
use crate::model::{
    ApiKey, AuthGateway, InstallToken, ProvisioningToken, ProvisioningTokenType, SiteKey, User,
    UserInvite, UserToken, UserTokenType, UserType,
};
use crate::operator::{
    ApiKeys, CreateUserInviteRequest, CreateUserResetRequest, DeleteUserInviteRequest, Identity,
    NewApiKeyRequest, NewInstallTokenRequest, ResetUserPasswordRequest, SshSignRequest,
    SshSignResponse, TlsSignRequest, TlsSignResponse, Tokens, UpdateUserRequest, Users,
};
use crate::users::generate_token;

fn expiry(ttl: Duration) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .map(|ttl| Utc::now() + ttl)
        .map_err(|e| CoreError::bad_parameter(format!("invalid TTL: {e}")))
}

impl OperatorService {
    async fn issue_user_token(
        &self,
        user: &str,
        token_type: UserTokenType,
        expires: DateTime<Utc>,
    ) -> Result<UserToken> {
        let token = generate_token();
        let path = match token_type {
            UserTokenType::Invite => "newuser",
            UserTokenType::Reset => "reset",
        };
        self.users
            .create_user_token(UserToken {
                url: format!("{}/web/{path}/{token}", self.public_url),
                token,
                token_type,
                user: user.to_owned(),
                expires,
            })
            .await
    }
}

// ── Users and credentials ────────────────────────────────────────────

#[async_trait]
impl Identity for OperatorService {
    async fn upsert_user(&self, key: &SiteKey, mut user: User) -> Result<()> {
        user.check()?;
        self.site(key).await?;
        user.account_id.clone_from(&key.account_id);
        self.users.upsert_user(user).await
    }

    async fn get_user(&self, key: &SiteKey, name: &str) -> Result<User> {
        key.check()?;
        self.users.get_user(name).await
    }

    async fn get_users(&self, account_id: &str) -> Result<Vec<User>> {
        self.users.get_users(account_id).await
    }

    async fn delete_local_user(&self, name: &str) -> Result<()> {
        self.users.delete_user(name).await?;
        info!(user = name, "User deleted");
        Ok(())
    }

    async fn sign_tls_key(&self, req: TlsSignRequest) -> Result<TlsSignResponse> {
        req.key.check()?;
        if req.csr.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter CSR"));
        }
        self.authority()?
            .sign_tls(&req.key.site_domain, &req.csr, req.ttl)
            .await
    }

    async fn sign_ssh_key(&self, req: SshSignRequest) -> Result<SshSignResponse> {
        req.check()?;
        self.authority()?.sign_ssh(&req.key.site_domain, &req).await
    }

    async fn upsert_auth_gateway(&self, key: &SiteKey, gateway: AuthGateway) -> Result<()> {
        self.site(key).await?;
        self.put_document(&key.site_domain, AUTH_GATEWAY, SINGLETON, &gateway)
            .await
    }

    async fn get_auth_gateway(&self, key: &SiteKey) -> Result<AuthGateway> {
        self.site(key).await?;
        self.get_document_or_default(&key.site_domain, AUTH_GATEWAY)
            .await
    }
}

#[async_trait]
impl Users for OperatorService {
    async fn create_user_invite(&self, req: CreateUserInviteRequest) -> Result<UserToken> {
        self.site(&req.key).await?;
        if req.name.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter Name"));
        }
        match self.users.get_user(&req.name).await {
            Ok(_) => {
                return Err(CoreError::already_exists(format!(
                    "user {} already exists",
                    req.name
                )));
            }
            Err(e) if !e.is_not_found() => return Err(e),
            Err(_) => {}
        }

        let expires = expiry(req.ttl)?;
        self.users
            .upsert_user_invite(UserInvite {
                name: req.name.clone(),
                created_by: req.key.site_domain.clone(),
                roles: req.roles,
                created: Utc::now(),
                expires,
            })
            .await?;
        info!(user = %req.name, "User invited");
        self.issue_user_token(&req.name, UserTokenType::Invite, expires)
            .await
    }

    async fn get_user_invites(&self, key: &SiteKey) -> Result<Vec<UserInvite>> {
        self.site(key).await?;
        self.users.get_user_invites().await
    }

    async fn delete_user_invite(&self, req: DeleteUserInviteRequest) -> Result<()> {
        req.key.check()?;
        self.users.delete_user_invite(&req.name).await
    }

    async fn create_user_reset(&self, req: CreateUserResetRequest) -> Result<UserToken> {
        self.site(&req.key).await?;
        let user = self.users.get_user(&req.name).await?;
        let expires = expiry(req.ttl)?;
        self.issue_user_token(&user.name, UserTokenType::Reset, expires)
            .await
    }

    async fn reset_user_password(&self, req: ResetUserPasswordRequest) -> Result<String> {
        req.key.check()?;
        self.users.reset_password(&req.email).await
    }

    async fn update_user(&self, req: UpdateUserRequest) -> Result<()> {
        req.key.check()?;
        let mut user = self.users.get_user(&req.name).await?;
        if let Some(full_name) = req.full_name {
            user.full_name = full_name;
        }
        if let Some(roles) = req.roles {
            user.roles = roles;
        }
        self.users.upsert_user(user).await
    }
}

// ── Tokens ───────────────────────────────────────────────────────────

#[async_trait]
impl Tokens for OperatorService {
    async fn create_install_token(&self, req: NewInstallTokenRequest) -> Result<InstallToken> {
        req.check()?;
        self.backend.get_account(&req.account_id).await?;

        // The token acts as an agent user; make sure one exists.
        match self.users.get_user(&req.user_email).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                let mut agent = User::new(req.user_email.clone(), UserType::Agent);
                agent.account_id.clone_from(&req.account_id);
                self.users.upsert_user(agent).await?;
            }
            Err(e) => return Err(e),
        }

        let token = InstallToken {
            token: req.token.unwrap_or_else(generate_token),
            account_id: req.account_id,
            user_email: req.user_email,
            site_domain: None,
            repository: req.repository,
            expires: None,
        };
        let token = self.users.create_install_token(token).await?;
        info!(user = %token.user_email, "Install token created");
        Ok(token)
    }

    async fn create_provisioning_token(&self, token: ProvisioningToken) -> Result<()> {
        self.users.create_provisioning_token(token).await
    }

    async fn get_expand_token(&self, key: &SiteKey) -> Result<ProvisioningToken> {
        self.site(key).await?;
        self.users
            .get_site_provisioning_tokens(&key.site_domain)
            .await?
            .into_iter()
            .find(|t| t.token_type == ProvisioningTokenType::Expand)
            .ok_or_else(|| CoreError::not_found("expand token", &key.site_domain))
    }

    async fn get_trusted_cluster_token(&self, key: &SiteKey) -> Result<String> {
        self.site(key).await?;
        match self
            .get_document::<String>(&key.site_domain, TRUSTED_CLUSTER_TOKEN, SINGLETON)
            .await
        {
            Err(e) if e.is_not_found() => {
                let token = generate_token();
                self.put_document(&key.site_domain, TRUSTED_CLUSTER_TOKEN, SINGLETON, &token)
                    .await?;
                Ok(token)
            }
            other => other,
        }
    }
}

#[async_trait]
impl ApiKeys for OperatorService {
    async fn create_api_key(&self, req: NewApiKeyRequest) -> Result<ApiKey> {
        if req.user_email.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter UserEmail"));
        }
        self.users
            .create_api_key(ApiKey {
                token: req.token.unwrap_or_else(generate_token),
                user_email: req.user_email,
                expires: req.expires,
            })
            .await
    }

    async fn get_api_keys(&self, user_email: &str) -> Result<Vec<ApiKey>> {
        self.users.get_api_keys(user_email).await
    }

    async fn delete_api_key(&self, user_email: &str, token: &str) -> Result<()> {
        self.users.delete_api_key(user_email, token).await
    }
}
