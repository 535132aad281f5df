//! Identity store consumed by the operator and its access-control layer.
//!
//! [`Identity`] is the storage contract for users and the credentials
//! attached to them (install and provisioning tokens, API keys, invites,
//! reset tokens, passwords). [`IdentityService`] is the in-process
//! implementation. Certificate signing is a separate collaborator,
//! [`CertAuthority`], since it needs key material the store never holds.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::Rng;
use rand::distributions::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::model::{
    ApiKey, InstallToken, ProvisioningToken, ProvisioningTokenType, User, UserInvite, UserToken,
};
use crate::operator::{SshSignRequest, SshSignResponse, TlsSignResponse};

const TOKEN_LENGTH: usize = 32;
const PASSWORD_LENGTH: usize = 20;

/// Random alphanumeric token.
pub fn generate_token() -> String {
    random_string(TOKEN_LENGTH)
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

// ── Contracts ────────────────────────────────────────────────────────

#[async_trait]
pub trait Identity: Send + Sync {
    // Users
    async fn upsert_user(&self, user: User) -> Result<()>;
    async fn get_user(&self, name: &str) -> Result<User>;
    async fn get_users(&self, account_id: &str) -> Result<Vec<User>>;
    async fn delete_user(&self, name: &str) -> Result<()>;
    /// Replace the password with a generated one and return it.
    async fn reset_password(&self, name: &str) -> Result<String>;
    async fn check_password(&self, name: &str, password: &str) -> Result<()>;

    // Install tokens
    async fn create_install_token(&self, token: InstallToken) -> Result<InstallToken>;
    async fn get_install_token(&self, token: &str) -> Result<InstallToken>;
    async fn get_install_token_for_user(&self, user_email: &str) -> Result<InstallToken>;
    /// Bind a token to one cluster and repository. Rebinding to a
    /// different cluster or repository fails with `BadParameter`.
    async fn update_install_token(
        &self,
        token: &str,
        site_domain: &str,
        repository: &str,
    ) -> Result<InstallToken>;

    // Provisioning tokens
    async fn create_provisioning_token(&self, token: ProvisioningToken) -> Result<()>;
    async fn get_provisioning_token(&self, token: &str) -> Result<ProvisioningToken>;
    async fn get_site_provisioning_tokens(&self, site_domain: &str)
    -> Result<Vec<ProvisioningToken>>;

    // API keys
    async fn create_api_key(&self, key: ApiKey) -> Result<ApiKey>;
    async fn get_api_keys(&self, user_email: &str) -> Result<Vec<ApiKey>>;
    async fn delete_api_key(&self, user_email: &str, token: &str) -> Result<()>;

    // Invites and reset tokens
    async fn upsert_user_invite(&self, invite: UserInvite) -> Result<()>;
    async fn get_user_invites(&self) -> Result<Vec<UserInvite>>;
    async fn delete_user_invite(&self, name: &str) -> Result<()>;
    async fn create_user_token(&self, token: UserToken) -> Result<UserToken>;
    async fn get_user_token(&self, token: &str) -> Result<UserToken>;
}

/// Signs TLS and SSH credentials for a cluster.
#[async_trait]
pub trait CertAuthority: Send + Sync {
    async fn sign_tls(&self, cluster: &str, csr_pem: &str, ttl: Duration)
    -> Result<TlsSignResponse>;
    async fn sign_ssh(&self, cluster: &str, req: &SshSignRequest) -> Result<SshSignResponse>;
}

// ── In-process store ─────────────────────────────────────────────────

#[derive(Default)]
pub struct IdentityService {
    users: DashMap<String, User>,
    passwords: DashMap<String, SecretString>,
    install_tokens: DashMap<String, InstallToken>,
    provisioning_tokens: DashMap<String, ProvisioningToken>,
    api_keys: DashMap<String, ApiKey>,
    invites: DashMap<String, UserInvite>,
    user_tokens: DashMap<String, UserToken>,
}

impl IdentityService {
    pub fn new() -> Self {
        Self::default()
    }
}

fn expired(expires: Option<chrono::DateTime<Utc>>) -> bool {
    expires.is_some_and(|at| at <= Utc::now())
}

#[async_trait]
impl Identity for IdentityService {
    async fn upsert_user(&self, user: User) -> Result<()> {
        user.check()?;
        self.users.insert(user.name.clone(), user);
        Ok(())
    }

    async fn get_user(&self, name: &str) -> Result<User> {
        self.users
            .get(name)
            .map(|u| u.clone())
            .ok_or_else(|| CoreError::not_found("user", name))
    }

    async fn get_users(&self, account_id: &str) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| account_id.is_empty() || u.account_id == account_id)
            .map(|u| u.clone())
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn delete_user(&self, name: &str) -> Result<()> {
        self.users
            .remove(name)
            .ok_or_else(|| CoreError::not_found("user", name))?;
        self.passwords.remove(name);
        self.api_keys.retain(|_, key| key.user_email != name);
        Ok(())
    }

    async fn reset_password(&self, name: &str) -> Result<String> {
        if !self.users.contains_key(name) {
            return Err(CoreError::not_found("user", name));
        }
        let password = random_string(PASSWORD_LENGTH);
        self.passwords
            .insert(name.to_owned(), SecretString::from(password.clone()));
        debug!(user = name, "password reset");
        Ok(password)
    }

    async fn check_password(&self, name: &str, password: &str) -> Result<()> {
        match self.passwords.get(name) {
            Some(stored) if stored.expose_secret() == password => Ok(()),
            _ => Err(CoreError::access_denied("bad username or password")),
        }
    }

    async fn create_install_token(&self, token: InstallToken) -> Result<InstallToken> {
        match self.install_tokens.entry(token.token.clone()) {
            Entry::Occupied(_) => Err(CoreError::already_exists("install token already exists")),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(token)
            }
        }
    }

    async fn get_install_token(&self, token: &str) -> Result<InstallToken> {
        self.install_tokens
            .get(token)
            .filter(|t| !expired(t.expires))
            .map(|t| t.clone())
            .ok_or_else(|| CoreError::not_found("install token", "<redacted>"))
    }

    async fn get_install_token_for_user(&self, user_email: &str) -> Result<InstallToken> {
        self.install_tokens
            .iter()
            .find(|t| t.user_email == user_email && !expired(t.expires))
            .map(|t| t.clone())
            .ok_or_else(|| CoreError::not_found("install token", user_email))
    }

    async fn update_install_token(
        &self,
        token: &str,
        site_domain: &str,
        repository: &str,
    ) -> Result<InstallToken> {
        let mut entry = self
            .install_tokens
            .get_mut(token)
            .filter(|t| !expired(t.expires))
            .ok_or_else(|| CoreError::not_found("install token", "<redacted>"))?;

        if let Some(bound) = &entry.site_domain {
            if bound != site_domain {
                return Err(CoreError::bad_parameter(format!(
                    "install token is bound to cluster {bound}"
                )));
            }
        }
        if let Some(bound) = &entry.repository {
            if bound != repository {
                return Err(CoreError::bad_parameter(format!(
                    "install token is bound to repository {bound}"
                )));
            }
        }
        entry.site_domain = Some(site_domain.to_owned());
        entry.repository = Some(repository.to_owned());
        Ok(entry.clone())
    }

    async fn create_provisioning_token(&self, token: ProvisioningToken) -> Result<()> {
        token.check()?;
        self.provisioning_tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn get_provisioning_token(&self, token: &str) -> Result<ProvisioningToken> {
        self.provisioning_tokens
            .get(token)
            .filter(|t| !expired(t.expires))
            .map(|t| t.clone())
            .ok_or_else(|| CoreError::not_found("provisioning token", "<redacted>"))
    }

    async fn get_site_provisioning_tokens(
        &self,
        site_domain: &str,
    ) -> Result<Vec<ProvisioningToken>> {
        let mut tokens: Vec<ProvisioningToken> = self
            .provisioning_tokens
            .iter()
            .filter(|t| t.site_domain == site_domain && !expired(t.expires))
            .map(|t| t.clone())
            .collect();
        // Expand tokens first so lookups for joining nodes hit them.
        tokens.sort_by_key(|t| t.token_type != ProvisioningTokenType::Expand);
        Ok(tokens)
    }

    async fn create_api_key(&self, key: ApiKey) -> Result<ApiKey> {
        if !self.users.contains_key(&key.user_email) {
            return Err(CoreError::not_found("user", &key.user_email));
        }
        match self.api_keys.entry(key.token.clone()) {
            Entry::Occupied(_) => Err(CoreError::already_exists("API key already exists")),
            Entry::Vacant(slot) => {
                slot.insert(key.clone());
                Ok(key)
            }
        }
    }

    async fn get_api_keys(&self, user_email: &str) -> Result<Vec<ApiKey>> {
        Ok(self
            .api_keys
            .iter()
            .filter(|k| k.user_email == user_email)
            .map(|k| k.clone())
            .collect())
    }

    async fn delete_api_key(&self, user_email: &str, token: &str) -> Result<()> {
        self.api_keys
            .remove_if(token, |_, k| k.user_email == user_email)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("API key", "<redacted>"))
    }

    async fn upsert_user_invite(&self, invite: UserInvite) -> Result<()> {
        self.invites.insert(invite.name.clone(), invite);
        Ok(())
    }

    async fn get_user_invites(&self) -> Result<Vec<UserInvite>> {
        let mut invites: Vec<UserInvite> = self
            .invites
            .iter()
            .filter(|i| i.expires > Utc::now())
            .map(|i| i.clone())
            .collect();
        invites.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(invites)
    }

    async fn delete_user_invite(&self, name: &str) -> Result<()> {
        self.invites
            .remove(name)
            .ok_or_else(|| CoreError::not_found("user invite", name))?;
        self.user_tokens.retain(|_, t| t.user != name);
        Ok(())
    }

    async fn create_user_token(&self, token: UserToken) -> Result<UserToken> {
        self.user_tokens.insert(token.token.clone(), token.clone());
        Ok(token)
    }

    async fn get_user_token(&self, token: &str) -> Result<UserToken> {
        self.user_tokens
            .get(token)
            .filter(|t| t.expires > Utc::now())
            .map(|t| t.clone())
            .ok_or_else(|| CoreError::not_found("user token", "<redacted>"))
    }
}
