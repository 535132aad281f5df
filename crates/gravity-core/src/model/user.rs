// ── Users, tokens and keys ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserType {
    Admin,
    /// Machine identity used by install/expand agents.
    Agent,
    #[default]
    Regular,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Login name, usually an email.
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    pub fn new(name: impl Into<String>, user_type: UserType) -> Self {
        Self {
            name: name.into(),
            full_name: String::new(),
            user_type,
            account_id: String::new(),
            roles: Vec::new(),
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter Name"));
        }
        Ok(())
    }
}

/// One-time token that lets an agent user create one cluster.
///
/// Unbound until first use; the first `CreateSite` binds it to a cluster
/// and a repository and the binding never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallToken {
    pub token: String,
    pub account_id: String,
    pub user_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProvisioningTokenType {
    Install,
    Expand,
}

/// Token agents present when joining a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningToken {
    pub token: String,
    pub token_type: ProvisioningTokenType,
    pub account_id: String,
    pub site_domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub user_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

impl ProvisioningToken {
    pub fn check(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter Token"));
        }
        if self.site_domain.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter SiteDomain"));
        }
        if self.user_email.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter UserEmail"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub token: String,
    pub user_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInvite {
    pub name: String,
    pub created_by: String,
    pub roles: Vec<String>,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserTokenType {
    Invite,
    Reset,
}

/// Secret link handed to a user to accept an invite or reset a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserToken {
    pub token: String,
    pub token_type: UserTokenType,
    pub user: String,
    pub url: String,
    pub expires: DateTime<Utc>,
}
