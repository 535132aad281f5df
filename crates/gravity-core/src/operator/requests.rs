// ── Operator request and response types ──
//
// Most requests embed a `SiteKey` (flattened on the wire). Every request
// with a `check()` is validated before use; a missing field fails with
// `BadParameter` naming it.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::model::{
    AuditEvent, Locator, OperationState, PersistentStorage, ProgressEntry, Server, ServerInfo,
    ServerProfileRequest, SiteKey,
};

fn require(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CoreError::bad_parameter(format!("missing parameter {name}")));
    }
    Ok(())
}

// ── Sites ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivateSiteRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    #[serde(default)]
    pub reason: String,
    /// The cluster was stopped on purpose (not failed).
    #[serde(default)]
    pub stopped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateSiteRequest {
    #[serde(flatten)]
    pub key: SiteKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteFinalInstallStepRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    /// How long the wizard stays reachable after the final step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wizard_connection_ttl: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterReportRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<Duration>,
}

// ── Operations ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSiteInstallOperationRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    #[serde(default)]
    pub profiles: BTreeMap<String, ServerProfileRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    #[serde(default)]
    pub created_by: String,
}

impl CreateSiteInstallOperationRequest {
    pub fn new(key: SiteKey) -> Self {
        Self {
            key,
            profiles: BTreeMap::new(),
            flavor: None,
            created_by: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSiteExpandOperationRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub profiles: BTreeMap<String, ServerProfileRequest>,
    #[serde(default)]
    pub created_by: String,
}

impl CreateSiteExpandOperationRequest {
    pub fn check(&self) -> Result<()> {
        self.key.check()?;
        if self.profiles.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter Profiles"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSiteShrinkOperationRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    /// Hostnames of the nodes to remove.
    pub servers: Vec<String>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub node_removed: bool,
    #[serde(default)]
    pub created_by: String,
}

impl CreateSiteShrinkOperationRequest {
    pub fn check(&self) -> Result<()> {
        self.key.check()?;
        if self.servers.len() != 1 {
            return Err(CoreError::bad_parameter(
                "shrink operation removes exactly one server",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSiteAppUpdateOperationRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub app_package: Locator,
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSiteUninstallOperationRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClusterGarbageCollectOperationRequest {
    #[serde(flatten)]
    pub key: SiteKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClusterReconfigureOperationRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub advertise_addr: String,
}

impl CreateClusterReconfigureOperationRequest {
    pub fn check(&self) -> Result<()> {
        self.key.check()?;
        require(&self.advertise_addr, "AdvertiseAddr")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUpdateEnvOperationRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUpdateConfigOperationRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub config: BTreeMap<String, String>,
}

impl CreateUpdateConfigOperationRequest {
    pub fn check(&self) -> Result<()> {
        self.key.check()?;
        if self.config.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter Config"));
        }
        Ok(())
    }
}

/// Move an operation to a new state, optionally recording progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetOperationStateRequest {
    pub state: OperationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressEntry>,
}

/// Servers and profiles of an install or expand operation once known.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationUpdateRequest {
    #[serde(default)]
    pub profiles: BTreeMap<String, ServerProfileRequest>,
    #[serde(default)]
    pub servers: Vec<Server>,
}

impl OperationUpdateRequest {
    pub fn check(&self) -> Result<()> {
        for server in &self.servers {
            require(&server.advertise_ip, "AdvertiseIP")?;
            require(&server.role, "Role")?;
        }
        Ok(())
    }
}

// ── Validation ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateServersRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    /// Operation whose agents run the checks. Defaults to the active one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Servers to check locally when no agents are reachable.
    #[serde(default)]
    pub servers: Vec<ServerInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRemoteAccessRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub operation_id: String,
    /// Empty means every node of the operation.
    #[serde(default)]
    pub node_addrs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateRemoteAccessResponse {
    pub results: Vec<NodeAccessResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAccessResult {
    pub addr: String,
    pub output: String,
}

// ── Identity ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsSignRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    /// PEM-encoded certificate signing request.
    pub csr: String,
    pub ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSignResponse {
    pub cert: String,
    pub ca_cert: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSignRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub user: String,
    pub public_key: String,
    pub ttl: Duration,
    #[serde(default)]
    pub allowed_logins: Vec<String>,
}

impl SshSignRequest {
    pub fn check(&self) -> Result<()> {
        self.key.check()?;
        require(&self.user, "User")?;
        require(&self.public_key, "PublicKey")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshSignResponse {
    pub cert: String,
    #[serde(default)]
    pub trusted_host_auth_keys: Vec<String>,
}

// ── Users ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserInviteRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUserInviteRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserResetRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub name: String,
    pub ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetUserPasswordRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

// ── Tokens and keys ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInstallTokenRequest {
    pub account_id: String,
    pub user_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Pre-bind the token to one repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl NewInstallTokenRequest {
    pub fn check(&self) -> Result<()> {
        require(&self.account_id, "AccountID")?;
        require(&self.user_email, "UserEmail")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewApiKeyRequest {
    pub user_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

// ── Certificates ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCertificateRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub certificate: String,
    pub private_key: String,
    #[serde(default)]
    pub intermediate: String,
}

impl UpdateCertificateRequest {
    pub fn check(&self) -> Result<()> {
        self.key.check()?;
        require(&self.certificate, "Certificate")?;
        require(&self.private_key, "PrivateKey")
    }
}

// ── Install / updates ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInstallerRequest {
    pub account_id: String,
    pub application: Locator,
    #[serde(default)]
    pub cache_images: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadUpdateRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub application: Locator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnablePeriodicUpdatesRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub interval: Duration,
}

impl EnablePeriodicUpdatesRequest {
    pub fn check(&self) -> Result<()> {
        self.key.check()?;
        if self.interval < Duration::from_secs(60) {
            return Err(CoreError::bad_parameter(
                "periodic update interval must be at least one minute",
            ));
        }
        Ok(())
    }
}

// ── Storage / audit ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePersistentStorageRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub resource: PersistentStorage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEventRequest {
    #[serde(flatten)]
    pub key: SiteKey,
    pub event: AuditEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_requires_profiles() {
        let req = CreateSiteExpandOperationRequest {
            key: SiteKey::new("a1", "example.com"),
            profiles: BTreeMap::new(),
            created_by: String::new(),
        };
        assert!(req.check().is_err_and(|e| e.is_bad_parameter()));
    }

    #[test]
    fn shrink_removes_one_server() {
        let req = CreateSiteShrinkOperationRequest {
            key: SiteKey::new("a1", "example.com"),
            servers: vec!["node-1".into(), "node-2".into()],
            force: false,
            node_removed: false,
            created_by: String::new(),
        };
        assert!(req.check().is_err_and(|e| e.is_bad_parameter()));
    }

    #[test]
    fn flattened_key_on_the_wire() {
        let req = ActivateSiteRequest {
            key: SiteKey::new("a1", "example.com"),
        };
        let json = serde_json::to_value(&req).unwrap_or_default();
        assert_eq!(json["account_id"], "a1");
        assert_eq!(json["site_domain"], "example.com");
    }
}
