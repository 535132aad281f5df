// ── Cluster (site) records ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::app::{Application, Locator};
use super::keys::SiteKey;
use crate::error::{CoreError, Result};

/// Cluster lifecycle state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SiteState {
    NotInstalled,
    Installing,
    Active,
    Failed,
    Degraded,
    /// Connectivity state, orthogonal to the lifecycle.
    Offline,
    Expanding,
    Shrinking,
    Updating,
    Uninstalling,
    CollectingGarbage,
    UpdatingClusterEnvars,
    UpdatingClusterConfig,
    Reconfiguring,
}

impl SiteState {
    /// A cluster past installation: it runs its own controller.
    pub fn is_installed(self) -> bool {
        !matches!(self, Self::NotInstalled | Self::Installing | Self::Failed)
    }
}

/// A node of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub advertise_ip: String,
    pub hostname: String,
    /// Node profile from the manifest (`master`, `worker`, ...).
    pub role: String,
    #[serde(default)]
    pub cluster_role: ClusterRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClusterRole {
    Master,
    #[default]
    Node,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    #[serde(default)]
    pub servers: Vec<Server>,
}

impl ClusterState {
    pub fn find_server(&self, advertise_ip: &str) -> Option<&Server> {
        self.servers.iter().find(|s| s.advertise_ip == advertise_ip)
    }
}

/// A deployed (or to-be-deployed) cluster.
///
/// Mutated only through the operator: creation, activation and the state
/// transitions its operations drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub domain: String,
    pub account_id: String,
    pub state: SiteState,
    /// Failure code when the cluster was deactivated or failed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    pub app: Application,
    #[serde(default)]
    pub cluster_state: ClusterState,
    pub provisioner: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// This cluster is the one the controller itself runs on.
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub final_install_step_complete: bool,
}

impl Site {
    pub fn key(&self) -> SiteKey {
        SiteKey::new(self.account_id.clone(), self.domain.clone())
    }
}

/// Request to create a cluster record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSite {
    pub account_id: String,
    pub domain_name: String,
    pub app_package: Locator,
    #[serde(default = "default_provisioner")]
    pub provisioner: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub created_by: String,
}

pub(crate) fn default_provisioner() -> String {
    "onprem".into()
}

impl NewSite {
    pub fn new(account_id: impl Into<String>, domain_name: impl Into<String>, app: Locator) -> Self {
        Self {
            account_id: account_id.into(),
            domain_name: domain_name.into(),
            app_package: app,
            provisioner: default_provisioner(),
            labels: BTreeMap::new(),
            local: false,
            created_by: String::new(),
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.account_id.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter AccountID"));
        }
        if self.domain_name.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter DomainName"));
        }
        Ok(())
    }

    pub fn key(&self) -> SiteKey {
        SiteKey::new(self.account_id.clone(), self.domain_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installed_states() {
        assert!(!SiteState::NotInstalled.is_installed());
        assert!(!SiteState::Installing.is_installed());
        assert!(!SiteState::Failed.is_installed());
        assert!(SiteState::Active.is_installed());
        assert!(SiteState::Expanding.is_installed());
        assert!(SiteState::Degraded.is_installed());
    }

    #[test]
    fn state_strings() {
        assert_eq!(SiteState::NotInstalled.to_string(), "not_installed");
        assert_eq!(
            SiteState::UpdatingClusterEnvars.to_string(),
            "updating_cluster_envars"
        );
        assert_eq!(
            "collecting_garbage".parse::<SiteState>().ok(),
            Some(SiteState::CollectingGarbage)
        );
    }
}
