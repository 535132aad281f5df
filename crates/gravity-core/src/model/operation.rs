// ── Operations and their progress ──
//
// A `SiteOperation` is one long-running lifecycle action against a
// cluster. Its type-specific state lives in `OperationDetails`, a sum type,
// so exactly one variant is populated and it always agrees with the
// operation type.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::app::Locator;
use super::keys::{SiteKey, SiteOperationKey};
use super::site::Server;

/// Completion marker of a terminal progress entry.
pub const COMPLETED: u8 = 100;

/// Step number of a terminal progress entry.
pub const FINAL_STEP: u32 = 9;

// ── Operation type ───────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum OperationType {
    #[serde(rename = "operation_install")]
    #[strum(serialize = "operation_install")]
    Install,
    #[serde(rename = "operation_expand")]
    #[strum(serialize = "operation_expand")]
    Expand,
    #[serde(rename = "operation_shrink")]
    #[strum(serialize = "operation_shrink")]
    Shrink,
    #[serde(rename = "operation_update")]
    #[strum(serialize = "operation_update")]
    Update,
    #[serde(rename = "operation_uninstall")]
    #[strum(serialize = "operation_uninstall")]
    Uninstall,
    #[serde(rename = "operation_gc")]
    #[strum(serialize = "operation_gc")]
    GarbageCollect,
    #[serde(rename = "operation_update_envars")]
    #[strum(serialize = "operation_update_envars")]
    UpdateEnviron,
    #[serde(rename = "operation_update_config")]
    #[strum(serialize = "operation_update_config")]
    UpdateConfig,
    #[serde(rename = "operation_reconfigure")]
    #[strum(serialize = "operation_reconfigure")]
    Reconfigure,
}

// ── Operation state ──────────────────────────────────────────────────

/// Per-type progress states converging on `Completed` or `Failed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationState {
    InstallInitiated,
    InstallPrechecks,
    InstallProvisioning,
    InstallDeploying,
    ExpandInitiated,
    ExpandPrechecks,
    ExpandProvisioning,
    ExpandDeploying,
    ShrinkInProgress,
    UpdateInProgress,
    UninstallInProgress,
    #[serde(rename = "gc_in_progress")]
    #[strum(serialize = "gc_in_progress")]
    GarbageCollectInProgress,
    #[serde(rename = "update_envars_in_progress")]
    #[strum(serialize = "update_envars_in_progress")]
    UpdateEnvironInProgress,
    UpdateConfigInProgress,
    ReconfigureInProgress,
    Completed,
    Failed,
}

impl OperationState {
    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }

    pub fn is_failed(self) -> bool {
        self == Self::Failed
    }

    /// Terminal: `Completed` or `Failed`.
    pub fn is_finished(self) -> bool {
        self.is_completed() || self.is_failed()
    }

    /// Created but not yet started.
    pub fn is_initiated(self) -> bool {
        matches!(self, Self::InstallInitiated | Self::ExpandInitiated)
    }

    /// The operation type this state belongs to. `None` for the terminal
    /// states, which every type shares.
    pub fn operation_type(self) -> Option<OperationType> {
        match self {
            Self::InstallInitiated
            | Self::InstallPrechecks
            | Self::InstallProvisioning
            | Self::InstallDeploying => Some(OperationType::Install),
            Self::ExpandInitiated
            | Self::ExpandPrechecks
            | Self::ExpandProvisioning
            | Self::ExpandDeploying => Some(OperationType::Expand),
            Self::ShrinkInProgress => Some(OperationType::Shrink),
            Self::UpdateInProgress => Some(OperationType::Update),
            Self::UninstallInProgress => Some(OperationType::Uninstall),
            Self::GarbageCollectInProgress => Some(OperationType::GarbageCollect),
            Self::UpdateEnvironInProgress => Some(OperationType::UpdateEnviron),
            Self::UpdateConfigInProgress => Some(OperationType::UpdateConfig),
            Self::ReconfigureInProgress => Some(OperationType::Reconfigure),
            Self::Completed | Self::Failed => None,
        }
    }

    /// Whether an operation of type `op_type` may be in this state.
    pub fn belongs_to(self, op_type: OperationType) -> bool {
        self.operation_type().is_none_or(|own| own == op_type)
    }

    /// Position within the operation's lifecycle. States only move forward.
    pub fn step(self) -> u8 {
        match self {
            Self::InstallInitiated | Self::ExpandInitiated => 0,
            Self::InstallPrechecks
            | Self::ExpandPrechecks
            | Self::ShrinkInProgress
            | Self::UpdateInProgress
            | Self::UninstallInProgress
            | Self::GarbageCollectInProgress
            | Self::UpdateEnvironInProgress
            | Self::UpdateConfigInProgress
            | Self::ReconfigureInProgress => 1,
            Self::InstallProvisioning | Self::ExpandProvisioning => 2,
            Self::InstallDeploying | Self::ExpandDeploying => 3,
            Self::Completed | Self::Failed => u8::MAX,
        }
    }
}

// ── Type-specific details ────────────────────────────────────────────

/// Requested node count for one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerProfileRequest {
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallDetails {
    #[serde(default)]
    pub profiles: BTreeMap<String, ServerProfileRequest>,
    /// Flavor chosen for the install, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandDetails {
    #[serde(default)]
    pub profiles: BTreeMap<String, ServerProfileRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShrinkDetails {
    pub servers: Vec<Server>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub node_removed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub update_package: Locator,
    #[serde(default)]
    pub manual: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UninstallDetails {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEnvironDetails {
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfigDetails {
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconfigureDetails {
    pub advertise_addr: String,
}

/// Type-specific operation state. The variant determines the type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "state")]
pub enum OperationDetails {
    #[serde(rename = "operation_install")]
    Install(InstallDetails),
    #[serde(rename = "operation_expand")]
    Expand(ExpandDetails),
    #[serde(rename = "operation_shrink")]
    Shrink(ShrinkDetails),
    #[serde(rename = "operation_update")]
    Update(UpdateDetails),
    #[serde(rename = "operation_uninstall")]
    Uninstall(UninstallDetails),
    #[serde(rename = "operation_gc")]
    GarbageCollect,
    #[serde(rename = "operation_update_envars")]
    UpdateEnviron(UpdateEnvironDetails),
    #[serde(rename = "operation_update_config")]
    UpdateConfig(UpdateConfigDetails),
    #[serde(rename = "operation_reconfigure")]
    Reconfigure(ReconfigureDetails),
}

impl OperationDetails {
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::Install(_) => OperationType::Install,
            Self::Expand(_) => OperationType::Expand,
            Self::Shrink(_) => OperationType::Shrink,
            Self::Update(_) => OperationType::Update,
            Self::Uninstall(_) => OperationType::Uninstall,
            Self::GarbageCollect => OperationType::GarbageCollect,
            Self::UpdateEnviron(_) => OperationType::UpdateEnviron,
            Self::UpdateConfig(_) => OperationType::UpdateConfig,
            Self::Reconfigure(_) => OperationType::Reconfigure,
        }
    }
}

// ── Operation ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteOperation {
    pub id: String,
    pub account_id: String,
    pub site_domain: String,
    pub state: OperationState,
    pub details: OperationDetails,
    pub provisioner: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub created_by: String,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub servers: Vec<Server>,
}

impl SiteOperation {
    pub fn operation_type(&self) -> OperationType {
        self.details.operation_type()
    }

    pub fn key(&self) -> SiteOperationKey {
        SiteOperationKey {
            account_id: self.account_id.clone(),
            site_domain: self.site_domain.clone(),
            operation_id: self.id.clone(),
        }
    }

    pub fn site_key(&self) -> SiteKey {
        SiteKey::new(self.account_id.clone(), self.site_domain.clone())
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }
}

// ── Progress ─────────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProgressState {
    InProgress,
    Completed,
    Failed,
}

/// Append-only status record of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub site_domain: String,
    pub operation_id: String,
    pub created: DateTime<Utc>,
    /// 0 to 100; `COMPLETED` on terminal entries.
    pub completion: u8,
    pub step: u32,
    pub state: ProgressState,
    pub message: String,
}

impl ProgressEntry {
    /// Start-of-operation entry.
    pub fn in_progress(key: &SiteOperationKey, message: impl Into<String>) -> Self {
        Self {
            site_domain: key.site_domain.clone(),
            operation_id: key.operation_id.clone(),
            created: Utc::now(),
            completion: 0,
            step: 0,
            state: ProgressState::InProgress,
            message: message.into(),
        }
    }

    /// Terminal entry with the given state.
    pub fn terminal(key: &SiteOperationKey, state: ProgressState, message: impl Into<String>) -> Self {
        Self {
            site_domain: key.site_domain.clone(),
            operation_id: key.operation_id.clone(),
            created: Utc::now(),
            completion: COMPLETED,
            step: FINAL_STEP,
            state,
            message: message.into(),
        }
    }

    /// No further entries should follow this one.
    pub fn is_completed(&self) -> bool {
        matches!(self.state, ProgressState::Completed | ProgressState::Failed)
    }
}

/// One line of operation log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Source of the line (`installer`, a node hostname, ...).
    #[serde(default)]
    pub asset: String,
    pub message: String,
}
