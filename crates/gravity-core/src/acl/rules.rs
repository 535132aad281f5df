//! Permission table of the operator.
//!
//! Each entry lists alternatives. A call is allowed when every
//! `(kind, verb)` pair of at least one alternative passes; alternatives
//! are tried in order and the error of the last one is returned. Only
//! `GET_USERS` has more than one alternative: cluster read, or user list
//! plus read.
//!
//! Which entry guards which [`Operator`](crate::Operator) method. Methods
//! marked *own* skip the check when the target user is the caller.
//!
//! | Entry | Methods |
//! |---|---|
//! | `CREATE_ACCOUNT` | `create_account` |
//! | `READ_ACCOUNT` | `get_account` |
//! | `LIST_ACCOUNTS` | `get_accounts` |
//! | `CREATE_CLUSTER` | `create_site`, then the install token's role |
//! | `READ_CLUSTER` | `get_site`, `get_local_site`, `get_site_by_domain`, `get_site_report`, `get_site_operations`, `get_site_operation`, `get_site_operation_progress`, `get_site_operation_logs`, `validate_servers`, `get_site_install_operation_agent_report`, `get_site_expand_operation_agent_report`, `check_for_update`, `get_application_endpoints`, `check_site_status`, `get_cluster_nodes`, `sign_tls_key`, `sign_ssh_key` |
//! | `LIST_CLUSTERS` | `get_sites`, `validate_domain_name` |
//! | `UPDATE_CLUSTER` | `deactivate_site`, `activate_site`, `complete_final_install_step`, `create_site_install_operation`, `create_site_expand_operation`, `create_site_shrink_operation`, `create_site_app_update_operation`, `create_cluster_garbage_collect_operation`, `create_cluster_reconfigure_operation`, `create_progress_entry`, `create_log_entry`, `set_operation_state`, `update_install_operation_state`, `update_expand_operation_state`, `delete_site_operation`, `site_install_operation_start`, `site_expand_operation_start`, `validate_remote_access`, `step_down`, `enable_periodic_updates`, `disable_periodic_updates`, `emit_audit_event` |
//! | `DELETE_CLUSTER` | `delete_site`, `create_site_uninstall_operation` |
//! | `GET_USERS` | `get_users` |
//! | `READ_USER` | `get_user` (own) |
//! | `UPSERT_USER` | `upsert_user` |
//! | `CREATE_USER` | `create_user_invite`, `sign_ssh_key` (own), `sign_tls_key` for another identity |
//! | `LIST_USERS` | `get_user_invites` |
//! | `UPDATE_USER` | `update_user` (own), `reset_user_password` (own), `create_user_reset` |
//! | `DELETE_USER` | `delete_local_user`, `delete_user_invite` |
//! | `CREATE_TOKEN` | `create_install_token` (own), `create_provisioning_token` |
//! | `READ_TOKEN` | `get_expand_token`, `get_trusted_cluster_token` |
//! | `CREATE_API_KEY` | `create_api_key` (own) |
//! | `LIST_API_KEYS` | `get_api_keys` (own) |
//! | `DELETE_API_KEY` | `delete_api_key` (own) |
//! | `LIST_ALERTS` | `get_alerts` |
//! | `UPSERT_ALERT` | `update_alert` |
//! | `DELETE_ALERT` | `delete_alert` |
//! | `READ_SMTP` | `get_smtp_config` |
//! | `UPSERT_SMTP` | `update_smtp_config` |
//! | `DELETE_SMTP` | `delete_smtp_config` |
//! | `LIST_LOG_FORWARDERS` | `get_log_forwarders` |
//! | `CREATE_LOG_FORWARDER` | `create_log_forwarder` |
//! | `UPDATE_LOG_FORWARDER` | `update_log_forwarder` |
//! | `DELETE_LOG_FORWARDER` | `delete_log_forwarder` |
//! | `READ_CERTIFICATE` | `get_cluster_certificate` |
//! | `UPSERT_CERTIFICATE` | `update_cluster_certificate`, `get_cluster_certificate` with secrets |
//! | `DELETE_CERTIFICATE` | `delete_cluster_certificate` |
//! | `READ_AUTH_GATEWAY` | `get_auth_gateway` |
//! | `UPSERT_AUTH_GATEWAY` | `upsert_auth_gateway` |
//! | `READ_RUNTIME_ENV` | `get_cluster_environment_variables` |
//! | `UPDATE_RUNTIME_ENV` | `create_update_env_operation` |
//! | `READ_CLUSTER_CONFIG` | `get_cluster_configuration` |
//! | `UPDATE_CLUSTER_CONFIG` | `create_update_config_operation` |
//! | `READ_PERSISTENT_STORAGE` | `get_persistent_storage` |
//! | `UPDATE_PERSISTENT_STORAGE` | `update_persistent_storage` |
//! | `READ_APP` | `get_app_installer` |
//! | `DOWNLOAD_UPDATE` | `download_update` |

use super::access::{Kind, Verb};

/// One alternative: all pairs must pass.
pub type Requirement = &'static [(Kind, Verb)];

/// Alternatives: any one must pass.
pub type Rule = &'static [Requirement];

// ── Accounts ─────────────────────────────────────────────────────────

pub const CREATE_ACCOUNT: Rule = &[&[(Kind::Account, Verb::Create)]];
pub const READ_ACCOUNT: Rule = &[&[(Kind::Account, Verb::Read)]];
pub const LIST_ACCOUNTS: Rule = &[&[(Kind::Account, Verb::List), (Kind::Account, Verb::Read)]];

// ── Clusters and operations ──────────────────────────────────────────

pub const CREATE_CLUSTER: Rule = &[&[(Kind::Cluster, Verb::Create)]];
pub const READ_CLUSTER: Rule = &[&[(Kind::Cluster, Verb::Read)]];
pub const LIST_CLUSTERS: Rule = &[&[(Kind::Cluster, Verb::List), (Kind::Cluster, Verb::Read)]];
pub const UPDATE_CLUSTER: Rule = &[&[(Kind::Cluster, Verb::Update)]];
pub const DELETE_CLUSTER: Rule = &[&[(Kind::Cluster, Verb::Delete)]];

// ── Users ────────────────────────────────────────────────────────────

pub const GET_USERS: Rule = &[
    &[(Kind::Cluster, Verb::Read)],
    &[(Kind::User, Verb::List), (Kind::User, Verb::Read)],
];
pub const READ_USER: Rule = &[&[(Kind::User, Verb::Read)]];
pub const UPSERT_USER: Rule = &[&[(Kind::User, Verb::Create), (Kind::User, Verb::Update)]];
pub const CREATE_USER: Rule = &[&[(Kind::User, Verb::Create)]];
pub const LIST_USERS: Rule = &[&[(Kind::User, Verb::List)]];
pub const UPDATE_USER: Rule = &[&[(Kind::User, Verb::Update)]];
pub const DELETE_USER: Rule = &[&[(Kind::User, Verb::Delete)]];

// ── Tokens and keys ──────────────────────────────────────────────────

pub const CREATE_TOKEN: Rule = &[&[(Kind::Token, Verb::Create)]];
pub const READ_TOKEN: Rule = &[&[(Kind::Token, Verb::Read)]];
pub const CREATE_API_KEY: Rule = &[&[(Kind::ApiKey, Verb::Create)]];
pub const LIST_API_KEYS: Rule = &[&[(Kind::ApiKey, Verb::List), (Kind::ApiKey, Verb::Read)]];
pub const DELETE_API_KEY: Rule = &[&[(Kind::ApiKey, Verb::Delete)]];

// ── Cluster documents ────────────────────────────────────────────────

pub const LIST_ALERTS: Rule = &[&[(Kind::Alert, Verb::List), (Kind::Alert, Verb::Read)]];
pub const UPSERT_ALERT: Rule = &[&[(Kind::Alert, Verb::Create), (Kind::Alert, Verb::Update)]];
pub const DELETE_ALERT: Rule = &[&[(Kind::Alert, Verb::Delete)]];

pub const READ_SMTP: Rule = &[&[(Kind::SmtpConfig, Verb::Read)]];
pub const UPSERT_SMTP: Rule = &[&[
    (Kind::SmtpConfig, Verb::Create),
    (Kind::SmtpConfig, Verb::Update),
]];
pub const DELETE_SMTP: Rule = &[&[(Kind::SmtpConfig, Verb::Delete)]];

pub const LIST_LOG_FORWARDERS: Rule = &[&[
    (Kind::LogForwarder, Verb::List),
    (Kind::LogForwarder, Verb::Read),
]];
pub const CREATE_LOG_FORWARDER: Rule = &[&[(Kind::LogForwarder, Verb::Create)]];
pub const UPDATE_LOG_FORWARDER: Rule = &[&[(Kind::LogForwarder, Verb::Update)]];
pub const DELETE_LOG_FORWARDER: Rule = &[&[(Kind::LogForwarder, Verb::Delete)]];

pub const READ_CERTIFICATE: Rule = &[&[(Kind::TlsKeyPair, Verb::Read)]];
pub const UPSERT_CERTIFICATE: Rule = &[&[
    (Kind::TlsKeyPair, Verb::Create),
    (Kind::TlsKeyPair, Verb::Update),
]];
pub const DELETE_CERTIFICATE: Rule = &[&[(Kind::TlsKeyPair, Verb::Delete)]];

pub const READ_AUTH_GATEWAY: Rule = &[&[(Kind::AuthGateway, Verb::Read)]];
pub const UPSERT_AUTH_GATEWAY: Rule = &[&[
    (Kind::AuthGateway, Verb::Create),
    (Kind::AuthGateway, Verb::Update),
]];

pub const READ_RUNTIME_ENV: Rule = &[&[(Kind::RuntimeEnvironment, Verb::Read)]];
pub const UPDATE_RUNTIME_ENV: Rule = &[&[
    (Kind::Cluster, Verb::Update),
    (Kind::RuntimeEnvironment, Verb::Update),
]];

pub const READ_CLUSTER_CONFIG: Rule = &[&[(Kind::ClusterConfiguration, Verb::Read)]];
pub const UPDATE_CLUSTER_CONFIG: Rule = &[&[
    (Kind::Cluster, Verb::Update),
    (Kind::ClusterConfiguration, Verb::Update),
]];

pub const READ_PERSISTENT_STORAGE: Rule = &[&[(Kind::PersistentStorage, Verb::Read)]];
pub const UPDATE_PERSISTENT_STORAGE: Rule = &[&[(Kind::PersistentStorage, Verb::Update)]];

// ── Applications ─────────────────────────────────────────────────────

pub const READ_APP: Rule = &[&[(Kind::App, Verb::Read)]];
pub const DOWNLOAD_UPDATE: Rule = &[&[(Kind::Cluster, Verb::Update), (Kind::App, Verb::Read)]];
