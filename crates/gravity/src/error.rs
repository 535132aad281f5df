//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use gravity_config::ConfigError;
use gravity_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to portal at {url}")]
    #[diagnostic(
        code(gravity::connection_failed),
        help(
            "Check that the cluster controller is running and reachable.\n\
             Self-signed certificates need --insecure (-k) or ca_cert in the profile.\n\
             Cause: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(gravity::auth_failed),
        help("Verify the credentials of the active profile, or pass --token.")
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(gravity::no_credentials),
        help(
            "Configure credentials with: gravity config init\n\
             Or set GRAVITY_TOKEN, or GRAVITY_USERNAME and GRAVITY_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    #[error("Access denied: {message}")]
    #[diagnostic(code(gravity::access_denied))]
    AccessDenied { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(gravity::not_found),
        help("Run: gravity {list_command} to see what exists")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{message}")]
    #[diagnostic(code(gravity::conflict))]
    Conflict { message: String },

    #[error("Cluster {domain} is degraded: {reason}")]
    #[diagnostic(code(gravity::degraded))]
    Degraded { domain: String, reason: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({kind}): {message}")]
    #[diagnostic(code(gravity::api_error))]
    ApiError { kind: String, message: String },

    #[error("'{operation}' is not supported by this portal")]
    #[diagnostic(code(gravity::unsupported))]
    Unsupported { operation: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(gravity::validation))]
    Validation { field: String, reason: String },

    #[error("No cluster selected")]
    #[diagnostic(
        code(gravity::no_cluster),
        help("Pass --cluster (-c), set GRAVITY_CLUSTER, or set `cluster` in the profile.")
    )]
    NoCluster,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(gravity::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: gravity config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(gravity::no_config),
        help(
            "Create one with: gravity config init\n\
             Or pass --portal with --token.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(gravity::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(gravity::timeout),
        help("Increase timeout with --timeout or check portal responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::AccessDenied { .. } | Self::Unsupported { .. } => exit_code::PERMISSION,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoCluster => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(err) => Self::Io(err),
            other => Self::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BadParameter { message } => Self::Validation {
                field: "request".into(),
                reason: message,
            },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                list_command: list_command_for(&entity_type).into(),
                resource_type: entity_type,
                identifier,
            },

            CoreError::AccessDenied { message } => Self::AccessDenied { message },

            CoreError::AlreadyExists { message } | CoreError::CompareFailed { message } => {
                Self::Conflict { message }
            }

            CoreError::Unsupported { operation } => Self::Unsupported { operation },

            CoreError::ClusterDegraded { domain, reason } => Self::Degraded { domain, reason },

            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },

            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },

            CoreError::Api { message, kind, .. } => Self::ApiError {
                kind: kind.unwrap_or_else(|| "unknown".into()),
                message,
            },

            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => Self::ApiError {
                kind: "internal".into(),
                message,
            },
        }
    }
}

fn list_command_for(entity_type: &str) -> &'static str {
    match entity_type {
        "operation" | "progress entry" => "operations list",
        _ => "clusters list",
    }
}
