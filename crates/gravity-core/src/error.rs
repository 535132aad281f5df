// ── Core error types ──
//
// Domain error kinds for the operator layer. Callers classify failures by
// kind (`is_not_found`, `is_access_denied`, ...) and never see HTTP status
// codes directly. The `From<gravity_api::Error>` impl maps portal
// responses back onto the same kinds so they survive a remote hop.

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Request errors ───────────────────────────────────────────────
    /// Malformed or missing request field. Always detected before I/O.
    #[error("{message}")]
    BadParameter { message: String },

    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("{message}")]
    AlreadyExists { message: String },

    /// The resource is not in the state the request expects.
    #[error("{message}")]
    CompareFailed { message: String },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    #[error("Cluster {domain} is degraded: {reason}")]
    ClusterDegraded { domain: String, reason: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to portal at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Portal request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Server-side error classification, when the portal sent one.
        kind: Option<String>,
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Self::BadParameter {
            message: message.into(),
        }
    }

    pub fn not_found(entity_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            identifier: identifier.into(),
        }
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    pub fn compare_failed(message: impl Into<String>) -> Self {
        Self::CompareFailed {
            message: message.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    pub fn is_bad_parameter(&self) -> bool {
        matches!(self, Self::BadParameter { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_compare_failed(&self) -> bool {
        matches!(self, Self::CompareFailed { .. })
    }

    /// Short machine-readable kind, mirrored in the portal's error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadParameter { .. } => "bad_parameter",
            Self::NotFound { .. } => "not_found",
            Self::AccessDenied { .. } => "access_denied",
            Self::AlreadyExists { .. } => "already_exists",
            Self::CompareFailed { .. } => "compare_failed",
            Self::Unsupported { .. } => "not_implemented",
            Self::ClusterDegraded { .. } => "degraded",
            Self::ConnectionFailed { .. } => "connection_problem",
            Self::AuthenticationFailed { .. } => "authentication",
            Self::Timeout { .. } => "timeout",
            Self::Api { .. } => "api",
            Self::Config { .. } => "config",
            Self::Internal(_) => "internal",
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<gravity_api::Error> for CoreError {
    fn from(err: gravity_api::Error) -> Self {
        match err {
            gravity_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            gravity_api::Error::InvalidCredentials(message) => {
                CoreError::AuthenticationFailed { message }
            }
            gravity_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        kind: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            gravity_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            gravity_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            gravity_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            gravity_api::Error::Api {
                status,
                message,
                kind,
            } => from_api_status(status, message, kind),
            gravity_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            gravity_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            gravity_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

/// Prefer the portal's explicit kind, fall back to the HTTP status.
fn from_api_status(status: u16, message: String, kind: Option<String>) -> CoreError {
    match (kind.as_deref(), status) {
        (Some("bad_parameter"), _) | (None, 400) => CoreError::BadParameter { message },
        (Some("access_denied"), _) | (None, 403) => CoreError::AccessDenied { message },
        (Some("not_found"), _) | (None, 404) => CoreError::NotFound {
            entity_type: "resource".into(),
            identifier: message,
        },
        (Some("already_exists"), _) | (None, 409) => CoreError::AlreadyExists { message },
        (Some("compare_failed"), _) | (None, 412) => CoreError::CompareFailed { message },
        (Some("not_implemented"), _) | (None, 501) => CoreError::Unsupported { operation: message },
        _ => CoreError::Api {
            message,
            kind,
            status: Some(status),
        },
    }
}
