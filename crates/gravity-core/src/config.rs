// ── Runtime connection configuration ──
//
// These types describe *how* to reach a portal and how the router picks
// between local and remote operators. They carry credential data and
// connection tuning, but never touch disk. The CLI builds them from a
// profile and hands them in.

use std::collections::HashMap;
use std::time::Duration;

use gravity_api::{Credentials, TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::error::{CoreError, Result};

/// How to authenticate with a portal.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// No credentials (wizard endpoints reachable without auth).
    None,
    /// Username and password (or API key as the password).
    Basic {
        username: String,
        password: SecretString,
    },
    /// Bearer token (agent and install tokens).
    Bearer(SecretString),
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed cluster certificates).
    DangerAcceptInvalid,
}

/// Configuration for talking to a single portal.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Portal URL (e.g., `https://ops.example.com:3009`).
    pub url: Url,
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    /// Request timeout. Every remote call is bounded by it.
    pub timeout: Duration,
}

impl PortalConfig {
    pub fn new(url: Url, auth: AuthCredentials) -> Self {
        Self {
            url,
            auth,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }

    pub(crate) fn credentials(&self) -> Credentials {
        match &self.auth {
            AuthCredentials::None => Credentials::None,
            AuthCredentials::Basic { username, password } => Credentials::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            AuthCredentials::Bearer(token) => Credentials::Bearer {
                token: token.clone(),
            },
        }
    }
}

/// Prefix of the endpoint name a separate install wizard is reachable under.
pub const WIZARD_PREFIX: &str = "wizard.";

/// Port every cluster controller serves the portal API on.
pub const DEFAULT_PORTAL_PORT: u16 = 3009;

/// How the router resolves remote clusters.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// This process is the install wizard.
    pub wizard: bool,
    /// Explicit endpoint overrides, keyed by cluster (or wizard) name.
    pub endpoints: HashMap<String, Url>,
    /// Port used when no override exists.
    pub port: u16,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            wizard: false,
            endpoints: HashMap::new(),
            port: DEFAULT_PORTAL_PORT,
        }
    }
}

impl RouterConfig {
    /// Endpoint URL for a cluster's controller.
    pub fn endpoint_for(&self, name: &str) -> Result<Url> {
        if let Some(url) = self.endpoints.get(name) {
            return Ok(url.clone());
        }
        Url::parse(&format!("https://{name}:{}", self.port)).map_err(|e| CoreError::Config {
            message: format!("cannot build endpoint for {name}: {e}"),
        })
    }

    /// Endpoint of the wizard process installing `cluster`.
    pub fn wizard_endpoint_for(&self, cluster: &str) -> Result<Url> {
        self.endpoint_for(&format!("{WIZARD_PREFIX}{cluster}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_override_wins() {
        let mut config = RouterConfig::default();
        config.endpoints.insert(
            "example.com".into(),
            Url::parse("http://127.0.0.1:8080").unwrap(),
        );
        assert_eq!(
            config.endpoint_for("example.com").unwrap().as_str(),
            "http://127.0.0.1:8080/"
        );
        assert_eq!(
            config.endpoint_for("other.com").unwrap().as_str(),
            "https://other.com:3009/"
        );
    }

    #[test]
    fn wizard_endpoint_is_prefixed() {
        let config = RouterConfig::default();
        assert_eq!(
            config.wizard_endpoint_for("example.com").unwrap().as_str(),
            "https://wizard.example.com:3009/"
        );
    }
}
