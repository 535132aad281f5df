//! CLI configuration: a thin wrapper around `gravity_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides (--portal,
//! --token, --insecure, --timeout, ...).

use std::time::Duration;

use secrecy::SecretString;

use gravity_core::{AuthCredentials, PortalConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use gravity_config::{Config, Profile, config_path, load_config_or_default, save_config};

// ── Connection target ───────────────────────────────────────────────

/// Everything a portal-bound command needs: where to connect and which
/// account and cluster it addresses by default.
#[derive(Debug)]
pub struct Target {
    pub portal: PortalConfig,
    pub account: Option<String>,
    pub cluster: Option<String>,
}

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref()).to_owned()
}

/// Build the connection target from the config file, profile, and flags.
pub fn resolve_target(global: &GlobalOpts) -> Result<Target, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    // If a profile exists, use it with CLI flag overrides
    if let Some(profile) = cfg.profiles.get(&profile_name) {
        let portal = resolve_profile(profile, &profile_name, &cfg, global)?;
        return Ok(Target {
            portal,
            account: global.account.clone().or_else(|| profile.account.clone()),
            cluster: global.cluster.clone().or_else(|| profile.cluster.clone()),
        });
    }

    // An explicitly requested profile must exist
    if global.profile.is_some() {
        let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
        available.sort();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    }

    // No profile: build from CLI flags / env vars alone
    let url_str = global.portal.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let url = parse_portal_url(url_str)?;

    let auth = match global.token {
        Some(ref token) => AuthCredentials::Bearer(SecretString::from(token.clone())),
        None => basic_from_env().ok_or(CliError::NoCredentials {
            profile: profile_name,
        })?,
    };

    let tls = if global.insecure || cfg.defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };

    Ok(Target {
        portal: PortalConfig {
            url,
            auth,
            tls,
            timeout: Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout)),
        },
        account: global.account.clone(),
        cluster: global.cluster.clone(),
    })
}

/// Translate a `Profile` + global flags into a `PortalConfig`.
///
/// CLI flag overrides take priority over profile values.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<PortalConfig, CliError> {
    // 1. Portal URL (flag > env > profile)
    let url = parse_portal_url(global.portal.as_deref().unwrap_or(&profile.portal))?;

    // 2. Auth credentials (a token flag replaces the profile's chain)
    let auth = match global.token {
        Some(ref token) => AuthCredentials::Bearer(SecretString::from(token.clone())),
        None => gravity_config::resolve_auth(profile, profile_name)?,
    };

    // 3. TLS verification
    let tls = if global.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        gravity_config::tls_for(profile, &cfg.defaults)
    };

    // 4. Timeout (flag > profile > defaults)
    let timeout = global
        .timeout
        .or(profile.timeout)
        .unwrap_or(cfg.defaults.timeout);

    Ok(PortalConfig {
        url,
        auth,
        tls,
        timeout: Duration::from_secs(timeout),
    })
}

fn parse_portal_url(raw: &str) -> Result<url::Url, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "portal".into(),
        reason: format!("invalid URL: {raw}"),
    })
}

fn basic_from_env() -> Option<AuthCredentials> {
    let username = std::env::var("GRAVITY_USERNAME").ok()?;
    let password = std::env::var("GRAVITY_PASSWORD").ok()?;
    Some(AuthCredentials::Basic {
        username,
        password: SecretString::from(password),
    })
}
