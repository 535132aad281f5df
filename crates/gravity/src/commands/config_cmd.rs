//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Password, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Copy of the config with plaintext secrets masked.
fn redacted(cfg: &Config) -> Config {
    let profiles = cfg
        .profiles
        .iter()
        .map(|(name, profile)| {
            let mut profile = profile.clone();
            if profile.password.is_some() {
                profile.password = Some(REDACTED.into());
            }
            if profile.token.is_some() {
                profile.token = Some(REDACTED.into());
            }
            (name.clone(), profile)
        })
        .collect();
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: gravity_config::Defaults {
            output: cfg.defaults.output.clone(),
            color: cfg.defaults.color.clone(),
            insecure: cfg.defaults.insecure,
            timeout: cfg.defaults.timeout,
        },
        profiles,
    }
}

/// Ask where a secret goes; returns it when it belongs in the file.
fn place_secret(
    profile_name: &str,
    what: &str,
    secret: String,
    store: impl Fn(&str, &str) -> Result<(), gravity_config::ConfigError>,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {what}?"))
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        store(profile_name, &secret)?;
        eprintln!("   ✓ {what} stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret))
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("Gravity CLI configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let mut cfg = config::load_config_or_default();

            // 1. Profile name
            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            if cfg.profiles.contains_key(&profile_name)
                && !Confirm::new()
                    .with_prompt(format!("Profile '{profile_name}' exists. Overwrite?"))
                    .default(false)
                    .interact()
                    .map_err(prompt_err)?
            {
                return Ok(());
            }

            // 2. Portal URL
            let portal: String = Input::new()
                .with_prompt("Portal URL")
                .default("https://localhost:3009".into())
                .interact_text()
                .map_err(prompt_err)?;
            if portal.parse::<url::Url>().is_err() {
                return Err(CliError::Validation {
                    field: "portal".into(),
                    reason: format!("invalid URL: {portal}"),
                });
            }

            let mut profile = Profile::new(portal);

            // 3. Auth mode
            let auth_choices = &["Username/Password", "Bearer token"];
            let auth_selection = Select::new()
                .with_prompt("Authentication method")
                .items(auth_choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            if auth_selection == 0 {
                let user: String = Input::new()
                    .with_prompt("Username")
                    .interact_text()
                    .map_err(prompt_err)?;
                let pass = Password::new()
                    .with_prompt("Password")
                    .interact()
                    .map_err(prompt_err)?;
                if user.is_empty() || pass.is_empty() {
                    return Err(CliError::Validation {
                        field: "credentials".into(),
                        reason: "username and password cannot be empty".into(),
                    });
                }
                profile.auth_mode = "basic".into();
                profile.username = Some(user);
                profile.password =
                    place_secret(&profile_name, "password", pass, gravity_config::store_password)?;
            } else {
                let token = Password::new()
                    .with_prompt("Token")
                    .interact()
                    .map_err(prompt_err)?;
                if token.is_empty() {
                    return Err(CliError::Validation {
                        field: "token".into(),
                        reason: "token cannot be empty".into(),
                    });
                }
                profile.auth_mode = "bearer".into();
                profile.token =
                    place_secret(&profile_name, "token", token, gravity_config::store_token)?;
            }

            // 4. Account and cluster defaults
            let account: String = Input::new()
                .with_prompt("Account ID (empty for none)")
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;
            let cluster: String = Input::new()
                .with_prompt("Default cluster (empty for none)")
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;
            profile.account = Some(account).filter(|s| !s.is_empty());
            profile.cluster = Some(cluster).filter(|s| !s.is_empty());

            // 5. Write config
            cfg.profiles.insert(profile_name.clone(), profile);
            if cfg.profiles.len() == 1 {
                cfg.default_profile = Some(profile_name.clone());
            }
            config::save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Profile: {profile_name}");
            eprintln!("\n  Test it: gravity clusters list --profile {profile_name}");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|_| format!("{c:#?}")),
                |_| "config".into(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: gravity config init");
                return Ok(());
            }
            let mut names: Vec<_> = cfg.profiles.keys().collect();
            names.sort();
            for name in names {
                let marker = if name == default { " *" } else { "" };
                println!("{name}{marker}");
            }
            Ok(())
        }
    }
}
