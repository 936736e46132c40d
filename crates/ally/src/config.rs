//! CLI configuration: thin wrapper around `ally_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--key, --secret, --base-url, --timeout).

use std::time::Duration;

use secrecy::SecretString;

use ally_config::Profile;
use ally_core::{ConnectorConfig, Credentials};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use ally_config::{Config, config_path, load_config_or_default, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Build a `ConnectorConfig` from the config file, profile, and flags.
///
/// Flags take priority over profile values. Without a matching profile,
/// `--key` and `--secret` alone are enough.
pub fn build_connector_config(global: &GlobalOpts) -> Result<ConnectorConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut config = match cfg.profile(&profile_name) {
        Some(profile) => from_profile(profile, &profile_name, global)?,
        None => {
            if global.profile.is_some() && global.key.is_none() {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: available(&cfg),
                });
            }
            from_flags(&profile_name, global)?
        }
    };

    if let Some(ref raw) = global.base_url {
        config.base_url = ally_config::parse_base_url(raw)?;
    }
    let profile_timeout = cfg.profile(&profile_name).and_then(|p| p.timeout);
    let timeout = global
        .timeout
        .or(profile_timeout)
        .unwrap_or(cfg.defaults.timeout);
    config.timeout = Duration::from_secs(timeout);
    Ok(config)
}

fn from_profile(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<ConnectorConfig, CliError> {
    let key = global
        .key
        .clone()
        .or_else(|| profile.key.clone())
        .ok_or_else(|| CliError::NoCredentials {
            profile: profile_name.into(),
        })?;

    let secret = match global.secret {
        Some(ref secret) => SecretString::from(secret.clone()),
        None => ally_config::resolve_secret(profile, profile_name)?,
    };

    let mut config = ConnectorConfig::new(Credentials::new(key, secret));
    ally_config::apply_profile_settings(&mut config, profile)?;
    Ok(config)
}

fn from_flags(profile_name: &str, global: &GlobalOpts) -> Result<ConnectorConfig, CliError> {
    match (&global.key, &global.secret) {
        (Some(key), Some(secret)) => Ok(ConnectorConfig::new(Credentials::new(
            key.clone(),
            SecretString::from(secret.clone()),
        ))),
        _ => Err(CliError::NoCredentials {
            profile: profile_name.into(),
        }),
    }
}

fn available(cfg: &Config) -> String {
    let names = cfg.profile_names();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}
