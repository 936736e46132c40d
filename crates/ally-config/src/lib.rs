//! Shared configuration for the Ally connector.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to `ally_core::ConnectorConfig`. The CLI layers its flag
//! overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ally_core::{ConnectorConfig, Credentials, SyncTuning};

/// Keyring service name; entries are `<profile>/secret`.
pub const KEYRING_SERVICE: &str = "ally";

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "ALLY_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// A named Ally account profile. Timings are in seconds.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// API key from the Danfoss developer portal.
    pub key: Option<String>,

    /// API secret (plaintext; prefer keyring or env var).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Environment variable name containing the API secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_env: Option<String>,

    /// Cloud base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_floor: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_refresh_margin: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub race_delay: Option<f64>,
}

impl Config {
    /// Profile name to use: explicit choice, then `default_profile`,
    /// then `"default"`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Sorted profile names, for diagnostics.
    pub fn profile_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `ALLY_CONFIG`, then platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "ally", "ally").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ally");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` layered over defaults, then `ALLY_*` variables.
///
/// Nested keys use a double underscore:
/// `ALLY_PROFILES__HOME__BASE_URL`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ALLY_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file is missing or broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/secret"))
}

/// Resolve the API secret: `secret_env`, then keyring, then plaintext.
pub fn resolve_secret(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.secret_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Ok(secret) = keyring_entry(profile_name).and_then(|entry| entry.get_password()) {
        return Ok(SecretString::from(secret));
    }

    if let Some(ref secret) = profile.secret {
        return Ok(SecretString::from(secret.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a profile's secret in the system keyring.
pub fn store_secret(profile_name: &str, secret: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(secret)?;
    Ok(())
}

// ── Translation to ConnectorConfig ──────────────────────────────────

/// Build a `ConnectorConfig` from a profile, with no outside overrides.
pub fn profile_to_connector_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<ConnectorConfig, ConfigError> {
    let key = profile
        .key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;
    let secret = resolve_secret(profile, profile_name)?;

    let mut config = ConnectorConfig::new(Credentials::new(key, secret));
    apply_profile_settings(&mut config, profile)?;
    Ok(config)
}

/// Overlay a profile's URL, timeout and timings on `config`.
pub fn apply_profile_settings(
    config: &mut ConnectorConfig,
    profile: &Profile,
) -> Result<(), ConfigError> {
    if let Some(ref raw) = profile.base_url {
        config.base_url = parse_base_url(raw)?;
    }
    if let Some(timeout) = profile.timeout {
        config.timeout = Duration::from_secs(timeout);
    }
    config.tuning = tuning(profile, config.tuning)?;
    Ok(())
}

pub fn parse_base_url(raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Validation {
        field: "base_url".into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

fn tuning(profile: &Profile, base: SyncTuning) -> Result<SyncTuning, ConfigError> {
    Ok(SyncTuning {
        poll_interval: seconds("poll_interval", profile.poll_interval, base.poll_interval)?,
        throttle_floor: seconds("throttle_floor", profile.throttle_floor, base.throttle_floor)?,
        token_refresh_margin: seconds(
            "token_refresh_margin",
            profile.token_refresh_margin,
            base.token_refresh_margin,
        )?,
        race_delay: seconds("race_delay", profile.race_delay, base.race_delay)?,
    })
}

fn seconds(field: &str, value: Option<f64>, fallback: Duration) -> Result<Duration, ConfigError> {
    let Some(secs) = value else {
        return Ok(fallback);
    };
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("{secs} is not a valid number of seconds: {e}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.output, "table");
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profiles_load_from_toml() {
        let file = write_config(
            r#"
default_profile = "home"

[profiles.home]
key = "abc"
secret = "s3cret"
poll_interval = 30
race_delay = 0.5
"#,
        );

        let cfg = load_config_from(file.path()).unwrap();
        let name = cfg.active_profile_name(None);
        let profile = cfg.profile(&name).unwrap();

        assert_eq!(name, "home");
        assert_eq!(profile.key.as_deref(), Some("abc"));
        assert_eq!(profile.poll_interval, Some(30.0));
        assert_eq!(cfg.active_profile_name(Some("cabin")), "cabin");
    }

    #[test]
    fn profile_builds_connector_config() {
        let profile = Profile {
            key: Some("abc".into()),
            secret: Some("s3cret".into()),
            base_url: Some("http://127.0.0.1:8080".into()),
            timeout: Some(3),
            poll_interval: Some(60.0),
            race_delay: Some(0.25),
            ..Profile::default()
        };

        let config = profile_to_connector_config(&profile, "ally-test-plaintext").unwrap();

        assert_eq!(config.credentials.key, "abc");
        assert_eq!(config.credentials.secret.expose_secret(), "s3cret");
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:8080/");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.tuning.poll_interval, Duration::from_secs(60));
        assert_eq!(config.tuning.race_delay, Duration::from_millis(250));
        assert_eq!(config.tuning.throttle_floor, Duration::from_secs(10));
    }

    #[test]
    fn secret_env_takes_priority() {
        let expected = std::env::var("PATH").unwrap();
        let profile = Profile {
            secret: Some("plaintext".into()),
            secret_env: Some("PATH".into()),
            ..Profile::default()
        };

        let secret = resolve_secret(&profile, "ally-test-env").unwrap();

        assert_eq!(secret.expose_secret(), expected);
    }

    #[test]
    fn unset_secret_env_falls_through_to_plaintext() {
        let profile = Profile {
            secret: Some("plaintext".into()),
            secret_env: Some("ALLY_TEST_SECRET_THAT_IS_NEVER_SET".into()),
            ..Profile::default()
        };

        let secret = resolve_secret(&profile, "ally-test-fallthrough").unwrap();

        assert_eq!(secret.expose_secret(), "plaintext");
    }

    #[test]
    fn missing_key_is_reported() {
        let profile = Profile {
            secret: Some("s3cret".into()),
            ..Profile::default()
        };

        let err = profile_to_connector_config(&profile, "home").unwrap_err();

        assert!(matches!(err, ConfigError::NoCredentials { ref profile } if profile == "home"));
    }

    #[test]
    fn invalid_values_name_the_field() {
        let profile = Profile {
            key: Some("abc".into()),
            secret: Some("s3cret".into()),
            throttle_floor: Some(-1.0),
            ..Profile::default()
        };
        let err = profile_to_connector_config(&profile, "ally-test-invalid").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "throttle_floor"));

        let err = parse_base_url("not a url").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "base_url"));
    }

    #[test]
    fn saved_config_omits_unset_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                key: Some("abc".into()),
                ..Profile::default()
            },
        );

        save_config_to(&cfg, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[profiles.home]"));
        assert!(!text.contains("secret"));

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profile_names(), vec!["home"]);
    }
}
