//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use ally_config::ConfigError;
use ally_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the Ally cloud: {reason}")]
    #[diagnostic(
        code(ally::connection_failed),
        help("Check network access, or point --base-url at a reachable endpoint.")
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(ally::auth_failed),
        help(
            "Verify the API key and secret issued by the Danfoss developer portal.\n\
             Run: ally config set-secret --profile <name>"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(ally::no_credentials),
        help(
            "Pass --key and --secret, set ALLY_KEY and ALLY_SECRET,\n\
             or configure a profile with: ally config set-profile {profile} --key <key>"
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(ally::not_found),
        help("Run: ally {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error ({code}): {message}")]
    #[diagnostic(code(ally::api_error))]
    ApiError { code: String, message: String },

    #[error("Device '{device}' refused the command")]
    #[diagnostic(
        code(ally::rejected),
        help("The local value was updated anyway; the next poll shows the device's real state.")
    )]
    Rejected { device: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ally::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(ally::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: ally config set-profile {name} --key <key>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(ally::config))]
    Config(#[source] ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(ally::timeout),
        help("Increase timeout with --timeout or try again later.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(ally::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },

            CoreError::Disconnected => CliError::ConnectionFailed {
                reason: "connector is not running".into(),
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },

            CoreError::Rejected { device_id } => CliError::Rejected { device: device_id },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map_or_else(|| "transport".into(), |s| s.to_string()),
                message,
            },

            CoreError::Decode { message } => CliError::ApiError {
                code: "decode".into(),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let auth = CliError::from(CoreError::AuthenticationFailed {
            message: "invalid_client".into(),
        });
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let missing = CliError::from(CoreError::DeviceNotFound {
            identifier: "d9".into(),
        });
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let timeout = CliError::from(CoreError::Timeout { timeout_secs: 10 });
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let down = CliError::from(CoreError::ConnectionFailed {
            reason: "refused".into(),
        });
        assert_eq!(down.exit_code(), exit_code::CONNECTION);

        let invalid = CliError::from(CoreError::ValidationFailed {
            message: "40 °C".into(),
        });
        assert_eq!(invalid.exit_code(), exit_code::USAGE);

        let no_creds = CliError::from(ConfigError::NoCredentials {
            profile: "home".into(),
        });
        assert_eq!(no_creds.exit_code(), exit_code::AUTH);
    }
}
