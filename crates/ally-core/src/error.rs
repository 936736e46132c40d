// ── Core error types ──
//
// Domain errors for ally-core. Consumers never match on HTTP details; the
// `From<ally_api::Error>` impl folds transport failures into these
// variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cannot reach the Ally cloud: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Connector is not running")]
    Disconnected,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Unexpected reply from the Ally cloud: {message}")]
    Decode { message: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Command rejected by device {device_id}")]
    Rejected { device_id: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code, when there was one.
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// How a host should react to a failed setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupDisposition {
    /// Transient; retry setup later.
    NotReady,
    /// Permanent until the user fixes something (credentials, config).
    Failed,
}

impl CoreError {
    /// Returns `true` for failures that may clear up on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::Api { status, .. } => status.is_none_or(|s| s >= 500 || s == 429),
            _ => false,
        }
    }

    /// Classify a setup-time failure.
    pub fn setup_disposition(&self) -> SetupDisposition {
        if self.is_transient() {
            SetupDisposition::NotReady
        } else {
            SetupDisposition::Failed
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ally_api::Error> for CoreError {
    fn from(err: ally_api::Error) -> Self {
        match err {
            ally_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            ally_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() || e.is_request() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            ally_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ally_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            ally_api::Error::Http { status: 401 | 403, body } => CoreError::AuthenticationFailed {
                message: format!("access denied: {body}"),
            },
            ally_api::Error::Http { status, body } => CoreError::Api {
                message: format!("HTTP {status}: {}", truncate(&body, 200)),
                status: Some(status),
            },
            ally_api::Error::Deserialization { message, body: _ } => {
                CoreError::Decode { message }
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
