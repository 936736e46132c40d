// Shared transport configuration for building the reqwest::Client.
//
// The token endpoint and the device endpoints share one client so they
// share the timeout and connection pool.

use std::time::Duration;

use url::Url;

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://api.danfoss.com";

/// Fixed per-request timeout used by the cloud connector.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("ally/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(crate::error::Error::Transport)
    }

    /// Timeout in whole seconds, for error reporting.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }
}

/// The production API host as a parsed URL.
pub fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("static base URL is valid")
}
