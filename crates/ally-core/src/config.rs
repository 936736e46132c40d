// ── Runtime connector configuration ──
//
// Describes how to reach the cloud and how to pace polling. Carries
// credential data but never touches disk; `ally-config` or the host builds
// a `ConnectorConfig` and hands it in.

use std::time::Duration;

use ally_api::Credentials;
use url::Url;

/// Polling and race-avoidance timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTuning {
    /// Period of the background poll. Zero disables the poll task.
    pub poll_interval: Duration,
    /// Minimum spacing between two poll starts.
    pub throttle_floor: Duration,
    /// Renew the token this long before it expires.
    pub token_refresh_margin: Duration,
    /// A poll that starts within this long after a write waits this long.
    pub race_delay: Duration,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            throttle_floor: Duration::from_secs(10),
            token_refresh_margin: Duration::from_secs(30),
            race_delay: Duration::from_secs(1),
        }
    }
}

/// Everything needed to run a [`Connector`](crate::Connector).
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub credentials: Credentials,
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    pub tuning: SyncTuning,
}

impl ConnectorConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: ally_api::transport::default_base_url(),
            timeout: ally_api::transport::DEFAULT_TIMEOUT,
            tuning: SyncTuning::default(),
        }
    }

    pub(crate) fn transport(&self) -> ally_api::TransportConfig {
        ally_api::TransportConfig {
            base_url: self.base_url.clone(),
            timeout: self.timeout,
            ..Default::default()
        }
    }
}
