// ── Backend seam ──
//
// The synchronizer and dispatcher reach the cloud only through this trait.
// `AllyClient` is the production implementation.

use async_trait::async_trait;

use ally_api::{AllyClient, CommandPayload, RawDevice};

/// The four cloud operations the connector needs.
#[async_trait]
pub trait AllyBackend: Send + Sync + 'static {
    /// Acquire (or confirm) a valid access token.
    async fn authenticate(&self) -> Result<(), ally_api::Error>;

    async fn list_devices(&self) -> Result<Vec<RawDevice>, ally_api::Error>;

    async fn get_device(&self, device_id: &str) -> Result<RawDevice, ally_api::Error>;

    /// Returns the cloud's `result` flag.
    async fn send_commands(
        &self,
        device_id: &str,
        commands: &[CommandPayload],
    ) -> Result<bool, ally_api::Error>;
}

#[async_trait]
impl AllyBackend for AllyClient {
    async fn authenticate(&self) -> Result<(), ally_api::Error> {
        AllyClient::authenticate(self).await
    }

    async fn list_devices(&self) -> Result<Vec<RawDevice>, ally_api::Error> {
        AllyClient::list_devices(self).await
    }

    async fn get_device(&self, device_id: &str) -> Result<RawDevice, ally_api::Error> {
        AllyClient::get_device(self, device_id).await
    }

    async fn send_commands(
        &self,
        device_id: &str,
        commands: &[CommandPayload],
    ) -> Result<bool, ally_api::Error> {
        AllyClient::send_commands(self, device_id, commands).await
    }
}
