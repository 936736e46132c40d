// Ally device endpoints

use serde_json::Value;
use tracing::{debug, warn};

use crate::client::AllyClient;
use crate::error::Error;
use crate::models::{CommandPayload, CommandRequest, RawDevice, ResultEnvelope};

impl AllyClient {
    /// List every device on the account.
    ///
    /// `GET /ally/devices`
    ///
    /// Entries are decoded one at a time; an entry that does not decode is
    /// skipped with a warning and the rest of the list is kept.
    pub async fn list_devices(&self) -> Result<Vec<RawDevice>, Error> {
        let envelope: ResultEnvelope<Vec<Value>> = self.get(&["ally", "devices"]).await?;
        let devices: Vec<RawDevice> = envelope
            .result
            .unwrap_or_default()
            .into_iter()
            .filter_map(decode_listed_device)
            .collect();
        debug!(count = devices.len(), "listed devices");
        Ok(devices)
    }

    /// Fetch a single device.
    ///
    /// `GET /ally/devices/{id}`
    pub async fn get_device(&self, device_id: &str) -> Result<RawDevice, Error> {
        let envelope: ResultEnvelope<RawDevice> =
            self.get(&["ally", "devices", device_id]).await?;
        envelope.result.ok_or_else(|| Error::Deserialization {
            message: format!("reply for device {device_id} has no result"),
            body: String::new(),
        })
    }

    /// Send a batch of `(code, value)` commands to a device.
    ///
    /// `POST /ally/devices/{id}/commands` with `{"commands": [...]}`. Returns
    /// the cloud's `result` flag; `false` means the device refused.
    pub async fn send_commands(
        &self,
        device_id: &str,
        commands: &[CommandPayload],
    ) -> Result<bool, Error> {
        debug!(device_id, count = commands.len(), "sending commands");
        let envelope: ResultEnvelope<bool> = self
            .post(
                &["ally", "devices", device_id, "commands"],
                &CommandRequest { commands },
            )
            .await?;
        envelope.result.ok_or_else(|| Error::Deserialization {
            message: format!("command reply for device {device_id} has no result"),
            body: String::new(),
        })
    }
}

fn decode_listed_device(entry: Value) -> Option<RawDevice> {
    let device_id = entry
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("<missing>")
        .to_owned();
    match serde_json::from_value(entry) {
        Ok(device) => Some(device),
        Err(e) => {
            warn!(device_id, error = %e, "skipping undecodable device");
            None
        }
    }
}
