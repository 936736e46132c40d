// ── Command dispatcher ──

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use ally_api::CommandPayload;

use super::{Command, CommandResult};
use crate::backend::AllyBackend;
use crate::convert::apply_status;
use crate::error::CoreError;
use crate::model::capability::temperature_bounds;
use crate::model::{
    AttrValue, AuxSwitch, Device, DeviceId, HeatingControlScaling, OperatingMode, SetpointKey,
    merge_ctrl_alg, write_target,
};
use crate::store::DeviceStore;

/// °C to the wire's tenths-of-a-degree integer, rounded to nearest.
pub fn celsius_to_tenths(celsius: f64) -> i64 {
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    let tenths = (celsius * 10.0).round() as i64;
    tenths
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn tenths_to_celsius(tenths: i64) -> f64 {
    tenths as f64 / 10.0
}

/// Turns intents into command payloads.
///
/// Each write validates against the local copy, updates that copy
/// optimistically (recording the write time), and only then posts. A
/// failed post is returned to the caller but the optimistic value stays:
/// the next poll reconciles.
pub struct CommandDispatcher {
    backend: Arc<dyn AllyBackend>,
    store: Arc<DeviceStore>,
}

impl CommandDispatcher {
    pub(crate) fn new(backend: Arc<dyn AllyBackend>, store: Arc<DeviceStore>) -> Self {
        Self { backend, store }
    }

    pub async fn dispatch(&self, command: Command) -> Result<CommandResult, CoreError> {
        match command {
            Command::SetTemperature {
                device_id,
                celsius,
                setpoint,
            } => self.set_temperature(&device_id, celsius, setpoint).await,
            Command::SetMode { device_id, mode } => self.set_mode(&device_id, mode).await,
            Command::SendRaw {
                device_id,
                commands,
            } => self.send_raw_commands(&device_id, commands).await,
            Command::SetSwitch {
                device_id,
                switch,
                on,
            } => self.set_switch(&device_id, switch, on).await,
            Command::SetHeatingControlScaling { device_id, option } => {
                self.set_heating_control_scaling(&device_id, option).await
            }
        }
    }

    /// Write a setpoint in °C.
    pub async fn set_temperature(
        &self,
        id: &DeviceId,
        celsius: f64,
        setpoint: Option<SetpointKey>,
    ) -> Result<CommandResult, CoreError> {
        let device = self.device(id)?;

        let (min, max) = temperature_bounds(&device);
        if !celsius.is_finite() || celsius < min || celsius > max {
            return Err(CoreError::ValidationFailed {
                message: format!("temperature {celsius} °C outside {min}..={max} °C for {id}"),
            });
        }

        let key = write_target(&device, setpoint);
        let tenths = celsius_to_tenths(celsius);
        debug!(device_id = %id, setpoint = %key, tenths, "setting temperature");

        let payload = vec![CommandPayload::new(key.as_ref(), tenths)];
        let local = tenths_to_celsius(tenths);
        self.write(id, payload, |d| d.set_setpoint(key, local)).await
    }

    pub async fn set_mode(
        &self,
        id: &DeviceId,
        mode: OperatingMode,
    ) -> Result<CommandResult, CoreError> {
        self.device(id)?;
        debug!(device_id = %id, %mode, "setting mode");
        let payload = vec![CommandPayload::new("mode", mode.as_ref())];
        self.write(id, payload, |d| d.mode = Some(mode.to_string()))
            .await
    }

    /// Post raw `(code, value)` pairs. The local copy is updated through
    /// the decode table, so wire units are converted the same way a poll
    /// would convert them.
    pub async fn send_raw_commands(
        &self,
        id: &DeviceId,
        commands: Vec<CommandPayload>,
    ) -> Result<CommandResult, CoreError> {
        if commands.is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "no commands to send".into(),
            });
        }
        self.device(id)?;

        let local: Vec<(String, Value)> = commands
            .iter()
            .map(|c| (c.code.clone(), c.value.clone()))
            .collect();
        self.write(id, commands, move |d| {
            for (code, value) in &local {
                apply_status(d, code, value);
            }
        })
        .await
    }

    pub async fn set_switch(
        &self,
        id: &DeviceId,
        switch: AuxSwitch,
        on: bool,
    ) -> Result<CommandResult, CoreError> {
        self.device(id)?;
        let code = switch.code();
        debug!(device_id = %id, code, on, "setting switch");
        let payload = vec![CommandPayload::new(code, on)];
        self.write(id, payload, move |d| {
            d.extras.insert(code.to_owned(), AttrValue::Bool(on));
        })
        .await
    }

    /// Change the lower nibble of `ctrl_alg`, keeping the upper one.
    pub async fn set_heating_control_scaling(
        &self,
        id: &DeviceId,
        option: HeatingControlScaling,
    ) -> Result<CommandResult, CoreError> {
        let missing = || CoreError::ValidationFailed {
            message: format!("device {id} does not report ctrl_alg"),
        };
        self.device(id)?.ctrl_alg.ok_or_else(missing)?;

        // Merge against the entry being replaced, not the earlier read.
        let selection = option.threshold();
        let device = self.store.apply_optimistic(id, |d| {
            d.ctrl_alg = d.ctrl_alg.map(|current| merge_ctrl_alg(current, selection));
        })?;
        let register = device.ctrl_alg.ok_or_else(missing)?;

        debug!(device_id = %id, %option, register, "setting heating control scaling");
        let payload = vec![CommandPayload::new("ctrl_alg", register)];
        self.post(id, device, payload).await
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn device(&self, id: &DeviceId) -> Result<Arc<Device>, CoreError> {
        self.store.device(id).ok_or_else(|| CoreError::DeviceNotFound {
            identifier: id.to_string(),
        })
    }

    /// Optimistic update, then POST. Never rolls back.
    async fn write(
        &self,
        id: &DeviceId,
        payload: Vec<CommandPayload>,
        update: impl FnOnce(&mut Device),
    ) -> Result<CommandResult, CoreError> {
        let device = self.store.apply_optimistic(id, update)?;
        self.post(id, device, payload).await
    }

    async fn post(
        &self,
        id: &DeviceId,
        device: Arc<Device>,
        payload: Vec<CommandPayload>,
    ) -> Result<CommandResult, CoreError> {
        let accepted = self
            .backend
            .send_commands(id.as_str(), &payload)
            .await
            .inspect_err(|e| warn!(device_id = %id, error = %e, "command failed"))?;

        if !accepted {
            warn!(device_id = %id, "command rejected by device");
            return Err(CoreError::Rejected {
                device_id: id.to_string(),
            });
        }

        Ok(CommandResult {
            device,
            sent: payload,
        })
    }
}
