// ── Command API ──
//
// Every write flows through the `Command` enum. The connector's command
// processor hands each one to the `CommandDispatcher`, which updates the
// local copy optimistically and then posts to the cloud.

mod dispatch;

use std::sync::Arc;

use ally_api::CommandPayload;

use crate::error::CoreError;
use crate::model::{AuxSwitch, Device, DeviceId, HeatingControlScaling, OperatingMode, SetpointKey};

pub use dispatch::{CommandDispatcher, celsius_to_tenths};

/// A command envelope sent through the command channel, with a oneshot
/// for the reply.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All write operations against a device.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Write a setpoint. Without an explicit key, the one the current mode
    /// follows is written.
    SetTemperature {
        device_id: DeviceId,
        celsius: f64,
        setpoint: Option<SetpointKey>,
    },
    SetMode {
        device_id: DeviceId,
        mode: OperatingMode,
    },
    /// Send `(code, value)` pairs as-is; values are in wire units.
    SendRaw {
        device_id: DeviceId,
        commands: Vec<CommandPayload>,
    },
    SetSwitch {
        device_id: DeviceId,
        switch: AuxSwitch,
        on: bool,
    },
    SetHeatingControlScaling {
        device_id: DeviceId,
        option: HeatingControlScaling,
    },
}

impl Command {
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::SetTemperature { device_id, .. }
            | Self::SetMode { device_id, .. }
            | Self::SendRaw { device_id, .. }
            | Self::SetSwitch { device_id, .. }
            | Self::SetHeatingControlScaling { device_id, .. } => device_id,
        }
    }
}

/// Outcome of an accepted command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// The local copy after the optimistic update.
    pub device: Arc<Device>,
    /// What was posted.
    pub sent: Vec<CommandPayload>,
}
