// ── Setpoint resolution ──
//
// Which of a thermostat's setpoints is "the" target temperature depends on
// its mode, on a local override (banner control), and on whether the
// firmware only knows the legacy flat `temp_set`.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::device::Device;

/// Status codes that hold a setpoint, in wire spelling.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SetpointKey {
    ManualModeFast,
    AtHomeSetting,
    LeavingHomeSetting,
    PauseSetting,
    HolidaySetting,
    TempSet,
}

impl SetpointKey {
    /// The mode-bound setpoints. Reporting any of these marks a thermostat.
    pub const FAMILY: [Self; 5] = [
        Self::ManualModeFast,
        Self::AtHomeSetting,
        Self::LeavingHomeSetting,
        Self::PauseSetting,
        Self::HolidaySetting,
    ];

    pub fn is_family(self) -> bool {
        !matches!(self, Self::TempSet)
    }
}

/// Thermostat operating modes as the cloud spells them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperatingMode {
    AtHome,
    LeavingHome,
    Away,
    Pause,
    Manual,
    Holiday,
    HolidaySat,
}

impl OperatingMode {
    /// The setpoint a thermostat follows in this mode.
    pub fn setpoint_key(self) -> SetpointKey {
        match self {
            Self::AtHome | Self::HolidaySat => SetpointKey::AtHomeSetting,
            Self::LeavingHome | Self::Away => SetpointKey::LeavingHomeSetting,
            Self::Pause => SetpointKey::PauseSetting,
            Self::Manual => SetpointKey::ManualModeFast,
            Self::Holiday => SetpointKey::HolidaySetting,
        }
    }
}

/// The setpoint the device is following right now.
///
/// Legacy `temp_set` devices always resolve to `temp_set`. Otherwise an
/// active banner control pins `manual_mode_fast`, and the mode decides.
/// Returns `None` for an unknown or missing mode.
pub fn resolve_setpoint_key(device: &Device) -> Option<SetpointKey> {
    if device.uses_legacy_setpoint() {
        return Some(SetpointKey::TempSet);
    }
    if device.banner_ctrl == Some(true) {
        return Some(SetpointKey::ManualModeFast);
    }
    device.operating_mode().map(OperatingMode::setpoint_key)
}

/// Value of the setpoint the device is following, in °C.
pub fn current_setpoint(device: &Device) -> Option<f64> {
    resolve_setpoint_key(device).and_then(|key| device.setpoint(key))
}

/// The setpoint a temperature write should target.
///
/// Legacy devices ignore `explicit` and write `temp_set`. Without an
/// explicit key the current mode decides, falling back to
/// `manual_mode_fast` when the mode is unknown.
pub fn write_target(device: &Device, explicit: Option<SetpointKey>) -> SetpointKey {
    if device.uses_legacy_setpoint() {
        return SetpointKey::TempSet;
    }
    explicit
        .or_else(|| resolve_setpoint_key(device))
        .unwrap_or(SetpointKey::ManualModeFast)
}
