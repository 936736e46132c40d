// ── Domain model ──
//
// Normalized device types built by the status decoder. Nothing in here
// performs I/O; the derivations in `setpoint`, `control` and `capability`
// are pure functions over a `Device`.

pub mod capability;
pub mod control;
pub mod device;
pub mod setpoint;
pub mod value;

pub use capability::{
    AuxSwitch, BinarySensorKind, Capabilities, ClimateView, DEFAULT_MAX_TEMP, DEFAULT_MIN_TEMP,
    HvacMode, Preset, SensorKind, TEMP_STEP, capabilities_for, heating_control_scaling,
    temperature_bounds,
};
pub use control::{AdaptationRunStatus, HeatingControlScaling, merge_ctrl_alg};
pub use device::{Device, DeviceId, Setpoints};
pub use setpoint::{OperatingMode, SetpointKey, current_setpoint, resolve_setpoint_key, write_target};
pub use value::AttrValue;
