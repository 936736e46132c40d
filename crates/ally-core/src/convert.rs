// ── API-to-domain conversion (status decoder) ──
//
// Turns the cloud's flat `(code, value)` status list into a `Device`.
// Decoding is pure and total. Unknown codes are ignored; values that
// cannot be coerced are skipped with a warning.

use serde_json::Value;
use tracing::{trace, warn};

use ally_api::RawDevice;

use crate::model::value::{boolean, integer, number};
use crate::model::{AttrValue, Device, SetpointKey};

/// Auxiliary vendor flags kept verbatim in `Device::extras`.
pub const EXTRA_CODES: [&str; 10] = [
    "window_toggle",
    "switch",
    "switch_state",
    "load_balance_enable",
    "radiator_covered",
    "heat_available",
    "mounting_mode_active",
    "heat_supply_request",
    "boiler_relay",
    "output_status",
];

/// Result of applying one status record to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Applied,
    /// Code not in the decode table (or `MeasuredValue` without a floor
    /// sensor).
    Ignored,
    /// Recognized code whose value could not be coerced.
    Malformed,
}

impl From<&RawDevice> for Device {
    fn from(raw: &RawDevice) -> Self {
        decode_device(raw)
    }
}

/// Decode one raw device.
pub fn decode_device(raw: &RawDevice) -> Device {
    let mut device = Device::new(raw.id.as_str(), raw.name.trim());
    device.online = raw.online;
    device.update_time = raw.update_time;
    device.model.clone_from(&raw.model);

    // `MeasuredValue` means floor temperature only when a floor sensor is
    // fitted, and the flag may come after the reading.
    device.floor_sensor = raw
        .status
        .iter()
        .filter(|status| status.code == "floor_sensor")
        .filter_map(|status| AttrValue::from_json(&status.value))
        .last()
        .is_some_and(|v| v.is_truthy());

    for status in &raw.status {
        match apply_status(&mut device, &status.code, &status.value) {
            StatusOutcome::Applied => {}
            StatusOutcome::Ignored => {
                trace!(device_id = %device.id, code = %status.code, "ignoring status code");
            }
            StatusOutcome::Malformed => warn!(
                device_id = %device.id,
                code = %status.code,
                value = %status.value,
                "skipping malformed status value"
            ),
        }
    }

    device
}

pub fn decode_devices(raw: &[RawDevice]) -> Vec<Device> {
    raw.iter().map(decode_device).collect()
}

/// Apply one `(code, value)` record using the decode table.
///
/// Shared by the poll path and the optimistic write path, so a raw command
/// lands in the local copy exactly as the next poll would decode it.
pub fn apply_status(device: &mut Device, code: &str, value: &Value) -> StatusOutcome {
    if let Ok(key) = code.parse::<SetpointKey>() {
        let Some(celsius) = tenths(value) else {
            return StatusOutcome::Malformed;
        };
        device.set_setpoint(key, celsius);
        if key.is_family() {
            device.is_thermostat = true;
        }
        return StatusOutcome::Applied;
    }

    if EXTRA_CODES.contains(&code) {
        return match AttrValue::from_json(value) {
            Some(flag) => {
                device.extras.insert(code.to_owned(), flag);
                StatusOutcome::Applied
            }
            None => StatusOutcome::Malformed,
        };
    }

    match code {
        "temp_current" | "va_temperature" => set(&mut device.temperature, tenths(value)),
        "MeasuredValue" if device.floor_sensor => {
            set(&mut device.floor_temperature, tenths(value))
        }
        "upper_temp" => set(&mut device.upper_temp, tenths(value)),
        "lower_temp" => set(&mut device.lower_temp, tenths(value)),
        "va_humidity" => set(&mut device.humidity, tenths(value)),
        "battery_percentage" => set(&mut device.battery, integer(value)),
        "window_state" => {
            device.window_open = Some(value.as_str() == Some("open"));
            StatusOutcome::Applied
        }
        "child_lock" => set(&mut device.child_lock, AttrValue::from_json(value)),
        "mode" => set(&mut device.mode, text(value)),
        "work_state" => set(&mut device.work_state, text(value)),
        "SetpointChangeSource" => set(&mut device.setpoint_change_source, text(value)),
        "banner_ctrl" => set(&mut device.banner_ctrl, boolean(value)),
        "ctrl_alg" => set(
            &mut device.ctrl_alg,
            integer(value).and_then(|v| u8::try_from(v).ok()),
        ),
        "adaptation_runstatus" => set(
            &mut device.adaptation_runstatus,
            integer(value).and_then(|v| u32::try_from(v).ok()),
        ),
        "floor_sensor" => match AttrValue::from_json(value) {
            Some(flag) => {
                device.floor_sensor = flag.is_truthy();
                StatusOutcome::Applied
            }
            None => StatusOutcome::Malformed,
        },
        _ => StatusOutcome::Ignored,
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Wire tenths of a degree (or percent) to the display unit.
fn tenths(value: &Value) -> Option<f64> {
    number(value)
        .filter(|v| v.is_finite())
        .map(|v| v / 10.0)
}

/// Verbatim text; other scalars are stringified.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn set<T>(slot: &mut Option<T>, decoded: Option<T>) -> StatusOutcome {
    match decoded {
        Some(value) => {
            *slot = Some(value);
            StatusOutcome::Applied
        }
        None => StatusOutcome::Malformed,
    }
}
