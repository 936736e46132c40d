// ── Device domain types ──

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::setpoint::{OperatingMode, SetpointKey};
use super::value::AttrValue;

// ── DeviceId ────────────────────────────────────────────────────────

/// Cloud-assigned device identifier, stable across polls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── Setpoints ───────────────────────────────────────────────────────

/// The five mode-bound setpoints, in °C.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Setpoints {
    pub manual_mode_fast: Option<f64>,
    pub at_home_setting: Option<f64>,
    pub leaving_home_setting: Option<f64>,
    pub pause_setting: Option<f64>,
    pub holiday_setting: Option<f64>,
}

impl Setpoints {
    /// Value for a family key. `TempSet` is not part of the family.
    pub fn get(&self, key: SetpointKey) -> Option<f64> {
        match key {
            SetpointKey::ManualModeFast => self.manual_mode_fast,
            SetpointKey::AtHomeSetting => self.at_home_setting,
            SetpointKey::LeavingHomeSetting => self.leaving_home_setting,
            SetpointKey::PauseSetting => self.pause_setting,
            SetpointKey::HolidaySetting => self.holiday_setting,
            SetpointKey::TempSet => None,
        }
    }

    fn slot(&mut self, key: SetpointKey) -> Option<&mut Option<f64>> {
        match key {
            SetpointKey::ManualModeFast => Some(&mut self.manual_mode_fast),
            SetpointKey::AtHomeSetting => Some(&mut self.at_home_setting),
            SetpointKey::LeavingHomeSetting => Some(&mut self.leaving_home_setting),
            SetpointKey::PauseSetting => Some(&mut self.pause_setting),
            SetpointKey::HolidaySetting => Some(&mut self.holiday_setting),
            SetpointKey::TempSet => None,
        }
    }

    /// `true` when none of the five family setpoints is known.
    pub fn is_empty(&self) -> bool {
        SetpointKey::FAMILY.iter().all(|k| self.get(*k).is_none())
    }
}

// ── Device ──────────────────────────────────────────────────────────

/// A thermostat (or zigbee module / room sensor) as last seen by the
/// connector.
///
/// Temperatures are in °C, already scaled from the tenths-of-degree wire
/// encoding. Fields are `None` when the device did not report the
/// corresponding status code in its latest poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub online: bool,
    /// Epoch seconds of the last cloud-side update.
    pub update_time: Option<i64>,
    pub model: Option<String>,

    /// Set when any mode-bound setpoint was reported.
    pub is_thermostat: bool,
    pub floor_sensor: bool,

    pub setpoints: Setpoints,
    /// Legacy flat setpoint used by older firmware instead of the family.
    pub temp_set: Option<f64>,

    pub temperature: Option<f64>,
    pub floor_temperature: Option<f64>,
    pub upper_temp: Option<f64>,
    pub lower_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub battery: Option<i64>,

    pub window_open: Option<bool>,
    pub child_lock: Option<AttrValue>,
    pub mode: Option<String>,
    pub work_state: Option<String>,
    /// Local override at the thermostat itself.
    pub banner_ctrl: Option<bool>,
    /// Heating-control-scaling register (uint8).
    pub ctrl_alg: Option<u8>,
    pub adaptation_runstatus: Option<u32>,
    pub setpoint_change_source: Option<String>,

    /// Auxiliary vendor flags, verbatim.
    pub extras: BTreeMap<String, AttrValue>,
}

impl Device {
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            online: false,
            update_time: None,
            model: None,
            is_thermostat: false,
            floor_sensor: false,
            setpoints: Setpoints::default(),
            temp_set: None,
            temperature: None,
            floor_temperature: None,
            upper_temp: None,
            lower_temp: None,
            humidity: None,
            battery: None,
            window_open: None,
            child_lock: None,
            mode: None,
            work_state: None,
            banner_ctrl: None,
            ctrl_alg: None,
            adaptation_runstatus: None,
            setpoint_change_source: None,
            extras: BTreeMap::new(),
        }
    }

    /// Older firmware reports only `temp_set`; every setpoint read and write
    /// goes there regardless of mode.
    pub fn uses_legacy_setpoint(&self) -> bool {
        self.setpoints.is_empty() && self.temp_set.is_some()
    }

    /// Whether presentation layers should treat this as a thermostat.
    pub fn presents_as_thermostat(&self) -> bool {
        self.is_thermostat || self.temp_set.is_some()
    }

    /// The reported mode, if it is one we know.
    pub fn operating_mode(&self) -> Option<OperatingMode> {
        self.mode.as_deref()?.parse().ok()
    }

    pub fn setpoint(&self, key: SetpointKey) -> Option<f64> {
        match key {
            SetpointKey::TempSet => self.temp_set,
            family => self.setpoints.get(family),
        }
    }

    pub fn set_setpoint(&mut self, key: SetpointKey, celsius: f64) {
        match self.setpoints.slot(key) {
            Some(slot) => *slot = Some(celsius),
            None => self.temp_set = Some(celsius),
        }
    }

    pub fn extra(&self, key: &str) -> Option<&AttrValue> {
        self.extras.get(key)
    }

    /// Truthiness of an auxiliary flag; absent flags read as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.extra(key).is_some_and(AttrValue::is_truthy)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.update_time?, 0)
    }
}
