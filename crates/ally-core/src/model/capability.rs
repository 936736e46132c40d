// ── Presentation capabilities ──
//
// Pure derivations a host uses to decide which widgets to build for a
// device and what state to show in them. Everything keys off attribute
// presence: a sensor or switch exists only when its attribute was reported.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use super::control::{AdaptationRunStatus, HeatingControlScaling};
use super::device::Device;
use super::setpoint::current_setpoint;

pub const DEFAULT_MIN_TEMP: f64 = 4.5;
pub const DEFAULT_MAX_TEMP: f64 = 35.0;
pub const TEMP_STEP: f64 = 0.5;

/// Model string (lower-cased) of the zigbee relay module, which never gets
/// auxiliary switches.
const ZIGBEE_MODULE: &str = "icon zigbee module";

// ── Switches ────────────────────────────────────────────────────────

/// Writable auxiliary flags.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AuxSwitch {
    /// Open-window detection (`window_toggle`).
    WindowDetection,
    /// Pre-heat (`switch`).
    PreHeat,
    LoadBalance,
    RadiatorCovered,
    HeatAvailable,
}

impl AuxSwitch {
    /// Status/command code on the wire.
    pub fn code(self) -> &'static str {
        match self {
            Self::WindowDetection => "window_toggle",
            Self::PreHeat => "switch",
            Self::LoadBalance => "load_balance_enable",
            Self::RadiatorCovered => "radiator_covered",
            Self::HeatAvailable => "heat_available",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::iter().find(|s| s.code() == code)
    }

    pub fn state(self, device: &Device) -> Option<bool> {
        device.extra(self.code()).map(|v| v.is_truthy())
    }
}

// ── Sensors ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    FloorTemperature,
    Humidity,
    Battery,
}

impl SensorKind {
    pub fn value(self, device: &Device) -> Option<f64> {
        match self {
            Self::Temperature => device.temperature,
            Self::FloorTemperature => device.floor_temperature,
            Self::Humidity => device.humidity,
            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            Self::Battery => device.battery.map(|b| b as f64),
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Temperature | Self::FloorTemperature => "°C",
            Self::Humidity | Self::Battery => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BinarySensorKind {
    WindowOpen,
    /// Reported inverted: `true` means unlocked.
    ChildLock,
    Connectivity,
    SetpointChangeManual,
    PreHeating,
    MountingMode,
    HeatSupplyRequest,
    BoilerRelay,
    /// Thermal actuator output (`output_status`).
    ThermalActuator,
    AdaptationRunning,
    ValveCharacteristicFound,
}

impl BinarySensorKind {
    /// Sensor state, or `None` when the device does not report the
    /// underlying attribute.
    pub fn state(self, device: &Device) -> Option<bool> {
        let extra = |key: &str| device.extra(key).map(|v| v.is_truthy());
        let runstatus = device.adaptation_runstatus.map(AdaptationRunStatus);
        match self {
            Self::WindowOpen => device.window_open,
            Self::ChildLock => device.child_lock.as_ref().map(|v| !v.is_truthy()),
            Self::Connectivity => Some(device.online),
            Self::SetpointChangeManual => device
                .setpoint_change_source
                .as_deref()
                .map(|source| source == "Manual"),
            Self::PreHeating => extra("switch_state").map(|on| on && device.flag("switch")),
            Self::MountingMode => extra("mounting_mode_active"),
            Self::HeatSupplyRequest => extra("heat_supply_request"),
            Self::BoilerRelay => extra("boiler_relay"),
            Self::ThermalActuator => extra("output_status"),
            Self::AdaptationRunning => runstatus.map(AdaptationRunStatus::is_running),
            Self::ValveCharacteristicFound => {
                runstatus.map(AdaptationRunStatus::valve_characteristic_found)
            }
        }
    }
}

// ── Climate ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HvacMode {
    Auto,
    Heat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Preset {
    Home,
    Away,
    Pause,
    Holiday,
    Manual,
}

/// What a thermostat widget shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateView {
    pub available: bool,
    pub target_temperature: Option<f64>,
    /// Falls back to the target when the device has no sensor.
    pub current_temperature: Option<f64>,
    pub min_temp: f64,
    pub max_temp: f64,
    pub step: f64,
    pub hvac_mode: Option<HvacMode>,
    pub preset: Option<Preset>,
}

impl ClimateView {
    pub fn of(device: &Device) -> Self {
        let target = current_setpoint(device);
        let (min_temp, max_temp) = temperature_bounds(device);
        let mode = device.mode.as_deref();
        Self {
            available: device.online,
            target_temperature: target,
            current_temperature: device.temperature.or(target),
            min_temp,
            max_temp,
            step: TEMP_STEP,
            hvac_mode: match mode {
                Some("at_home" | "leaving_home") => Some(HvacMode::Auto),
                Some("manual") => Some(HvacMode::Heat),
                _ => None,
            },
            preset: match mode {
                Some("at_home") => Some(Preset::Home),
                Some("leaving_home") => Some(Preset::Away),
                Some("pause") => Some(Preset::Pause),
                Some("holiday") => Some(Preset::Holiday),
                Some("manual") => Some(Preset::Manual),
                _ => None,
            },
        }
    }
}

/// Allowed setpoint range, from `lower_temp`/`upper_temp` when reported.
pub fn temperature_bounds(device: &Device) -> (f64, f64) {
    (
        device.lower_temp.unwrap_or(DEFAULT_MIN_TEMP),
        device.upper_temp.unwrap_or(DEFAULT_MAX_TEMP),
    )
}

// ── Capabilities ────────────────────────────────────────────────────

/// The widgets a host should build for one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub climate: bool,
    pub sensors: Vec<SensorKind>,
    pub binary_sensors: Vec<BinarySensorKind>,
    pub switches: Vec<AuxSwitch>,
    pub heating_control_scaling: bool,
}

type Decorator = fn(&Device, &mut Capabilities);

/// Model-specific decoration, keyed by lower-cased model string. Models
/// not listed get [`standard_model`].
const MODEL_TABLE: &[(&str, Decorator)] = &[(ZIGBEE_MODULE, zigbee_module)];

/// Derive the capability set of a device.
pub fn capabilities_for(device: &Device) -> Capabilities {
    let mut caps = Capabilities {
        climate: device.presents_as_thermostat(),
        sensors: SensorKind::iter()
            .filter(|kind| kind.value(device).is_some())
            .collect(),
        binary_sensors: BinarySensorKind::iter()
            .filter(|kind| kind.state(device).is_some())
            .collect(),
        switches: Vec::new(),
        heating_control_scaling: device.ctrl_alg.is_some(),
    };

    if let Some(model) = device.model.as_deref() {
        let model = model.to_lowercase();
        let decorate = MODEL_TABLE
            .iter()
            .find(|(name, _)| *name == model)
            .map_or(standard_model as Decorator, |(_, decorator)| *decorator);
        decorate(device, &mut caps);
    }

    caps
}

fn standard_model(device: &Device, caps: &mut Capabilities) {
    caps.switches = AuxSwitch::iter()
        .filter(|switch| switch.state(device).is_some())
        .collect();
}

fn zigbee_module(_device: &Device, caps: &mut Capabilities) {
    caps.switches.clear();
}

/// Current heating control scaling option, if the register is reported.
pub fn heating_control_scaling(device: &Device) -> Option<HeatingControlScaling> {
    device.ctrl_alg.and_then(HeatingControlScaling::from_register)
}
