//! Shared helpers for command handlers.

use ally_core::{Connector, DeviceId};

use crate::error::CliError;

/// Resolve a device identifier (ID, or case-insensitive name) via
/// snapshot lookup.
pub fn resolve_device_id(connector: &Connector, identifier: &str) -> Result<DeviceId, CliError> {
    let snap = connector.devices_snapshot();
    snap.iter()
        .find(|d| d.id.as_str() == identifier)
        .or_else(|| snap.iter().find(|d| d.name.eq_ignore_ascii_case(identifier)))
        .map(|d| d.id.clone())
        .ok_or_else(|| CliError::NotFound {
            resource_type: "device".into(),
            identifier: identifier.into(),
            list_command: "devices list".into(),
        })
}

/// Format an optional measurement with its unit, or `-`.
pub fn reading(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v:.1}{unit}"))
}
