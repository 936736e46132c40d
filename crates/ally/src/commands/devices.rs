//! Device command handlers.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use ally_core::model::{capabilities_for, current_setpoint, heating_control_scaling};
use ally_core::{AdaptationRunStatus, Capabilities, ClimateView, Connector, Device};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Online")]
    online: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Model")]
    model: String,
}

impl From<&Arc<Device>> for DeviceRow {
    fn from(d: &Arc<Device>) -> Self {
        Self {
            id: d.id.to_string(),
            name: d.name.clone(),
            online: if d.online { "yes" } else { "no" }.into(),
            mode: d.mode.clone().unwrap_or_else(|| "-".into()),
            temperature: util::reading(d.temperature, " °C"),
            target: util::reading(current_setpoint(d), " °C"),
            model: d.model.clone().unwrap_or_default(),
        }
    }
}

fn detail(d: &Arc<Device>) -> String {
    let climate = ClimateView::of(d);
    let mut lines = vec![
        format!("ID:          {}", d.id),
        format!("Name:        {}", d.name),
        format!("Model:       {}", d.model.as_deref().unwrap_or("-")),
        format!("Online:      {}", d.online),
        format!("Mode:        {}", d.mode.as_deref().unwrap_or("-")),
        format!("Temperature: {}", util::reading(d.temperature, " °C")),
        format!("Target:      {}", util::reading(climate.target_temperature, " °C")),
        format!("Range:       {:.1} - {:.1} °C", climate.min_temp, climate.max_temp),
    ];
    if d.floor_sensor {
        lines.push(format!(
            "Floor:       {}",
            util::reading(d.floor_temperature, " °C")
        ));
    }
    if let Some(humidity) = d.humidity {
        lines.push(format!("Humidity:    {humidity:.1} %"));
    }
    if let Some(battery) = d.battery {
        lines.push(format!("Battery:     {battery} %"));
    }
    if let Some(open) = d.window_open {
        lines.push(format!("Window open: {open}"));
    }
    if let Some(scaling) = heating_control_scaling(d) {
        lines.push(format!("Scaling:     {scaling}"));
    }
    if let Some(status) = d.adaptation_runstatus.map(AdaptationRunStatus) {
        lines.push(format!(
            "Adaptation:  running={} valve_found={}",
            status.is_running(),
            status.valve_characteristic_found()
        ));
    }
    if let Some(updated) = d.updated_at() {
        lines.push(format!("Updated:     {}", updated.to_rfc3339()));
    }
    lines.join("\n")
}

// ── Capabilities ────────────────────────────────────────────────────

#[derive(Serialize)]
struct CapabilityReport<'a> {
    id: &'a str,
    #[serde(flatten)]
    capabilities: Capabilities,
}

fn capability_detail(report: &CapabilityReport<'_>) -> String {
    let caps = &report.capabilities;
    let join = |items: Vec<String>| {
        if items.is_empty() {
            "-".to_owned()
        } else {
            items.join(", ")
        }
    };
    [
        format!("ID:             {}", report.id),
        format!("Climate:        {}", caps.climate),
        format!(
            "Sensors:        {}",
            join(caps.sensors.iter().map(ToString::to_string).collect())
        ),
        format!(
            "Binary sensors: {}",
            join(caps.binary_sensors.iter().map(ToString::to_string).collect())
        ),
        format!(
            "Switches:       {}",
            join(caps.switches.iter().map(ToString::to_string).collect())
        ),
        format!("Scaling select: {}", caps.heating_control_scaling),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    connector: &Connector,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            let snap = connector.devices_snapshot();
            let out = output::render_list(&global.output, &snap, |d| DeviceRow::from(d), |d| {
                d.id.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let id = util::resolve_device_id(connector, &device)?;
            let found = connector
                .device(&id)
                .ok_or_else(|| CliError::NotFound {
                    resource_type: "device".into(),
                    identifier: device,
                    list_command: "devices list".into(),
                })?;
            let out = output::render_single(&global.output, &found, detail, |d| d.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Capabilities { device } => {
            let id = util::resolve_device_id(connector, &device)?;
            let Some(found) = connector.device(&id) else {
                return Err(CliError::NotFound {
                    resource_type: "device".into(),
                    identifier: device,
                    list_command: "devices list".into(),
                });
            };
            let report = CapabilityReport {
                id: id.as_str(),
                capabilities: capabilities_for(&found),
            };
            let out = output::render_single(&global.output, &report, capability_detail, |r| {
                r.id.to_owned()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Refresh { device } => {
            let id = util::resolve_device_id(connector, &device)?;
            let refreshed = connector.refresh_device(&id).await?;
            let out =
                output::render_single(&global.output, &refreshed, detail, |d| d.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
