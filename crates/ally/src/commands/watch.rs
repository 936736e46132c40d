//! `watch`: keep the connector running and print each device update.

use std::collections::HashMap;

use ally_core::model::current_setpoint;
use ally_core::{Connector, Device, DeviceId};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

/// The fields a watch line shows; a change in any of them is highlighted.
#[derive(Clone, PartialEq)]
struct Line {
    temperature: Option<f64>,
    target: Option<f64>,
    mode: Option<String>,
    online: bool,
}

impl From<&Device> for Line {
    fn from(d: &Device) -> Self {
        Self {
            temperature: d.temperature,
            target: current_setpoint(d),
            mode: d.mode.clone(),
            online: d.online,
        }
    }
}

/// Print updates until Ctrl-C. The connector must already be connected
/// with its poll task running.
pub async fn handle(connector: &Connector, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut stream = connector.devices();
    let mut previous: HashMap<DeviceId, Line> = HashMap::new();

    print_update(stream.current(), &mut previous, global, color)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            snapshot = stream.changed() => {
                let Some(snapshot) = snapshot else { break };
                print_update(&snapshot, &mut previous, global, color)?;
            }
        }
    }
    Ok(())
}

fn print_update(
    snapshot: &ally_core::DeviceSnapshot,
    previous: &mut HashMap<DeviceId, Line>,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            let stamp = chrono::Local::now().format("%H:%M:%S").to_string();
            for device in snapshot.iter() {
                let line = Line::from(device.as_ref());
                let before = previous.insert(device.id.clone(), line.clone());
                if before.as_ref() == Some(&line) {
                    continue;
                }
                let text = format!(
                    "{} {:<12} {:<24} temp {:>8}  target {:>8}  mode {}{}",
                    output::dim(&stamp, color),
                    device.id,
                    device.name,
                    util::reading(line.temperature, " °C"),
                    util::reading(line.target, " °C"),
                    line.mode.as_deref().unwrap_or("-"),
                    if line.online { "" } else { "  (offline)" },
                );
                let text = if before.is_some() {
                    output::changed(&text, color)
                } else {
                    text
                };
                output::print_output(&text, global.quiet);
            }
            Ok(())
        }
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            // one document per update
            let format = if matches!(global.output, OutputFormat::Yaml) {
                OutputFormat::Yaml
            } else {
                OutputFormat::JsonCompact
            };
            let out = output::render_single(
                &format,
                snapshot.as_slice(),
                |_| String::new(),
                |_| String::new(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
