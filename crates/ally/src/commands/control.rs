//! Write command handlers: setpoints, mode, switches, scaling, raw codes.

use serde_json::Value;

use ally_core::{CommandPayload, CommandResult, Connector};

use crate::cli::{GlobalOpts, RawArgs, ScalingArgs, SetModeArgs, SetTempArgs, SwitchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn set_temp(
    connector: &Connector,
    args: SetTempArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = util::resolve_device_id(connector, &args.device)?;
    let result = connector
        .set_temperature(id, args.celsius, args.setpoint)
        .await?;
    report(&result, global, "Setpoint updated")
}

pub async fn set_mode(
    connector: &Connector,
    args: SetModeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = util::resolve_device_id(connector, &args.device)?;
    let result = connector.set_mode(id, args.mode).await?;
    report(&result, global, "Mode updated")
}

pub async fn switch(
    connector: &Connector,
    args: SwitchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = util::resolve_device_id(connector, &args.device)?;
    let on = args.state.is_on();
    let result = connector.set_switch(id, args.switch, on).await?;
    let state = if on { "on" } else { "off" };
    report(&result, global, &format!("{} turned {state}", args.switch))
}

pub async fn scaling(
    connector: &Connector,
    args: ScalingArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = util::resolve_device_id(connector, &args.device)?;
    let result = connector
        .set_heating_control_scaling(id, args.option)
        .await?;
    report(&result, global, "Heating control scaling updated")
}

pub async fn raw(connector: &Connector, args: RawArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let id = util::resolve_device_id(connector, &args.device)?;
    let commands = args
        .commands
        .iter()
        .map(|pair| parse_pair(pair))
        .collect::<Result<Vec<_>, _>>()?;
    let result = connector.send_raw_commands(id, commands).await?;
    report(&result, global, "Commands sent")
}

/// `code=value`; the value is JSON when it parses, a string otherwise.
fn parse_pair(pair: &str) -> Result<CommandPayload, CliError> {
    let Some((code, value)) = pair.split_once('=') else {
        return Err(CliError::Validation {
            field: "command".into(),
            reason: format!("expected CODE=VALUE, got '{pair}'"),
        });
    };
    let code = code.trim();
    if code.is_empty() {
        return Err(CliError::Validation {
            field: "command".into(),
            reason: format!("missing code in '{pair}'"),
        });
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok(CommandPayload::new(code, value))
}

/// Print what was sent: a confirmation line, or the payload in a
/// structured format.
fn report(result: &CommandResult, global: &GlobalOpts, message: &str) -> Result<(), CliError> {
    if global.quiet {
        return Ok(());
    }
    let out = output::render_single(
        &global.output,
        result.sent.as_slice(),
        |sent| {
            let codes: Vec<String> = sent
                .iter()
                .map(|c| format!("{}={}", c.code, c.value))
                .collect();
            format!("{message} on {} ({})", result.device.id, codes.join(", "))
        },
        |sent| {
            sent.iter()
                .map(|c| c.code.clone())
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&out, false);
    Ok(())
}
