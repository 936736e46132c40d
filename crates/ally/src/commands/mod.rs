//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod util;
pub mod watch;

use ally_core::Connector;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a connector-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    connector: &Connector,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(connector, args, global).await,
        Command::SetTemp(args) => control::set_temp(connector, args, global).await,
        Command::SetMode(args) => control::set_mode(connector, args, global).await,
        Command::Switch(args) => control::switch(connector, args, global).await,
        Command::Scaling(args) => control::scaling(connector, args, global).await,
        Command::Raw(args) => control::raw(connector, args, global).await,
        Command::Watch(_) => watch::handle(connector, global).await,
        // Config and Completions are handled before a connector exists
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
