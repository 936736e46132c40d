//! Clap derive structures for the `ally` CLI.
//!
//! Defines the command tree, global flags, and shared value types.

use clap::{Args, Parser, Subcommand, ValueEnum};

use ally_core::{AuxSwitch, HeatingControlScaling, OperatingMode, SetpointKey};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ally -- control Danfoss Ally radiator thermostats from the command line
#[derive(Debug, Parser)]
#[command(
    name = "ally",
    version,
    about = "Control Danfoss Ally radiator thermostats from the command line",
    long_about = "Reads and writes Danfoss Ally thermostats through the Ally cloud API.\n\n\
        Credentials come from a config profile, the system keyring, or the\n\
        --key / --secret flags.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "ALLY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API key (overrides profile)
    #[arg(long, env = "ALLY_KEY", global = true, hide_env = true)]
    pub key: Option<String>,

    /// API secret (overrides profile and keyring)
    #[arg(long, env = "ALLY_SECRET", global = true, hide_env_values = true)]
    pub secret: Option<String>,

    /// Cloud base URL (overrides profile)
    #[arg(long, env = "ALLY_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ALLY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, env = "ALLY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

impl OnOff {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect thermostats
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Set a target temperature in °C
    SetTemp(SetTempArgs),

    /// Change the operating mode
    SetMode(SetModeArgs),

    /// Turn an auxiliary switch on or off
    Switch(SwitchArgs),

    /// Set heating control scaling (quick, moderate, slow)
    Scaling(ScalingArgs),

    /// Send raw status codes (values in wire units)
    Raw(RawArgs),

    /// Poll continuously and print every update
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List every device on the account
    #[command(alias = "ls")]
    List,

    /// Show one device
    Get {
        /// Device ID or name
        device: String,
    },

    /// Show the sensors, switches and selects a device exposes
    #[command(alias = "caps")]
    Capabilities {
        /// Device ID or name
        device: String,
    },

    /// Re-read one device from the cloud
    Refresh {
        /// Device ID or name
        device: String,
    },
}

// ── Writes ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetTempArgs {
    /// Device ID or name
    pub device: String,

    /// Target temperature in °C
    pub celsius: f64,

    /// Setpoint to write (defaults to the one the current mode follows)
    #[arg(long, short = 's')]
    pub setpoint: Option<SetpointKey>,
}

#[derive(Debug, Args)]
pub struct SetModeArgs {
    /// Device ID or name
    pub device: String,

    /// at_home, leaving_home, pause, manual, holiday, ...
    pub mode: OperatingMode,
}

#[derive(Debug, Args)]
pub struct SwitchArgs {
    /// Device ID or name
    pub device: String,

    /// window-detection, pre-heat, load-balance, radiator-covered, heat-available
    pub switch: AuxSwitch,

    pub state: OnOff,
}

#[derive(Debug, Args)]
pub struct ScalingArgs {
    /// Device ID or name
    pub device: String,

    /// quick, moderate or slow
    pub option: HeatingControlScaling,
}

#[derive(Debug, Args)]
pub struct RawArgs {
    /// Device ID or name
    pub device: String,

    /// One or more `code=value` pairs; values are parsed as JSON, falling
    /// back to a plain string
    #[arg(required = true, value_name = "CODE=VALUE")]
    pub commands: Vec<String>,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval in seconds (overrides profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration with secrets masked
    Show,

    /// Print the config file location
    Path,

    /// Add or update a profile's key and settings
    SetProfile {
        /// Profile name
        name: String,

        /// API key
        #[arg(long)]
        key: Option<String>,

        /// Cloud base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Environment variable holding the secret
        #[arg(long)]
        secret_env: Option<String>,

        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// Store the active profile's API secret in the system keyring
    SetSecret {
        /// Read the secret from stdin instead of prompting
        #[arg(long)]
        stdin: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
