//! Connector runtime between `ally-api` and hosts (CLI, home automation
//! bridges).
//!
//! - **[`Connector`]**: lifecycle facade. [`connect()`](Connector::connect)
//!   authenticates, runs the initial poll, then spawns the periodic poll task
//!   and the command processor. [`Connector::oneshot()`](Connector::oneshot)
//!   runs a single operation without background polling.
//!
//! - **[`DeviceStore`]**: the shared device map built on `EntityCollection`
//!   (`DashMap` plus `tokio::sync::watch`). Written only by poll completion and
//!   by optimistic command updates.
//!
//! - **[`DeviceStream`]**: subscription handle with `current()` / `latest()` /
//!   `changed()` for reactive hosts.
//!
//! - **[`Command`]**: typed writes routed through an `mpsc` channel to the
//!   [`CommandDispatcher`]. Reads go straight to the store.
//!
//! - **Domain model** ([`model`]): normalized [`Device`] records plus pure
//!   derivations (setpoint resolution, `ctrl_alg` masking, capability table).

pub mod backend;
pub mod command;
pub mod config;
pub mod connector;
pub mod convert;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;
mod sync;

#[cfg(test)]
mod test_support;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backend::AllyBackend;
pub use command::{Command, CommandDispatcher, CommandResult, celsius_to_tenths};
pub use config::{ConnectorConfig, SyncTuning};
pub use connector::{ConnectionState, Connector};
pub use error::{CoreError, SetupDisposition};
pub use store::DeviceStore;
pub use stream::{DeviceSnapshot, DeviceStream};
pub use sync::RefreshOutcome;

pub use model::{
    AdaptationRunStatus, AttrValue, AuxSwitch, BinarySensorKind, Capabilities, ClimateView, Device,
    DeviceId, HeatingControlScaling, HvacMode, OperatingMode, Preset, SensorKind, SetpointKey,
    Setpoints,
};

// The wire types hosts need to build raw commands.
pub use ally_api::{CommandPayload, Credentials};
