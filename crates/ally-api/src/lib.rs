// ally-api: Async Rust client for the Danfoss Ally cloud API

pub mod auth;
pub mod client;
mod devices;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::{Credentials, Token, TokenManager, basic_authorization};
pub use client::AllyClient;
pub use error::Error;
pub use models::{CommandPayload, RawDevice, RawStatus};
pub use transport::TransportConfig;
