//! Domain layer for satellite-bridge.
//!
//! - [`config`] – the in-memory [`BridgeConfig`] the bridge is (re)loaded from.
//! - [`events`] – [`SocketEvent`] inputs and [`IoAction`] outputs of the state machine.
//! - [`status`] – the [`BridgeStatus`] snapshot exposed to the shell.

pub mod config;
pub mod events;
pub mod status;

pub use config::BridgeConfig;
pub use events::{IoAction, SocketEvent};
pub use status::BridgeStatus;
