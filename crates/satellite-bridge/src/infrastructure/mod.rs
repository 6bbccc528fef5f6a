//! Infrastructure layer: everything that touches sockets, tasks or files.
//!
//! - [`network`] – the tokio driver that owns the satellite socket and timers.
//! - [`surface_adapter`] – mirrors registered devices into the surface hub.
//! - [`presentation`] – publishes presentation events on a channel.
//! - [`storage`] – TOML configuration file.

pub mod network;
pub mod presentation;
pub mod storage;
pub mod surface_adapter;

pub use network::{spawn_bridge, BridgeCommand, BridgeDriver, BridgeError, BridgeHandle, DriverSettings};
pub use presentation::{ChannelPresenter, PresentationEvent};
pub use surface_adapter::HubSurfaces;
