//! surface-hub library crate.
//!
//! Holds every live control surface (satellite devices and any other
//! registration source) in memory and fans their state out to real-time
//! subscribers.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! SatelliteBridge ──┐                      ┌──► subscriber (JSON over WebSocket)
//!                   ├──► SurfaceHub ──bcast┼──► subscriber
//! WebSocket client ─┘   (registry)         └──► ...
//! ```
//!
//! - `domain/`         Surface ids, surfaces, snapshot and JSON message types
//! - `application/`    [`SurfaceRegistry`] and the shared [`SurfaceHub`] handle
//! - `infrastructure/` WebSocket accept loop (tokio-tungstenite)
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` only touches a `tokio::sync::broadcast` sender, which is
//!   synchronous to send on.
//! - `infrastructure` owns sockets and tasks.
//!
//! Surfaces live exactly as long as the connection that registered them:
//! nothing is persisted and there is no grace period after a disconnect.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{SurfaceHub, SurfaceRegistry};
pub use domain::{
    ClientMsg, HubConfig, HubEvent, OwnerId, Surface, SurfaceError, SurfaceId, SurfaceInfo,
    SurfaceSnapshot,
};
