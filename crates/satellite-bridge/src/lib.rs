//! satellite-bridge library crate.
//!
//! Connects to a satellite host over TCP, registers the configured virtual
//! button grids with it, and keeps their per-key visual state mirrored into
//! the surface hub.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! config.toml ─► storage ─► BridgeConfig
//!                              │
//!                              ▼
//!   BridgeHandle ──cmd──► BridgeDriver (tokio task, owns socket + timers)
//!                              │ SocketEvent        ▲ IoAction
//!                              ▼                    │
//!                         SatelliteBridge (sans-I/O state machine)
//!                          ├─ ConnectionMachine
//!                          ├─ DeviceRegistry
//!                          ├─ SurfaceSink ──► surface-hub
//!                          └─ PresentationSink ──► mpsc channel
//! ```
//!
//! - `domain/`          Bridge configuration, status DTO, socket events and I/O actions
//! - `application/`     Device registry, connection state machine, protocol bridge
//! - `infrastructure/`  Tokio driver, surface/presentation adapters, TOML storage
//!
//! # Layer rules
//!
//! `domain` and `application` never touch sockets or timers; everything
//! they decide is expressed as [`domain::IoAction`] values which the
//! infrastructure driver carries out.  This keeps the state machine fully
//! testable by feeding it synthetic [`domain::SocketEvent`]s.

pub mod application;
pub mod domain;
pub mod infrastructure;
