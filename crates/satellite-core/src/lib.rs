//! # satellite-core
//!
//! Shared library for the satellite bridge containing the line protocol
//! codec, the device descriptor model, and the key visual state types.
//!
//! This crate has zero dependencies on sockets, timers, or async runtimes.
//! Everything in it can be driven from a unit test with plain strings.
//!
//! # Architecture overview (for beginners)
//!
//! A *satellite host* is a remote control-surface server.  The bridge
//! connects to it over TCP and registers a number of virtual button grids
//! ("devices").  The host then pushes per-key visual updates (text, colours,
//! bitmaps) and the bridge pushes key presses back.
//!
//! This crate defines:
//!
//! - **`protocol`** – How bytes travel over the wire.  The stream is split
//!   into newline-terminated lines, each line is parsed into a verb plus a
//!   parameter map, and outgoing commands are rendered back into the same
//!   text grammar.
//!
//! - **`domain`** – Pure data with no I/O: device descriptors (with lenient
//!   clamping of configuration values), key addressing, and the mergeable
//!   key visual state including image MIME sniffing.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `satellite_core::DeviceDescriptor` instead of the full module path.
pub use domain::device::{
    clamp_int, load_descriptors, DescriptorError, DeviceDescriptor, LooseValue, RawDeviceConfig,
};
pub use domain::key::{KeyImage, KeyPos, KeyVisualState};
pub use protocol::command::{Command, CommandBuilder, ParamValue, Params};
pub use protocol::framing::LineSplitter;
pub use protocol::messages::{KeyStateUpdate, PeerAnnouncement, SatelliteMessage};
