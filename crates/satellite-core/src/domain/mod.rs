//! Domain entities for the satellite bridge.
//!
//! This module is the "business logic" layer.  It has **no** dependencies on
//! network sockets, async runtimes, or the wire grammar.
//!
//! # Sub-modules
//!
//! - [`device`] – [`DeviceDescriptor`] plus the lenient loader that clamps or
//!   defaults malformed configuration values instead of rejecting them.
//! - [`key`] – Key coordinates, the mergeable [`KeyVisualState`], image MIME
//!   sniffing, and the conversion between `(x, y)` and flat key indexes.

pub mod device;
pub mod key;

pub use device::{clamp_int, load_descriptors, DescriptorError, DeviceDescriptor, LooseValue, RawDeviceConfig};
pub use key::{KeyImage, KeyPos, KeyVisualState};
