//! Application layer: the sans-I/O protocol bridge and its building blocks.

pub mod bridge;
pub mod connection;
pub mod device_registry;

pub use bridge::{PresentationSink, SatelliteBridge, SurfaceSink, PRODUCT_NAME, RECONNECT_DELAY};
pub use connection::{ConnectionMachine, ConnectionState};
pub use device_registry::{AckOutcome, DeviceRegistry, HandshakeStatus};
