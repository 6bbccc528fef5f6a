//! Runtime settings for the subscriber endpoint.

use std::net::{Ipv4Addr, SocketAddr};

/// Default WebSocket port for real-time subscribers.
pub const DEFAULT_HUB_PORT: u16 = 16623;

/// Broadcast buffer depth; a subscriber further behind than this is resynced
/// with a fresh snapshot.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Settings for the WebSocket fan-out server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub bind_addr: SocketAddr,
    pub event_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_HUB_PORT)),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
