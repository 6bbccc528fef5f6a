//! Bridge configuration types.
//!
//! [`BridgeConfig`] is what the bridge is constructed and reloaded from.  It
//! holds already-validated [`DeviceDescriptor`]s; reading and repairing the
//! on-disk file is the storage layer's job.

use satellite_core::DeviceDescriptor;

/// Default satellite host address.
pub const DEFAULT_COMPANION_HOST: &str = "127.0.0.1";

/// Default satellite host TCP port.
pub const DEFAULT_COMPANION_PORT: u16 = 16622;

/// Everything the protocol bridge needs to know about its peer and devices.
///
/// # Example
///
/// ```rust
/// use satellite_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.companion_addr(), "127.0.0.1:16622");
/// assert!(cfg.devices.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub companion_host: String,
    pub companion_port: u16,
    /// Validated, unique descriptors in configuration order.
    pub devices: Vec<DeviceDescriptor>,
}

impl BridgeConfig {
    /// `host:port` as shown to surface subscribers.
    pub fn companion_addr(&self) -> String {
        format!("{}:{}", self.companion_host, self.companion_port)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            companion_host: DEFAULT_COMPANION_HOST.to_string(),
            companion_port: DEFAULT_COMPANION_PORT,
            devices: Vec::new(),
        }
    }
}
