//! TOML-based configuration persistence for the satellite bridge.
//!
//! Reads and writes [`AppConfig`] to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\SatelliteBridge\config.toml`
//! - Linux:    `~/.config/satellite-bridge/config.toml`
//! - macOS:    `~/Library/Application Support/SatelliteBridge/config.toml`
//!
//! ```toml
//! [satellite]
//! companion_host = "127.0.0.1"
//! companion_port = 16622
//!
//! [[devices]]
//! id = "dev1"
//! columns = 8
//! rows = 4
//! ```
//!
//! Every section and field is optional.  Device entries are read loosely
//! (`columns = "8"` works) and repaired later by
//! [`satellite_core::load_descriptors`]; only a file that is not valid TOML
//! at all is an error.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use satellite_core::{load_descriptors, RawDeviceConfig};
use serde::{Deserialize, Serialize};
use surface_hub::domain::config::{DEFAULT_EVENT_CAPACITY, DEFAULT_HUB_PORT};
use surface_hub::HubConfig;
use thiserror::Error;

use crate::domain::config::{DEFAULT_COMPANION_HOST, DEFAULT_COMPANION_PORT};
use crate::domain::BridgeConfig;
use crate::infrastructure::network::DriverSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `[hub] bind_address` is not an IP address.
    #[error("invalid hub bind address '{0}'")]
    InvalidBindAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub satellite: SatelliteSection,
    pub hub: HubSection,
    pub logging: LoggingSection,
    pub devices: Vec<RawDeviceConfig>,
}

/// Where the satellite host lives and how the connection is paced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SatelliteSection {
    #[serde(alias = "companionHost")]
    pub companion_host: String,
    #[serde(alias = "companionPort")]
    pub companion_port: u16,
    /// Seconds between keep-alive `PING`s; `0` disables them.
    pub keepalive_secs: u64,
    pub connect_timeout_secs: u64,
}

/// WebSocket subscriber endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HubSection {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
    pub event_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for SatelliteSection {
    fn default() -> Self {
        Self {
            companion_host: DEFAULT_COMPANION_HOST.to_string(),
            companion_port: DEFAULT_COMPANION_PORT,
            keepalive_secs: 5,
            connect_timeout_secs: 5,
        }
    }
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_HUB_PORT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Peer address plus the validated device list.
    ///
    /// Entries that cannot be repaired are dropped with a warning.
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            companion_host: self.satellite.companion_host.trim().to_string(),
            companion_port: self.satellite.companion_port,
            devices: load_descriptors(&self.devices),
        }
    }

    pub fn driver_settings(&self) -> DriverSettings {
        DriverSettings {
            keepalive: (self.satellite.keepalive_secs > 0)
                .then(|| Duration::from_secs(self.satellite.keepalive_secs)),
            connect_timeout: Duration::from_secs(self.satellite.connect_timeout_secs.max(1)),
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `bind_address` is not
    /// an IP address.
    pub fn hub_config(&self) -> Result<HubConfig, ConfigError> {
        let ip: IpAddr = self
            .hub
            .bind_address
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.hub.bind_address.clone()))?;
        Ok(HubConfig {
            bind_addr: SocketAddr::new(ip, self.hub.port),
            event_capacity: self.hub.event_capacity.max(1),
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the platform config file.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to the platform config file.
///
/// # Errors
///
/// See [`save_config_to`].
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(&config_file_path()?, config)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("SatelliteBridge"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("satellite-bridge"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("SatelliteBridge")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
