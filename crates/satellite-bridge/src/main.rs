//! Satellite bridge: entry point.
//!
//! Connects to a satellite host, registers the configured virtual button
//! grids, and mirrors their key state into the surface hub, whose WebSocket
//! endpoint serves real-time subscribers such as a dashboard.
//!
//! # Usage
//!
//! ```text
//! satellite-bridge [OPTIONS]
//!
//! Options:
//!   --config <PATH>          Configuration file [default: platform config dir]
//!   --companion-host <HOST>  Override [satellite] companion_host
//!   --companion-port <PORT>  Override [satellite] companion_port
//!   --hub-bind <IP>          Override [hub] bind_address
//!   --hub-port <PORT>        Override [hub] port
//!   --no-hub                 Do not start the WebSocket endpoint
//! ```
//!
//! Every option can also be set through the environment variable listed in
//! `--help` (`SATELLITE_*`).  Command-line values win over the environment,
//! which wins over the configuration file.
//!
//! # Signals
//!
//! - `Ctrl+C` disconnects from the satellite host and stops.
//! - `SIGHUP` (Unix) re-reads the configuration file and applies the peer
//!   address and device list without restarting.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use satellite_bridge::infrastructure::presentation::{self, PresentationEvent};
use satellite_bridge::infrastructure::storage::config::{config_file_path, load_config_from, AppConfig};
use satellite_bridge::infrastructure::{spawn_bridge, HubSurfaces};
#[cfg(unix)]
use satellite_bridge::infrastructure::BridgeHandle;
use surface_hub::infrastructure::run_server;
use surface_hub::SurfaceHub;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Satellite surface bridge.
///
/// Options left unset fall back to the configuration file.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "satellite-bridge",
    about = "Registers virtual button grids with a satellite host and fans out their key state",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "SATELLITE_CONFIG")]
    config: Option<PathBuf>,

    /// Hostname or IP address of the satellite host.
    #[arg(long, env = "SATELLITE_COMPANION_HOST")]
    companion_host: Option<String>,

    /// TCP port of the satellite host.
    #[arg(long, env = "SATELLITE_COMPANION_PORT")]
    companion_port: Option<u16>,

    /// IP address the WebSocket endpoint binds to.
    #[arg(long, env = "SATELLITE_HUB_BIND")]
    hub_bind: Option<String>,

    /// TCP port of the WebSocket endpoint.
    #[arg(long, env = "SATELLITE_HUB_PORT")]
    hub_port: Option<u16>,

    /// Do not start the WebSocket endpoint.
    #[arg(long, env = "SATELLITE_NO_HUB")]
    no_hub: bool,
}

impl Cli {
    /// Reads the configuration file and layers the command-line overrides on
    /// top.  A missing file yields the defaults.
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => config_file_path().context("no --config given and no platform config dir")?,
        };
        let mut config = load_config_from(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(host) = &self.companion_host {
            config.satellite.companion_host = host.clone();
        }
        if let Some(port) = self.companion_port {
            config.satellite.companion_port = port;
        }
        if let Some(bind) = &self.hub_bind {
            config.hub.bind_address = bind.clone();
        }
        if let Some(port) = self.hub_port {
            config.hub.port = port;
        }
        if self.no_hub {
            config.hub.enabled = false;
        }
    }
}

/// `RUST_LOG` wins; otherwise the configured level; otherwise `info`.
fn log_filter(configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&config.logging.level))
        .init();

    let bridge_config = config.bridge_config();
    info!(
        "satellite bridge starting: host={}, devices={}",
        bridge_config.companion_addr(),
        bridge_config.devices.len()
    );

    // ── Surface hub ───────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let hub_config = config.hub_config()?;
    let hub = SurfaceHub::new(hub_config.event_capacity);
    if config.hub.enabled {
        let hub = hub.clone();
        let running = Arc::clone(&running);
        tokio::spawn(async move {
            if let Err(e) = run_server(hub_config, hub, running).await {
                error!("surface hub stopped: {e:#}");
            }
        });
    } else {
        info!("surface hub endpoint disabled");
    }

    // ── Presentation events ───────────────────────────────────────────────────
    let (presenter, mut presentation_rx) = presentation::channel();
    tokio::spawn(async move {
        while let Some(event) = presentation_rx.recv().await {
            match &event {
                PresentationEvent::Open(device) => {
                    debug!("presentation open: {} ({}×{})", device.id, device.columns, device.rows)
                }
                PresentationEvent::Close { device_id } => debug!("presentation close: {device_id}"),
                PresentationEvent::Draw { device_id, pos, .. } => {
                    debug!("presentation draw: {device_id} ({}, {})", pos.x, pos.y)
                }
                PresentationEvent::Clear { device_id } => debug!("presentation clear: {device_id}"),
            }
        }
    });

    // ── Satellite driver ──────────────────────────────────────────────────────
    let (handle, driver) = spawn_bridge(
        bridge_config,
        config.driver_settings(),
        Arc::new(HubSurfaces::new(hub.clone())),
        Arc::new(presenter),
    );

    #[cfg(unix)]
    spawn_reload_on_sighup(cli.clone(), handle.clone());

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C; shutting down"),
        Err(e) => warn!("failed to listen for Ctrl+C: {e}; shutting down"),
    }

    running.store(false, Ordering::Relaxed);
    if handle.shutdown().await.is_err() {
        debug!("satellite driver already stopped");
    }
    driver.await.context("satellite driver task panicked")?;

    info!("satellite bridge stopped");
    Ok(())
}

#[cfg(unix)]
fn spawn_reload_on_sighup(cli: Cli, handle: BridgeHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("SIGHUP reload unavailable: {e}");
                return;
            }
        };
        while hangups.recv().await.is_some() {
            info!("SIGHUP received; reloading configuration");
            let config = match cli.load_config() {
                Ok(config) => config,
                Err(e) => {
                    warn!("configuration reload failed: {e:#}");
                    continue;
                }
            };
            if handle.reload(config.bridge_config()).await.is_err() {
                break;
            }
        }
    });
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_leave_everything_to_config_file() {
        // Arrange / Act
        let cli = Cli::parse_from(["satellite-bridge"]);

        // Assert
        assert!(cli.config.is_none());
        assert!(cli.companion_host.is_none());
        assert!(cli.companion_port.is_none());
        assert!(!cli.no_hub);
    }

    #[test]
    fn test_cli_config_path() {
        let cli = Cli::parse_from(["satellite-bridge", "--config", "/tmp/sat.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sat.toml")));
    }

    #[test]
    fn test_cli_companion_overrides_apply_to_config() {
        // Arrange
        let cli = Cli::parse_from([
            "satellite-bridge",
            "--companion-host",
            "10.0.0.5",
            "--companion-port",
            "17000",
        ]);
        let mut config = AppConfig::default();

        // Act
        cli.apply_overrides(&mut config);

        // Assert
        assert_eq!(config.bridge_config().companion_addr(), "10.0.0.5:17000");
    }

    #[test]
    fn test_cli_hub_overrides_apply_to_config() {
        let cli = Cli::parse_from(["satellite-bridge", "--hub-bind", "0.0.0.0", "--hub-port", "9100"]);
        let mut config = AppConfig::default();

        cli.apply_overrides(&mut config);

        assert_eq!(config.hub_config().unwrap().bind_addr.to_string(), "0.0.0.0:9100");
        assert!(config.hub.enabled);
    }

    #[test]
    fn test_cli_no_hub_disables_endpoint() {
        let cli = Cli::parse_from(["satellite-bridge", "--no-hub"]);
        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);
        assert!(!config.hub.enabled);
    }

    #[test]
    fn test_cli_without_overrides_keeps_file_values() {
        let cli = Cli::parse_from(["satellite-bridge"]);
        let mut config = AppConfig::default();
        config.satellite.companion_port = 12345;

        cli.apply_overrides(&mut config);

        assert_eq!(config.satellite.companion_port, 12345);
    }

    #[test]
    fn test_cli_invalid_port_is_rejected() {
        let result = Cli::try_parse_from(["satellite-bridge", "--companion-port", "70000"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_missing_file_uses_defaults_plus_overrides() {
        let missing = std::env::temp_dir().join(format!("satellite_cli_{}.toml", uuid::Uuid::new_v4()));
        let cli = Cli::parse_from([
            "satellite-bridge".to_string(),
            "--config".to_string(),
            missing.display().to_string(),
            "--no-hub".to_string(),
        ]);

        let config = cli.load_config().unwrap();

        assert!(config.devices.is_empty());
        assert!(!config.hub.enabled);
    }
}
