//! SatelliteBridge: the protocol bridge on top of one satellite connection.
//!
//! The bridge is a synchronous state machine.  Socket and timer activity
//! arrive as [`SocketEvent`]s; everything the bridge wants done to the
//! socket or timers comes back as an ordered list of [`IoAction`]s.  Per-key
//! state leaves through two injected sinks:
//!
//! - [`SurfaceSink`] mirrors registered devices into the surface registry.
//! - [`PresentationSink`] feeds the per-device presentation consumer, but
//!   only for devices whose presentation is currently open.
//!
//! # Incoming lines
//!
//! | Verb         | Effect                                                  |
//! |--------------|---------------------------------------------------------|
//! | `PING`       | `PONG` with the same body                               |
//! | `PONG`       | nothing                                                 |
//! | `BEGIN`      | record peer, become `Active`, register devices          |
//! | `ADD-DEVICE` | ack: `pending → registered`, or drop from `pending`     |
//! | `KEYS-CLEAR` | clear the device's key cache                            |
//! | `KEY-STATE`  | merge one key's visual state                            |
//! | other        | ignored                                                 |

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use satellite_core::protocol::messages;
use satellite_core::{DeviceDescriptor, KeyPos, KeyVisualState, LineSplitter, PeerAnnouncement, SatelliteMessage};
use tracing::{debug, info, warn};

use crate::application::connection::{ConnectionMachine, ConnectionState};
use crate::application::device_registry::{AckOutcome, Departed, DeviceRegistry, HandshakeStatus};
use crate::domain::{BridgeConfig, BridgeStatus, IoAction, SocketEvent};

/// Product label sent in every `ADD-DEVICE` and shown on mirrored surfaces.
pub const PRODUCT_NAME: &str = "Satellite Virtual Surface";

/// Fixed delay between losing the connection and the next attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1000);

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Destination for the state of registered devices.
///
/// The production implementation writes into the surface hub; tests record
/// calls.  Implementations must not fail: problems are logged and dropped.
#[cfg_attr(test, mockall::automock)]
pub trait SurfaceSink: Send + Sync {
    /// A device finished registration with the peer.
    fn register(&self, device: &DeviceDescriptor, product: &str, host: &str);

    /// The device's registration ended (disconnect, reload, rejection).
    fn remove(&self, device_id: &str);

    /// Merge `state` into the key at `pos`.
    fn draw(&self, device_id: &str, pos: KeyPos, state: &KeyVisualState);

    /// Empty the device's key cache.
    fn clear(&self, device_id: &str);

    /// A local press or release, for other subscribers to see.
    fn key(&self, device_id: &str, pos: KeyPos, pressed: bool);
}

/// Per-device presentation consumer (a window, a dashboard panel).
#[cfg_attr(test, mockall::automock)]
pub trait PresentationSink: Send + Sync {
    fn open(&self, device: &DeviceDescriptor);
    fn close(&self, device_id: &str);
    fn draw(&self, device_id: &str, pos: KeyPos, state: &KeyVisualState);
    fn clear(&self, device_id: &str);
}

// ── Bridge ────────────────────────────────────────────────────────────────────

pub struct SatelliteBridge {
    companion_host: String,
    companion_port: u16,
    devices: DeviceRegistry,
    connection: ConnectionMachine,
    splitter: LineSplitter,
    /// Devices whose presentation is open.
    presenting: BTreeSet<String>,
    surfaces: Arc<dyn SurfaceSink>,
    presentation: Arc<dyn PresentationSink>,
    /// Token of the last keep-alive `PING`.
    ping_seq: u64,
}

impl SatelliteBridge {
    /// Creates an idle bridge.  Call [`start`](Self::start) to connect.
    pub fn new(
        config: BridgeConfig,
        surfaces: Arc<dyn SurfaceSink>,
        presentation: Arc<dyn PresentationSink>,
    ) -> Self {
        Self {
            companion_host: config.companion_host,
            companion_port: config.companion_port,
            devices: DeviceRegistry::new(config.devices),
            connection: ConnectionMachine::new(),
            splitter: LineSplitter::new(),
            presenting: BTreeSet::new(),
            surfaces,
            presentation,
            ping_seq: 0,
        }
    }

    /// Opens the first connection if any device is configured.
    pub fn start(&mut self) -> Vec<IoAction> {
        if self.devices.is_empty() {
            info!("no devices configured; satellite bridge stays idle");
            return Vec::new();
        }
        if self.connection.state().is_live() || self.connection.reconnect_pending() {
            return Vec::new();
        }
        self.connect()
    }

    /// Feeds one socket or timer event through the state machine.
    pub fn handle(&mut self, event: SocketEvent) -> Vec<IoAction> {
        match event {
            SocketEvent::Connected => {
                if self.connection.on_socket_open() {
                    info!(
                        "connected to satellite host {}; awaiting announcement",
                        self.companion_addr()
                    );
                } else {
                    debug!("ignoring stale connect completion");
                }
                Vec::new()
            }
            SocketEvent::Data(bytes) => self.on_data(&bytes),
            SocketEvent::Error(reason) => {
                if self.connection.state().is_live() {
                    warn!("satellite connection to {} failed: {reason}", self.companion_addr());
                }
                self.on_lost()
            }
            SocketEvent::Closed => {
                if self.connection.state().is_live() {
                    info!("satellite host {} closed the connection", self.companion_addr());
                }
                self.on_lost()
            }
            SocketEvent::ReconnectTimerFired => {
                if !self.connection.disarm_reconnect() {
                    return Vec::new();
                }
                if self.devices.is_empty() || self.connection.state().is_live() {
                    return Vec::new();
                }
                self.connect()
            }
            SocketEvent::KeepaliveTick => {
                if self.connection.state() != ConnectionState::Active {
                    return Vec::new();
                }
                self.ping_seq += 1;
                vec![IoAction::Send(messages::ping(&self.ping_seq.to_string()))]
            }
        }
    }

    /// Sends `ADD-DEVICE` for every device that is neither pending nor
    /// registered.  Only acts while `Active`; calling it again before any
    /// acknowledgment sends nothing new.
    pub fn register_devices(&mut self) -> Vec<IoAction> {
        if self.connection.state() != ConnectionState::Active {
            return Vec::new();
        }
        let mut actions = Vec::new();
        for id in self.devices.unregistered_ids() {
            if !self.devices.begin_registration(&id) {
                continue;
            }
            if let Some(device) = self.devices.get(&id) {
                debug!("registering device {id} ({}×{})", device.columns, device.rows);
                actions.push(IoAction::Send(messages::add_device(device, PRODUCT_NAME)));
            }
        }
        actions
    }

    /// Applies a new configuration.
    ///
    /// Dropped or changed devices are unregistered from the peer (when the
    /// socket is open), removed from the surface sink and have their
    /// presentation closed.  Zero devices disconnects for good; a changed
    /// peer address reconnects immediately.
    pub fn reload_from_config(&mut self, config: BridgeConfig) -> Vec<IoAction> {
        let address_changed = config.companion_host != self.companion_host
            || config.companion_port != self.companion_port;
        self.companion_host = config.companion_host;
        self.companion_port = config.companion_port;

        let state = self.connection.state();
        let socket_open = matches!(
            state,
            ConnectionState::AwaitingHandshake | ConnectionState::Active
        );

        let mut actions = Vec::new();
        for Departed { descriptor, status } in self.devices.replace(config.devices) {
            let id = descriptor.id;
            if socket_open && status != HandshakeStatus::Unregistered {
                actions.push(IoAction::Send(messages::remove_device(&id)));
            }
            if status == HandshakeStatus::Registered {
                self.surfaces.remove(&id);
            }
            if self.presenting.remove(&id) {
                self.presentation.close(&id);
            }
            debug!("device {id} left the configuration");
        }
        info!("configuration reloaded: {} device(s)", self.devices.len());

        if self.devices.is_empty() {
            actions.extend(self.disconnect());
            return actions;
        }

        if address_changed && state.is_live() {
            info!("satellite host changed to {}; reconnecting", self.companion_addr());
            actions.extend(self.teardown());
            actions.extend(self.connect());
            return actions;
        }

        match state {
            ConnectionState::Disconnected if !self.connection.reconnect_pending() => {
                actions.extend(self.connect());
            }
            ConnectionState::Active => actions.extend(self.register_devices()),
            _ => {}
        }
        actions
    }

    /// Drops the connection and schedules one reconnect attempt.
    ///
    /// Does nothing when no device is configured or a reconnect is already
    /// scheduled.
    pub fn reconnect(&mut self) -> Vec<IoAction> {
        if self.devices.is_empty() || self.connection.reconnect_pending() {
            return Vec::new();
        }
        let mut actions = self.teardown();
        self.connection.arm_reconnect();
        actions.push(IoAction::ScheduleReconnect(RECONNECT_DELAY));
        actions
    }

    /// Cancels any pending reconnect and drops the connection.  Never
    /// schedules a new attempt.
    pub fn disconnect(&mut self) -> Vec<IoAction> {
        let mut actions = Vec::new();
        if self.connection.disarm_reconnect() {
            actions.push(IoAction::CancelReconnect);
        }
        let torn_down = self.teardown();
        if !torn_down.is_empty() {
            info!("disconnected from satellite host {}", self.companion_addr());
        }
        actions.extend(torn_down);
        actions
    }

    /// A local key press or release at `(x, y)` on `device_id`.
    ///
    /// The position is clamped into the grid.  Other surface subscribers are
    /// notified immediately; `KEY-PRESS` goes out only while `Active`.
    pub fn key_press(&mut self, device_id: &str, x: i64, y: i64, pressed: bool) -> Vec<IoAction> {
        let Some(device) = self.devices.get(device_id) else {
            debug!("key press for unknown device {device_id:?} dropped");
            return Vec::new();
        };
        if device.disable_button_presses {
            debug!("button presses disabled on {device_id}; dropped");
            return Vec::new();
        }

        let pos = KeyPos::clamped(x, y, device.columns, device.rows);
        self.surfaces.key(&device.id, pos, pressed);

        if self.connection.state() != ConnectionState::Active {
            debug!("not connected; key press on {device_id} not sent");
            return Vec::new();
        }
        vec![IoAction::Send(messages::key_press(
            &device.id,
            pos.index(device.columns),
            pressed,
        ))]
    }

    /// Starts forwarding `device_id`'s key updates to the presentation sink.
    ///
    /// Returns the descriptor, or `None` for an unknown device.
    pub fn open_presentation(&mut self, device_id: &str) -> Option<DeviceDescriptor> {
        let device = self.devices.get(device_id)?.clone();
        if self.presenting.insert(device.id.clone()) {
            self.presentation.open(&device);
        }
        Some(device)
    }

    /// Stops forwarding.  Returns `false` if it was not open.
    pub fn close_presentation(&mut self, device_id: &str) -> bool {
        if !self.presenting.remove(device_id) {
            return false;
        }
        self.presentation.close(device_id);
        true
    }

    pub fn status(&self) -> BridgeStatus {
        let state = self.connection.state();
        BridgeStatus {
            connected: state == ConnectionState::Active,
            connecting: matches!(
                state,
                ConnectionState::Connecting | ConnectionState::AwaitingHandshake
            ),
            peer_version: self
                .connection
                .peer()
                .and_then(PeerAnnouncement::version)
                .map(str::to_string),
            device_count: self.devices.len(),
            registered_count: self.devices.registered_count(),
        }
    }

    pub fn device(&self, device_id: &str) -> Option<&DeviceDescriptor> {
        self.devices.get(device_id)
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.connection.reconnect_pending()
    }

    pub fn companion_addr(&self) -> String {
        format!("{}:{}", self.companion_host, self.companion_port)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn connect(&mut self) -> Vec<IoAction> {
        self.connection.start_connect();
        self.devices.clear_handshake();
        self.splitter.clear();
        info!("connecting to satellite host {}", self.companion_addr());
        vec![IoAction::Connect {
            host: self.companion_host.clone(),
            port: self.companion_port,
        }]
    }

    /// Connection lost underneath us: tear down and maybe schedule a retry.
    fn on_lost(&mut self) -> Vec<IoAction> {
        let mut actions = self.teardown();
        if actions.is_empty() {
            return actions;
        }
        if !self.devices.is_empty() && self.connection.arm_reconnect() {
            debug!("reconnecting in {} ms", RECONNECT_DELAY.as_millis());
            actions.push(IoAction::ScheduleReconnect(RECONNECT_DELAY));
        }
        actions
    }

    /// Live → `Disconnected`, forgetting all connection-scoped state.
    fn teardown(&mut self) -> Vec<IoAction> {
        if !self.connection.on_lost() {
            return Vec::new();
        }
        for id in self.devices.registered_ids() {
            self.surfaces.remove(&id);
        }
        self.devices.clear_handshake();
        self.splitter.clear();
        vec![IoAction::Close]
    }

    fn on_data(&mut self, bytes: &[u8]) -> Vec<IoAction> {
        if !self.connection.state().is_live() {
            debug!("dropping {} byte(s) received while disconnected", bytes.len());
            return Vec::new();
        }
        self.splitter.push(bytes);
        let mut actions = Vec::new();
        while let Some(line) = self.splitter.next_line() {
            actions.extend(self.handle_line(&line));
            if !self.connection.state().is_live() {
                break;
            }
        }
        actions
    }

    fn handle_line(&mut self, line: &str) -> Vec<IoAction> {
        debug!("<- {line}");
        match SatelliteMessage::parse(line) {
            SatelliteMessage::Ping { body } => vec![IoAction::Send(messages::pong(&body))],
            SatelliteMessage::Pong => Vec::new(),
            SatelliteMessage::Begin(peer) => {
                let version = peer.version().unwrap_or("unknown").to_string();
                if !self.connection.on_announcement(peer) {
                    return Vec::new();
                }
                info!("satellite host announced itself (version {version})");
                self.register_devices()
            }
            SatelliteMessage::AddDeviceAck {
                device_id,
                ok,
                error,
            } => {
                self.on_ack(&device_id, ok, error);
                Vec::new()
            }
            SatelliteMessage::KeysClear { device_id } => {
                if self.devices.get(&device_id).is_none() {
                    debug!("KEYS-CLEAR for unknown device {device_id:?} ignored");
                    return Vec::new();
                }
                self.surfaces.clear(&device_id);
                if self.presenting.contains(&device_id) {
                    self.presentation.clear(&device_id);
                }
                Vec::new()
            }
            SatelliteMessage::KeyState(update) => {
                let Some(device) = self.devices.get(&update.device_id) else {
                    debug!("KEY-STATE for unknown device {:?} ignored", update.device_id);
                    return Vec::new();
                };
                let pos = update.position(device.columns, device.rows);
                let state = update.visual_state();
                self.surfaces.draw(&device.id, pos, &state);
                if self.presenting.contains(&device.id) {
                    self.presentation.draw(&device.id, pos, &state);
                }
                Vec::new()
            }
            SatelliteMessage::Unknown { verb } => {
                debug!("ignoring unknown verb {verb:?}");
                Vec::new()
            }
        }
    }

    fn on_ack(&mut self, device_id: &str, ok: bool, error: Option<String>) {
        let success = ok && error.is_none();
        match self.devices.acknowledge(device_id, success) {
            AckOutcome::Registered => {
                info!("device {device_id} registered");
                let host = self.companion_addr();
                if let Some(device) = self.devices.get(device_id) {
                    self.surfaces.register(device, PRODUCT_NAME, &host);
                }
            }
            AckOutcome::Rejected => {
                warn!(
                    "satellite host rejected device {device_id}: {}",
                    error.as_deref().unwrap_or("not ok")
                );
            }
            AckOutcome::Ignored => {
                debug!("acknowledgment for {device_id:?} without a pending registration ignored");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
