//! Tokio driver for the satellite connection.
//!
//! [`BridgeDriver`] is the only owner of the TCP socket, the reconnect timer
//! and the keep-alive interval.  It runs one `select!` loop that waits on
//! whichever of these is currently armed plus the command channel, turns
//! what happened into a [`SocketEvent`], hands it to the [`SatelliteBridge`]
//! and then carries out the returned [`IoAction`]s in order.  Because every
//! event runs to completion before the next `select!`, incoming lines are
//! handled in arrival order and outgoing lines are written in issue order.
//!
//! The shell talks to the driver through a cloneable [`BridgeHandle`]:
//! commands go over an `mpsc` channel and queries carry a `oneshot` reply.

use std::collections::VecDeque;
use std::future::{pending, Future};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use satellite_core::DeviceDescriptor;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

use crate::application::{PresentationSink, SatelliteBridge, SurfaceSink};
use crate::domain::{BridgeConfig, BridgeStatus, IoAction, SocketEvent};

const READ_BUFFER: usize = 8 * 1024;
const COMMAND_CAPACITY: usize = 64;

/// Errors returned by [`BridgeHandle`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The driver task has exited; no further commands can be served.
    #[error("satellite bridge driver is not running")]
    DriverGone,
}

/// Timing knobs for the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSettings {
    /// Period of keep-alive `PING`s while connected.  `None` disables them.
    pub keepalive: Option<Duration>,
    /// Upper bound on one TCP connect attempt.
    pub connect_timeout: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            keepalive: Some(Duration::from_secs(5)),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Requests from the shell to the driver task.
#[derive(Debug)]
pub enum BridgeCommand {
    Status(oneshot::Sender<BridgeStatus>),
    Reload(BridgeConfig),
    Reconnect,
    Disconnect,
    KeyPress {
        device_id: String,
        x: i64,
        y: i64,
        pressed: bool,
    },
    OpenPresentation {
        device_id: String,
        reply: oneshot::Sender<Option<DeviceDescriptor>>,
    },
    ClosePresentation {
        device_id: String,
        reply: oneshot::Sender<bool>,
    },
    Device {
        device_id: String,
        reply: oneshot::Sender<Option<DeviceDescriptor>>,
    },
    /// Disconnect and stop the driver task.
    Shutdown,
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Cloneable front-end to a running [`BridgeDriver`].
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<BridgeCommand>,
}

impl BridgeHandle {
    pub fn new(tx: mpsc::Sender<BridgeCommand>) -> Self {
        Self { tx }
    }

    pub async fn status(&self) -> Result<BridgeStatus, BridgeError> {
        self.request(BridgeCommand::Status).await
    }

    pub async fn reload(&self, config: BridgeConfig) -> Result<(), BridgeError> {
        self.send(BridgeCommand::Reload(config)).await
    }

    pub async fn reconnect(&self) -> Result<(), BridgeError> {
        self.send(BridgeCommand::Reconnect).await
    }

    pub async fn disconnect(&self) -> Result<(), BridgeError> {
        self.send(BridgeCommand::Disconnect).await
    }

    pub async fn key_press(
        &self,
        device_id: &str,
        x: i64,
        y: i64,
        pressed: bool,
    ) -> Result<(), BridgeError> {
        self.send(BridgeCommand::KeyPress {
            device_id: device_id.to_string(),
            x,
            y,
            pressed,
        })
        .await
    }

    pub async fn open_presentation(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceDescriptor>, BridgeError> {
        let device_id = device_id.to_string();
        self.request(|reply| BridgeCommand::OpenPresentation { device_id, reply })
            .await
    }

    pub async fn close_presentation(&self, device_id: &str) -> Result<bool, BridgeError> {
        let device_id = device_id.to_string();
        self.request(|reply| BridgeCommand::ClosePresentation { device_id, reply })
            .await
    }

    /// Looks up a configured device by id.
    pub async fn device(&self, device_id: &str) -> Result<Option<DeviceDescriptor>, BridgeError> {
        let device_id = device_id.to_string();
        self.request(|reply| BridgeCommand::Device { device_id, reply })
            .await
    }

    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        self.send(BridgeCommand::Shutdown).await
    }

    async fn send(&self, cmd: BridgeCommand) -> Result<(), BridgeError> {
        self.tx.send(cmd).await.map_err(|_| BridgeError::DriverGone)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> BridgeCommand,
    ) -> Result<T, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| BridgeError::DriverGone)
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

type ConnectFuture = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send>>;

enum Wake {
    Command(Option<BridgeCommand>),
    Connected(io::Result<TcpStream>),
    Read(io::Result<usize>),
    ReconnectDue,
    KeepaliveDue,
}

pub struct BridgeDriver {
    bridge: SatelliteBridge,
    settings: DriverSettings,
    commands: mpsc::Receiver<BridgeCommand>,
    connecting: Option<ConnectFuture>,
    reader: Option<OwnedReadHalf>,
    writer: Option<OwnedWriteHalf>,
    reconnect: Option<Pin<Box<Sleep>>>,
    keepalive: Option<Interval>,
    /// Events raised while applying actions (a failed write), handled next.
    queued: VecDeque<SocketEvent>,
}

impl BridgeDriver {
    pub fn new(
        bridge: SatelliteBridge,
        settings: DriverSettings,
        commands: mpsc::Receiver<BridgeCommand>,
    ) -> Self {
        Self {
            bridge,
            settings,
            commands,
            connecting: None,
            reader: None,
            writer: None,
            reconnect: None,
            keepalive: None,
            queued: VecDeque::new(),
        }
    }

    /// Runs until [`BridgeCommand::Shutdown`] or until every handle is dropped.
    pub async fn run(mut self) {
        let actions = self.bridge.start();
        self.apply(actions).await;

        let mut buf = vec![0u8; READ_BUFFER];
        loop {
            while let Some(event) = self.queued.pop_front() {
                self.dispatch(event).await;
            }

            let wake = tokio::select! {
                cmd = self.commands.recv() => Wake::Command(cmd),
                res = finish_connect(&mut self.connecting) => Wake::Connected(res),
                res = read_some(&mut self.reader, &mut buf) => Wake::Read(res),
                () = sleep_armed(&mut self.reconnect) => Wake::ReconnectDue,
                () = tick_armed(&mut self.keepalive) => Wake::KeepaliveDue,
            };

            match wake {
                Wake::Command(None) => {
                    info!("all bridge handles dropped; stopping satellite driver");
                    let actions = self.bridge.disconnect();
                    self.apply(actions).await;
                    break;
                }
                Wake::Command(Some(BridgeCommand::Shutdown)) => {
                    info!("satellite driver shutting down");
                    let actions = self.bridge.disconnect();
                    self.apply(actions).await;
                    break;
                }
                Wake::Command(Some(cmd)) => self.on_command(cmd).await,
                Wake::Connected(Ok(stream)) => {
                    self.connecting = None;
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("TCP_NODELAY not set: {e}");
                    }
                    let (reader, writer) = stream.into_split();
                    self.reader = Some(reader);
                    self.writer = Some(writer);
                    self.arm_keepalive();
                    self.dispatch(SocketEvent::Connected).await;
                }
                Wake::Connected(Err(e)) => {
                    self.connecting = None;
                    self.dispatch(SocketEvent::Error(e.to_string())).await;
                }
                Wake::Read(Ok(0)) => {
                    self.drop_socket();
                    self.dispatch(SocketEvent::Closed).await;
                }
                Wake::Read(Ok(n)) => {
                    self.dispatch(SocketEvent::Data(buf[..n].to_vec())).await;
                }
                Wake::Read(Err(e)) => {
                    self.drop_socket();
                    self.dispatch(SocketEvent::Error(e.to_string())).await;
                }
                Wake::ReconnectDue => {
                    self.reconnect = None;
                    self.dispatch(SocketEvent::ReconnectTimerFired).await;
                }
                Wake::KeepaliveDue => self.dispatch(SocketEvent::KeepaliveTick).await,
            }
        }
    }

    async fn on_command(&mut self, cmd: BridgeCommand) {
        let actions = match cmd {
            BridgeCommand::Status(reply) => {
                let _ = reply.send(self.bridge.status());
                return;
            }
            BridgeCommand::Reload(config) => self.bridge.reload_from_config(config),
            BridgeCommand::Reconnect => self.bridge.reconnect(),
            BridgeCommand::Disconnect => self.bridge.disconnect(),
            BridgeCommand::KeyPress {
                device_id,
                x,
                y,
                pressed,
            } => self.bridge.key_press(&device_id, x, y, pressed),
            BridgeCommand::OpenPresentation { device_id, reply } => {
                let _ = reply.send(self.bridge.open_presentation(&device_id));
                return;
            }
            BridgeCommand::ClosePresentation { device_id, reply } => {
                let _ = reply.send(self.bridge.close_presentation(&device_id));
                return;
            }
            BridgeCommand::Device { device_id, reply } => {
                let _ = reply.send(self.bridge.device(&device_id).cloned());
                return;
            }
            // Handled by the run loop.
            BridgeCommand::Shutdown => return,
        };
        self.apply(actions).await;
    }

    async fn dispatch(&mut self, event: SocketEvent) {
        let actions = self.bridge.handle(event);
        self.apply(actions).await;
    }

    async fn apply(&mut self, actions: Vec<IoAction>) {
        for action in actions {
            match action {
                IoAction::Connect { host, port } => {
                    self.drop_socket();
                    let addr = format!("{host}:{port}");
                    let limit = self.settings.connect_timeout;
                    self.connecting = Some(Box::pin(async move {
                        match time::timeout(limit, TcpStream::connect(addr)).await {
                            Ok(result) => result,
                            Err(_) => Err(io::Error::new(
                                io::ErrorKind::TimedOut,
                                format!("connect timed out after {limit:?}"),
                            )),
                        }
                    }));
                }
                IoAction::Send(line) => self.write_line(&line).await,
                IoAction::Close => self.drop_socket(),
                IoAction::ScheduleReconnect(delay) => {
                    self.reconnect = Some(Box::pin(time::sleep(delay)));
                }
                IoAction::CancelReconnect => self.reconnect = None,
            }
        }
    }

    async fn write_line(&mut self, line: &str) {
        let Some(writer) = self.writer.as_mut() else {
            debug!("no socket; dropped {}", line.trim_end());
            return;
        };
        debug!("-> {}", line.trim_end());
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!("write to satellite host failed: {e}");
            self.drop_socket();
            self.queued.push_back(SocketEvent::Error(e.to_string()));
        }
    }

    fn arm_keepalive(&mut self) {
        self.keepalive = self.settings.keepalive.map(|period| {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
    }

    fn drop_socket(&mut self) {
        self.connecting = None;
        self.reader = None;
        self.writer = None;
        self.keepalive = None;
    }
}

/// Spawns a driver for a bridge built from `config` and returns its handle.
///
/// The bridge starts connecting immediately if any device is configured.
pub fn spawn_bridge(
    config: BridgeConfig,
    settings: DriverSettings,
    surfaces: Arc<dyn SurfaceSink>,
    presentation: Arc<dyn PresentationSink>,
) -> (BridgeHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let bridge = SatelliteBridge::new(config, surfaces, presentation);
    let driver = BridgeDriver::new(bridge, settings, rx);
    (BridgeHandle::new(tx), tokio::spawn(driver.run()))
}

// ── select! helpers: each waits forever when its resource is not armed ──────

async fn finish_connect(connecting: &mut Option<ConnectFuture>) -> io::Result<TcpStream> {
    match connecting {
        Some(fut) => fut.as_mut().await,
        None => pending().await,
    }
}

async fn read_some(reader: &mut Option<OwnedReadHalf>, buf: &mut [u8]) -> io::Result<usize> {
    match reader {
        Some(reader) => reader.read(buf).await,
        None => pending().await,
    }
}

async fn sleep_armed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn tick_armed(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
