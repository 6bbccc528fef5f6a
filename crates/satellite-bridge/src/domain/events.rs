//! Inputs and outputs of the sans-I/O bridge.
//!
//! The driver translates everything that happens on the socket or a timer
//! into a [`SocketEvent`], hands it to the bridge, and then performs the
//! returned [`IoAction`]s in order.

use std::time::Duration;

/// Something that happened to the connection or one of its timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The TCP connect completed.
    Connected,
    /// Bytes arrived (any chunking; the bridge re-frames them).
    Data(Vec<u8>),
    /// Connect refused, timed out, reset, or a read/write failed.
    Error(String),
    /// The peer closed the stream.
    Closed,
    /// The single reconnect timer elapsed.
    ReconnectTimerFired,
    /// The keep-alive interval elapsed.
    KeepaliveTick,
}

/// Something the driver must do on the bridge's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoAction {
    /// Drop any current socket and open a new one.
    Connect { host: String, port: u16 },
    /// Write one already-terminated protocol line.
    Send(String),
    /// Drop the socket (or abandon the pending connect).
    Close,
    /// Arm the reconnect timer.
    ScheduleReconnect(Duration),
    /// Disarm the reconnect timer.
    CancelReconnect,
}

impl IoAction {
    /// The line carried by a `Send`, if any.
    pub fn as_line(&self) -> Option<&str> {
        match self {
            IoAction::Send(line) => Some(line),
            _ => None,
        }
    }
}
