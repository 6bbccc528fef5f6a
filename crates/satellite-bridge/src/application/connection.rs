//! Connection state machine.
//!
//! ```text
//!                connect                 socket up            BEGIN
//! Disconnected ─────────► Connecting ─────────────► Awaiting ─────────► Active
//!      ▲                      │                    Handshake              │
//!      └──────────────────────┴─────── error / close ─────┴───────────────┘
//! ```
//!
//! Alongside the state the machine tracks the last peer announcement (only
//! meaningful while connected) and whether the single reconnect timer is
//! armed.

use satellite_core::PeerAnnouncement;

/// Lifecycle of the one TCP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Socket open, peer has not announced itself yet.
    AwaitingHandshake,
    /// Peer announcement received.
    Active,
}

impl ConnectionState {
    /// `true` when a socket exists or is being opened.
    pub fn is_live(self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }
}

#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    peer: Option<PeerAnnouncement>,
    reconnect_pending: bool,
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            peer: None,
            reconnect_pending: false,
        }
    }
}

impl ConnectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer(&self) -> Option<&PeerAnnouncement> {
        self.peer.as_ref()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// `Disconnected → Connecting`; forgets any previous peer.
    pub fn start_connect(&mut self) {
        self.state = ConnectionState::Connecting;
        self.peer = None;
    }

    /// `Connecting → AwaitingHandshake`.  Returns `false` for a stale
    /// completion (no connect in progress).
    pub fn on_socket_open(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::AwaitingHandshake;
        true
    }

    /// Records the peer announcement and becomes `Active`.
    ///
    /// Returns `false` if there is no live socket to announce on.
    pub fn on_announcement(&mut self, peer: PeerAnnouncement) -> bool {
        if !self.state.is_live() {
            return false;
        }
        self.state = ConnectionState::Active;
        self.peer = Some(peer);
        true
    }

    /// Any live state → `Disconnected`.  Returns `false` if already
    /// disconnected, so a close following an error is absorbed.
    pub fn on_lost(&mut self) -> bool {
        if !self.state.is_live() {
            return false;
        }
        self.state = ConnectionState::Disconnected;
        self.peer = None;
        true
    }

    /// Arms the reconnect timer.  Returns `false` if it was already armed.
    pub fn arm_reconnect(&mut self) -> bool {
        !std::mem::replace(&mut self.reconnect_pending, true)
    }

    /// Disarms the reconnect timer.  Returns `true` if it was armed.
    pub fn disarm_reconnect(&mut self) -> bool {
        std::mem::replace(&mut self.reconnect_pending, false)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle_transitions() {
        // Arrange
        let mut conn = ConnectionMachine::new();

        // Act / Assert
        conn.start_connect();
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert!(conn.on_socket_open());
        assert_eq!(conn.state(), ConnectionState::AwaitingHandshake);
        assert!(conn.on_announcement(PeerAnnouncement::default()));
        assert_eq!(conn.state(), ConnectionState::Active);
        assert!(conn.peer().is_some());
        assert!(conn.on_lost());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.peer().is_none());
    }

    #[test]
    fn test_second_loss_is_absorbed() {
        let mut conn = ConnectionMachine::new();
        conn.start_connect();
        assert!(conn.on_lost());
        assert!(!conn.on_lost());
    }

    #[test]
    fn test_stale_socket_open_is_rejected() {
        let mut conn = ConnectionMachine::new();
        assert!(!conn.on_socket_open());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_announcement_without_socket_is_rejected() {
        let mut conn = ConnectionMachine::new();
        assert!(!conn.on_announcement(PeerAnnouncement::default()));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_reconnect_timer_is_a_singleton() {
        let mut conn = ConnectionMachine::new();
        assert!(conn.arm_reconnect());
        assert!(!conn.arm_reconnect());
        assert!(conn.disarm_reconnect());
        assert!(!conn.disarm_reconnect());
        assert!(conn.arm_reconnect());
    }
}
