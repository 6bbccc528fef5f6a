//! Status snapshot for the shell.

use serde::Serialize;

/// Point-in-time view of the bridge, serialized camelCase for UI consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    /// The peer has announced itself (`Active`).
    pub connected: bool,
    /// A connect or handshake is in progress.
    pub connecting: bool,
    pub peer_version: Option<String>,
    pub device_count: usize,
    pub registered_count: usize,
}
