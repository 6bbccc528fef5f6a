//! JSON messages exchanged with real-time subscribers.
//!
//! Every message is a JSON object whose `"type"` field selects the variant:
//!
//! ```json
//! {"type":"snapshot","surfaces":[{"surfaceId":"dev1","columns":8,...}]}
//! {"type":"draw","surfaceId":"dev1","x":2,"y":1,"state":{"text":"Hello"}}
//! {"type":"key","surfaceId":"dev1","x":2,"y":1,"pressed":true}
//! ```
//!
//! Subscribers may submit `register`, `draw` and `key` objects of the same
//! shape (see [`ClientMsg`]).

use satellite_core::KeyVisualState;
use serde::{Deserialize, Serialize};

use super::surface::{RegisterRequest, SurfaceId, SurfaceSnapshot};

/// Hub → subscriber broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HubEvent {
    /// Full state of every surface; sent on connect and after any
    /// register / clear / remove.
    Snapshot { surfaces: Vec<SurfaceSnapshot> },

    /// The fields a draw submitted for one key; subscribers merge it into
    /// the key state they hold from the last snapshot.
    #[serde(rename_all = "camelCase")]
    Draw {
        surface_id: SurfaceId,
        x: u32,
        y: u32,
        state: KeyVisualState,
    },

    /// Ephemeral press/release; never cached.
    #[serde(rename_all = "camelCase")]
    Key {
        surface_id: SurfaceId,
        x: u32,
        y: u32,
        pressed: bool,
    },
}

impl HubEvent {
    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            HubEvent::Snapshot { .. } => "snapshot",
            HubEvent::Draw { .. } => "draw",
            HubEvent::Key { .. } => "key",
        }
    }
}

/// Subscriber → hub submissions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMsg {
    Register(RegisterRequest),

    #[serde(rename_all = "camelCase")]
    Draw {
        surface_id: String,
        x: i64,
        y: i64,
        #[serde(flatten)]
        state: KeyVisualState,
    },

    #[serde(rename_all = "camelCase")]
    Key {
        surface_id: String,
        x: i64,
        y: i64,
        pressed: bool,
    },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
