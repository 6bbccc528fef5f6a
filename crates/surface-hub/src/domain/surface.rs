//! Surfaces and their identities.
//!
//! A [`Surface`] is one live button grid known to the hub.  It carries a
//! descriptive [`SurfaceInfo`], two timestamps, and a sparse cache of key
//! visual states keyed by [`KeyPos`].  The cache only ever grows by merging
//! draw patches; it is emptied by a clear and dropped with the surface.

use std::collections::BTreeMap;
use std::fmt;

use satellite_core::{KeyPos, KeyVisualState};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Longest accepted surface id.
pub const MAX_SURFACE_ID_LEN: usize = 64;

/// Grid bounds accepted from registration sources.
pub const MIN_GRID: u32 = 1;
pub const MAX_GRID: u32 = 32;

/// Failures at the registry boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// The id is empty, longer than 64 bytes, or uses a character outside
    /// `[A-Za-z0-9_-]`.
    #[error("invalid surface id {0:?}")]
    InvalidId(String),

    #[error("unknown surface {0:?}")]
    UnknownSurface(String),
}

/// A validated surface identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SurfaceId(String);

impl SurfaceId {
    /// Validates `raw` against the `[A-Za-z0-9_-]{1,64}` rule.
    pub fn parse(raw: &str) -> Result<Self, SurfaceError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_SURFACE_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(SurfaceError::InvalidId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies the connection that registered a surface.
///
/// When that connection terminates, everything it owns is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(Uuid);

impl OwnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive attributes supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub name: String,
    pub product: String,
    pub host: String,
    pub columns: u32,
    pub rows: u32,
}

impl SurfaceInfo {
    /// Returns a copy with `columns`/`rows` clamped into `1..=32`.
    pub fn clamped(mut self) -> Self {
        self.columns = self.columns.clamp(MIN_GRID, MAX_GRID);
        self.rows = self.rows.clamp(MIN_GRID, MAX_GRID);
        self
    }
}

/// A live surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pub id: SurfaceId,
    pub owner: OwnerId,
    pub info: SurfaceInfo,
    /// Milliseconds since the Unix epoch.
    pub connected_at: u64,
    pub last_seen: u64,
    pub keys: BTreeMap<KeyPos, KeyVisualState>,
}

impl Surface {
    pub fn new(id: SurfaceId, owner: OwnerId, info: SurfaceInfo, now_ms: u64) -> Self {
        Self {
            id,
            owner,
            info: info.clamped(),
            connected_at: now_ms,
            last_seen: now_ms,
            keys: BTreeMap::new(),
        }
    }

    /// Clamps signed coordinates into this surface's grid.
    pub fn clamp(&self, x: i64, y: i64) -> KeyPos {
        KeyPos::clamped(x, y, self.info.columns, self.info.rows)
    }

    /// Merges `patch` into the cached state at `pos`.
    pub fn merge_key(&mut self, pos: KeyPos, patch: &KeyVisualState) -> &KeyVisualState {
        let entry = self.keys.entry(pos).or_default();
        entry.merge(patch);
        entry
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        SurfaceSnapshot {
            surface_id: self.id.clone(),
            name: self.info.name.clone(),
            product: self.info.product.clone(),
            host: self.info.host.clone(),
            columns: self.info.columns,
            rows: self.info.rows,
            connected_at: self.connected_at,
            last_seen: self.last_seen,
            keys: self
                .keys
                .iter()
                .map(|(pos, state)| KeySnapshot {
                    x: pos.x,
                    y: pos.y,
                    state: state.clone(),
                })
                .collect(),
        }
    }
}

/// One cached key as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeySnapshot {
    pub x: u32,
    pub y: u32,
    #[serde(flatten)]
    pub state: KeyVisualState,
}

/// Serializable view of a [`Surface`] for snapshot broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceSnapshot {
    pub surface_id: SurfaceId,
    pub name: String,
    pub product: String,
    pub host: String,
    pub columns: u32,
    pub rows: u32,
    pub connected_at: u64,
    pub last_seen: u64,
    pub keys: Vec<KeySnapshot>,
}

/// Raw registration payload as submitted by an external source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub surface_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_columns")]
    pub columns: u32,
    #[serde(default = "default_rows")]
    pub rows: u32,
}

fn default_columns() -> u32 {
    8
}

fn default_rows() -> u32 {
    4
}

impl RegisterRequest {
    pub fn info(&self) -> SurfaceInfo {
        SurfaceInfo {
            name: if self.name.is_empty() {
                self.surface_id.clone()
            } else {
                self.name.clone()
            },
            product: self.product.clone(),
            host: self.host.clone(),
            columns: self.columns,
            rows: self.rows,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn info(columns: u32, rows: u32) -> SurfaceInfo {
        SurfaceInfo {
            name: "Deck".to_string(),
            product: "Virtual".to_string(),
            host: "127.0.0.1".to_string(),
            columns,
            rows,
        }
    }

    #[test]
    fn test_surface_id_accepts_charset() {
        assert!(SurfaceId::parse("dev-1").is_ok());
        assert!(SurfaceId::parse("A_b-9").is_ok());
        assert!(SurfaceId::parse(&"x".repeat(64)).is_ok());
    }

    #[test]
    fn test_surface_id_rejects_bad_input() {
        assert_eq!(
            SurfaceId::parse("bad id!"),
            Err(SurfaceError::InvalidId("bad id!".to_string()))
        );
        assert!(SurfaceId::parse("").is_err());
        assert!(SurfaceId::parse(&"x".repeat(65)).is_err());
        assert!(SurfaceId::parse("dév").is_err());
    }

    #[test]
    fn test_surface_info_is_clamped_on_creation() {
        let id = SurfaceId::parse("s1").unwrap();
        let surface = Surface::new(id, OwnerId::new(), info(0, 99), 10);
        assert_eq!((surface.info.columns, surface.info.rows), (1, 32));
        assert_eq!(surface.connected_at, 10);
        assert_eq!(surface.last_seen, 10);
    }

    #[test]
    fn test_merge_key_overlays_fields() {
        // Arrange
        let id = SurfaceId::parse("s1").unwrap();
        let mut surface = Surface::new(id, OwnerId::new(), info(8, 4), 0);
        let pos = KeyPos::new(1, 1);
        surface.merge_key(
            pos,
            &KeyVisualState {
                text: Some("A".to_string()),
                ..KeyVisualState::default()
            },
        );

        // Act
        let merged = surface
            .merge_key(
                pos,
                &KeyVisualState {
                    bg_color: Some("#ff0000".to_string()),
                    ..KeyVisualState::default()
                },
            )
            .clone();

        // Assert
        assert_eq!(merged.text.as_deref(), Some("A"));
        assert_eq!(merged.bg_color.as_deref(), Some("#ff0000"));
    }

    #[test]
    fn test_snapshot_json_shape() {
        // Arrange
        let id = SurfaceId::parse("s1").unwrap();
        let mut surface = Surface::new(id, OwnerId::new(), info(2, 1), 5);
        surface.merge_key(
            KeyPos::new(1, 0),
            &KeyVisualState {
                text: Some("Go".to_string()),
                ..KeyVisualState::default()
            },
        );

        // Act
        let json = serde_json::to_value(surface.snapshot()).unwrap();

        // Assert
        assert_eq!(json["surfaceId"], "s1");
        assert_eq!(json["connectedAt"], 5);
        assert_eq!(json["lastSeen"], 5);
        assert_eq!(json["keys"][0]["x"], 1);
        assert_eq!(json["keys"][0]["text"], "Go");
    }

    #[test]
    fn test_register_request_defaults() {
        let req: RegisterRequest = serde_json::from_str(r#"{"surfaceId":"s1"}"#).unwrap();
        let info = req.info();
        assert_eq!(info.name, "s1");
        assert_eq!((info.columns, info.rows), (8, 4));
    }
}
