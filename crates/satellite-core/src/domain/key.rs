//! Key addressing and key visual state.
//!
//! # Addressing
//!
//! A key is located by `(x, y)` = `(column, row)`.  The wire uses two forms:
//!
//! - `"row/col"` – e.g. `"2/3"` is row 2, column 3 → `(x=3, y=2)`.
//! - a flat index – `x = index % columns`, `y = index / columns`.
//!
//! Both forms are clamped into the grid, never rejected.
//!
//! # Visual state
//!
//! [`KeyVisualState`] is an *overlay*: every field is optional, and
//! [`KeyVisualState::merge`] only overwrites the fields the update carries.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// MIME type used when the image bytes match no known signature.
pub const GENERIC_BINARY_MIME: &str = "application/octet-stream";

/// A key coordinate inside a device grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyPos {
    pub x: u32,
    pub y: u32,
}

impl KeyPos {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Clamps signed coordinates into a `columns × rows` grid.
    pub fn clamped(x: i64, y: i64, columns: u32, rows: u32) -> Self {
        let max_x = i64::from(columns.max(1) - 1);
        let max_y = i64::from(rows.max(1) - 1);
        Self {
            x: x.clamp(0, max_x) as u32,
            y: y.clamp(0, max_y) as u32,
        }
    }

    /// Resolves a wire key address (`"row/col"` or a flat index).
    ///
    /// Unparseable components read as `0`.
    pub fn from_address(raw: &str, columns: u32, rows: u32) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        let num = |s: &str| s.trim().parse::<i64>().unwrap_or(0);

        match raw.split_once('/') {
            Some((row, col)) => Self::clamped(num(col), num(row), columns, rows),
            None => {
                let last = i64::from(columns * rows - 1);
                let index = num(raw).clamp(0, last);
                let columns = i64::from(columns);
                Self::clamped(index % columns, index / columns, columns as u32, rows)
            }
        }
    }

    /// Flat index `y * columns + x`.
    pub fn index(self, columns: u32) -> u32 {
        self.y * columns + self.x
    }
}

/// Returns the MIME type for image bytes based on their leading signature.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, 0x50, 0x4E, 0x47, ..] => "image/png",
        [0xFF, 0xD8, ..] => "image/jpeg",
        [0x42, 0x4D, ..] => "image/bmp",
        [0x47, 0x49, 0x46, ..] => "image/gif",
        _ => GENERIC_BINARY_MIME,
    }
}

/// An image shown on a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyImage {
    /// Raw bytes decoded from the wire, with a sniffed MIME type.
    Bytes { mime: String, data: Vec<u8> },
    /// An already-encoded image (typically a `data:` URL) supplied by a
    /// registration source other than the satellite connection.
    Encoded(String),
}

impl KeyImage {
    /// Decodes a base64 bitmap payload.  Malformed or empty input is `None`.
    pub fn from_base64(payload: &str) -> Option<Self> {
        let data = STANDARD.decode(payload.trim()).ok()?;
        if data.is_empty() {
            return None;
        }
        Some(KeyImage::Bytes {
            mime: sniff_mime(&data).to_string(),
            data,
        })
    }

    /// Renders the image as a `data:` URL for subscribers.
    pub fn to_data_url(&self) -> String {
        match self {
            KeyImage::Bytes { mime, data } => format!("data:{mime};base64,{}", STANDARD.encode(data)),
            KeyImage::Encoded(s) => s.clone(),
        }
    }
}

impl Serialize for KeyImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> Deserialize<'de> for KeyImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(KeyImage::Encoded)
    }
}

/// Decodes a base64 UTF-8 text payload.  Malformed input is `None`.
pub fn decode_text(payload: &str) -> Option<String> {
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Everything a key can display.  Absent fields mean "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVisualState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Foreground (text) colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Background colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<KeyImage>,
}

impl KeyVisualState {
    /// Overlays `patch` onto `self`: present fields overwrite, absent keep.
    pub fn merge(&mut self, patch: &KeyVisualState) {
        if let Some(text) = &patch.text {
            self.text = Some(text.clone());
        }
        if let Some(color) = &patch.color {
            self.color = Some(color.clone());
        }
        if let Some(bg) = &patch.bg_color {
            self.bg_color = Some(bg.clone());
        }
        if let Some(image) = &patch.image {
            self.image = Some(image.clone());
        }
    }

    /// `true` when no field is set.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.color.is_none() && self.bg_color.is_none() && self.image.is_none()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
