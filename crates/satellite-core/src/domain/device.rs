//! Device descriptors and their lenient configuration loader.
//!
//! A *device* is one virtual button grid the bridge registers with the
//! satellite host.  Descriptors come from an external configuration store
//! that may be hand-edited, so every field is read loosely and then clamped
//! into range:
//!
//! ```rust
//! use satellite_core::{clamp_int, LooseValue};
//!
//! assert_eq!(clamp_int(&LooseValue::from("abc"), 1, 32, 8), 8);
//! assert_eq!(clamp_int(&LooseValue::from(999), 1, 32, 8), 32);
//! ```
//!
//! Only a descriptor whose id is missing/empty (or repeats an earlier id) is
//! dropped.  Everything else is repaired.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const MIN_GRID: u32 = 1;
pub const MAX_GRID: u32 = 32;
pub const MIN_BITMAP: u32 = 1;
pub const MAX_BITMAP: u32 = 512;

pub const DEFAULT_COLUMNS: u32 = 8;
pub const DEFAULT_ROWS: u32 = 4;
pub const DEFAULT_BITMAP: u32 = 72;
pub const DEFAULT_BACKGROUND_COLOR: &str = "#000000";
pub const DEFAULT_BACKGROUND_OPACITY: u8 = 100;

/// Why a configured device was dropped at load time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    /// The entry had no id, or only whitespace.
    #[error("device entry #{index} has no id")]
    EmptyId { index: usize },

    /// An earlier entry already uses this id.
    #[error("duplicate device id '{0}'")]
    DuplicateId(String),
}

/// A scalar exactly as it appeared in the configuration file.
///
/// TOML and JSON both deserialize into this without failing on a type
/// mismatch, so `columns = "8"` and `columns = 8.0` are accepted alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for LooseValue {
    fn from(v: &str) -> Self {
        LooseValue::Text(v.to_string())
    }
}

impl From<i64> for LooseValue {
    fn from(v: i64) -> Self {
        LooseValue::Int(v)
    }
}

impl From<bool> for LooseValue {
    fn from(v: bool) -> Self {
        LooseValue::Bool(v)
    }
}

/// Reads `value` as an integer and clamps it into `[min, max]`.
///
/// Non-numeric input yields `default` (which is *not* clamped).  Floats are
/// truncated toward zero.
pub fn clamp_int(value: &LooseValue, min: i64, max: i64, default: i64) -> i64 {
    let parsed = match value {
        LooseValue::Int(n) => Some(*n),
        LooseValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
        LooseValue::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    };
    match parsed {
        Some(n) => n.clamp(min, max),
        None => default,
    }
}

/// Reads `value` as a boolean, falling back to `default`.
pub fn loose_bool(value: &LooseValue, default: bool) -> bool {
    match value {
        LooseValue::Bool(b) => *b,
        LooseValue::Int(n) => *n != 0,
        LooseValue::Float(f) => *f != 0.0,
        LooseValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => default,
        },
    }
}

fn loose_string(value: &LooseValue) -> String {
    match value {
        LooseValue::Bool(b) => b.to_string(),
        LooseValue::Int(n) => n.to_string(),
        LooseValue::Float(f) => f.to_string(),
        LooseValue::Text(s) => s.clone(),
    }
}

/// Accepts `#RGB` and `#RRGGBB` hex colours.
fn is_hex_color(s: &str) -> bool {
    match s.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// One `[[devices]]` entry before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDeviceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<LooseValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<LooseValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<LooseValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitmap: Option<LooseValue>,
    #[serde(alias = "backgroundColor")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<LooseValue>,
    #[serde(alias = "backgroundOpacity")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_opacity: Option<LooseValue>,
    #[serde(alias = "alwaysOnTop")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_on_top: Option<LooseValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movable: Option<LooseValue>,
    #[serde(alias = "disableButtonPresses")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_button_presses: Option<LooseValue>,
}

/// A validated virtual button grid.
///
/// Descriptors are immutable once loaded: a configuration reload replaces
/// them wholesale, and a changed descriptor is treated as removed and
/// re-added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// Trimmed, non-empty, unique.
    pub id: String,
    /// 1..=32
    pub columns: u32,
    /// 1..=32
    pub rows: u32,
    /// Square bitmap edge in pixels, 1..=512.
    pub bitmap: u32,
    pub background_color: String,
    /// 0..=100
    pub background_opacity: u8,
    pub always_on_top: bool,
    pub movable: bool,
    pub disable_button_presses: bool,
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self {
            id: String::new(),
            columns: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS,
            bitmap: DEFAULT_BITMAP,
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            background_opacity: DEFAULT_BACKGROUND_OPACITY,
            always_on_top: false,
            movable: true,
            disable_button_presses: false,
        }
    }
}

impl DeviceDescriptor {
    /// Builds a descriptor from a raw entry, clamping every field.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::EmptyId`] when the id is absent or blank.
    pub fn from_raw(index: usize, raw: &RawDeviceConfig) -> Result<Self, DescriptorError> {
        let id = raw
            .id
            .as_ref()
            .map(|v| loose_string(v).trim().to_string())
            .unwrap_or_default();
        if id.is_empty() {
            return Err(DescriptorError::EmptyId { index });
        }

        let defaults = Self::default();
        let int = |v: &Option<LooseValue>, min: u32, max: u32, default: u32| -> u32 {
            v.as_ref().map_or(default, |v| {
                clamp_int(v, i64::from(min), i64::from(max), i64::from(default)) as u32
            })
        };
        let flag = |v: &Option<LooseValue>, default: bool| v.as_ref().map_or(default, |v| loose_bool(v, default));

        let background_color = raw
            .background_color
            .as_ref()
            .map(|v| loose_string(v).trim().to_string())
            .filter(|c| is_hex_color(c))
            .unwrap_or(defaults.background_color);

        Ok(Self {
            id,
            columns: int(&raw.columns, MIN_GRID, MAX_GRID, DEFAULT_COLUMNS),
            rows: int(&raw.rows, MIN_GRID, MAX_GRID, DEFAULT_ROWS),
            bitmap: int(&raw.bitmap, MIN_BITMAP, MAX_BITMAP, DEFAULT_BITMAP),
            background_color,
            background_opacity: int(&raw.background_opacity, 0, 100, u32::from(DEFAULT_BACKGROUND_OPACITY)) as u8,
            always_on_top: flag(&raw.always_on_top, defaults.always_on_top),
            movable: flag(&raw.movable, defaults.movable),
            disable_button_presses: flag(&raw.disable_button_presses, defaults.disable_button_presses),
        })
    }

    /// Total number of keys (`columns * rows`).
    pub fn key_count(&self) -> u32 {
        self.columns * self.rows
    }
}

impl From<&DeviceDescriptor> for RawDeviceConfig {
    fn from(d: &DeviceDescriptor) -> Self {
        Self {
            id: Some(d.id.as_str().into()),
            columns: Some(i64::from(d.columns).into()),
            rows: Some(i64::from(d.rows).into()),
            bitmap: Some(i64::from(d.bitmap).into()),
            background_color: Some(d.background_color.as_str().into()),
            background_opacity: Some(i64::from(d.background_opacity).into()),
            always_on_top: Some(d.always_on_top.into()),
            movable: Some(d.movable.into()),
            disable_button_presses: Some(d.disable_button_presses.into()),
        }
    }
}

/// Validates every raw entry, dropping (and logging) the ones that cannot be
/// repaired.  Order is preserved; the first occurrence of an id wins.
pub fn load_descriptors(raws: &[RawDeviceConfig]) -> Vec<DeviceDescriptor> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raws.len());

    for (index, raw) in raws.iter().enumerate() {
        let result = DeviceDescriptor::from_raw(index, raw).and_then(|d| {
            if seen.insert(d.id.clone()) {
                Ok(d)
            } else {
                Err(DescriptorError::DuplicateId(d.id))
            }
        });
        match result {
            Ok(d) => out.push(d),
            Err(e) => warn!("dropping device configuration: {e}"),
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
