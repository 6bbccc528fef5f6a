//! Typed satellite protocol messages.
//!
//! # Verbs
//!
//! | Verb          | Direction      | Meaning                                  |
//! |---------------|----------------|------------------------------------------|
//! | `BEGIN`       | peer → bridge  | Session announcement (versions)          |
//! | `PING`/`PONG` | both           | Keep-alive echo                          |
//! | `ADD-DEVICE`  | both           | Registration request / acknowledgment    |
//! | `REMOVE-DEVICE` | bridge → peer | Forget a registration                   |
//! | `KEY-PRESS`   | bridge → peer  | Local key pressed or released            |
//! | `KEY-STATE`   | peer → bridge  | Per-key visual update                    |
//! | `KEYS-CLEAR`  | peer → bridge  | Blank every key of one device            |
//!
//! Incoming lines are turned into [`SatelliteMessage`] by
//! [`SatelliteMessage::from_command`].  Unrecognised verbs become
//! [`SatelliteMessage::Unknown`] so the caller can ignore them; nothing in
//! this module ever fails.

use crate::domain::device::DeviceDescriptor;
use crate::domain::key::{decode_text, KeyImage, KeyPos, KeyVisualState};
use crate::protocol::command::{encode_raw, Command, CommandBuilder, ParamValue, Params};

pub const VERB_BEGIN: &str = "BEGIN";
pub const VERB_PING: &str = "PING";
pub const VERB_PONG: &str = "PONG";
pub const VERB_ADD_DEVICE: &str = "ADD-DEVICE";
pub const VERB_REMOVE_DEVICE: &str = "REMOVE-DEVICE";
pub const VERB_KEY_PRESS: &str = "KEY-PRESS";
pub const VERB_KEY_STATE: &str = "KEY-STATE";
pub const VERB_KEYS_CLEAR: &str = "KEYS-CLEAR";

/// The capability/version information the peer sends in `BEGIN`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerAnnouncement {
    /// All parameters as announced; consumed opaquely except for versions.
    pub params: Params,
}

impl PeerAnnouncement {
    /// `ApiVersion=` if present.
    pub fn api_version(&self) -> Option<&str> {
        self.params.get_str("APIVERSION")
    }

    /// `CompanionVersion=` if present.
    pub fn companion_version(&self) -> Option<&str> {
        self.params.get_str("COMPANIONVERSION")
    }

    /// The most specific version string available for status reporting.
    pub fn version(&self) -> Option<&str> {
        self.api_version().or_else(|| self.companion_version())
    }
}

/// A `KEY-STATE` update exactly as received (payloads still base64).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStateUpdate {
    pub device_id: String,
    /// Either `row/col` or a flat index; resolved against the device grid later.
    pub key: String,
    pub bitmap: Option<String>,
    pub text: Option<String>,
    /// Background colour (`COLOR=`).
    pub color: Option<String>,
    /// Foreground colour (`TEXT_COLOR=`).
    pub text_color: Option<String>,
}

impl KeyStateUpdate {
    /// Resolves the key address against a `columns × rows` grid.
    pub fn position(&self, columns: u32, rows: u32) -> KeyPos {
        KeyPos::from_address(&self.key, columns, rows)
    }

    /// Decodes the payloads into a partial visual state.
    ///
    /// A bitmap or text that fails to decode is treated as absent.
    pub fn visual_state(&self) -> KeyVisualState {
        KeyVisualState {
            text: self.text.as_deref().and_then(decode_text),
            color: self.text_color.clone(),
            bg_color: self.color.clone(),
            image: self.bitmap.as_deref().and_then(KeyImage::from_base64),
        }
    }
}

/// One decoded incoming line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatelliteMessage {
    Begin(PeerAnnouncement),
    Ping {
        /// Raw body, echoed back verbatim in the `PONG`.
        body: String,
    },
    Pong,
    AddDeviceAck {
        /// Empty when the peer omitted `DEVICEID`; never matches a device.
        device_id: String,
        ok: bool,
        error: Option<String>,
    },
    KeysClear {
        device_id: String,
    },
    KeyState(KeyStateUpdate),
    Unknown {
        verb: String,
    },
}

impl SatelliteMessage {
    /// Classifies a parsed command by verb.
    pub fn from_command(cmd: Command) -> Self {
        let device_id = || cmd.params.get_str("DEVICEID").unwrap_or_default().to_string();

        match cmd.verb.as_str() {
            VERB_BEGIN => SatelliteMessage::Begin(PeerAnnouncement {
                params: cmd.params.clone(),
            }),
            VERB_PING => SatelliteMessage::Ping {
                body: cmd.body.clone(),
            },
            VERB_PONG => SatelliteMessage::Pong,
            VERB_ADD_DEVICE => {
                let error = ack_error(&cmd.params);
                SatelliteMessage::AddDeviceAck {
                    device_id: device_id(),
                    ok: cmd.params.get_bool("OK") == Some(true),
                    error,
                }
            }
            VERB_KEYS_CLEAR => SatelliteMessage::KeysClear {
                device_id: device_id(),
            },
            VERB_KEY_STATE => SatelliteMessage::KeyState(KeyStateUpdate {
                device_id: device_id(),
                key: cmd.params.get_str("KEY").unwrap_or_default().to_string(),
                bitmap: cmd.params.get_str("BITMAP").map(str::to_string),
                text: cmd.params.get_str("TEXT").map(str::to_string),
                color: cmd.params.get_str("COLOR").map(str::to_string),
                text_color: cmd.params.get_str("TEXT_COLOR").map(str::to_string),
            }),
            _ => SatelliteMessage::Unknown {
                verb: cmd.verb.clone(),
            },
        }
    }

    /// Parses one line straight into a message.
    pub fn parse(line: &str) -> Self {
        Self::from_command(Command::parse(line))
    }
}

/// Extracts the failure reason of an `ADD-DEVICE` acknowledgment, if any.
///
/// Accepts both `ERROR=<text>` and a bare `ERROR` flag (with the reason in
/// `MESSAGE=`).  `ERROR=0` means "no error".
fn ack_error(params: &Params) -> Option<String> {
    match params.get("ERROR")? {
        ParamValue::Flag => Some(
            params
                .get_str("MESSAGE")
                .unwrap_or("unspecified error")
                .to_string(),
        ),
        ParamValue::Value(v) => {
            if params.get_bool("ERROR") == Some(false) {
                None
            } else {
                Some(v.clone())
            }
        }
    }
}

// ── Outgoing commands ─────────────────────────────────────────────────────────

/// `ADD-DEVICE` registration for `device`.
pub fn add_device(device: &DeviceDescriptor, product_name: &str) -> String {
    CommandBuilder::new(VERB_ADD_DEVICE)
        .arg("DEVICEID", device.id.as_str())
        .arg("PRODUCT_NAME", product_name)
        .arg("KEYS_TOTAL", device.key_count())
        .arg("KEYS_PER_ROW", device.columns)
        .arg("BITMAPS", device.bitmap)
        .arg("COLORS", true)
        .arg("TEXT", true)
        .arg("TEXT_STYLE", false)
        .encode()
}

/// `REMOVE-DEVICE` for a registration the bridge no longer wants.
pub fn remove_device(device_id: &str) -> String {
    CommandBuilder::new(VERB_REMOVE_DEVICE)
        .arg("DEVICEID", device_id)
        .encode()
}

/// `KEY-PRESS` for the flat key `index`.
pub fn key_press(device_id: &str, index: u32, pressed: bool) -> String {
    CommandBuilder::new(VERB_KEY_PRESS)
        .arg("DEVICEID", device_id)
        .arg("KEY", index)
        .arg("PRESSED", pressed)
        .encode()
}

/// `PONG` echoing the body of a received `PING`.
pub fn pong(body: &str) -> String {
    encode_raw(VERB_PONG, body)
}

/// Keep-alive `PING` carrying an opaque token.
pub fn ping(token: &str) -> String {
    encode_raw(VERB_PING, token)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
