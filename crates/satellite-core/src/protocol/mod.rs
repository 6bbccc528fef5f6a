//! Line protocol: framing, tokenizing, command grammar, and typed messages.
//!
//! ```text
//! TCP bytes ─► framing::LineSplitter ─► command::Command::parse ─► messages::SatelliteMessage
//! ```

pub mod command;
pub mod framing;
pub mod messages;
pub mod tokenizer;

pub use command::{Command, CommandBuilder, ParamValue, Params};
pub use framing::LineSplitter;
pub use messages::{KeyStateUpdate, PeerAnnouncement, SatelliteMessage};
pub use tokenizer::tokenize;
