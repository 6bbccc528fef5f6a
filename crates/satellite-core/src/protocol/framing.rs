//! Newline framing for the satellite TCP stream.
//!
//! # Why a buffer is needed
//!
//! TCP is a stream protocol.  A single `read()` may return half a command
//! line, or several lines glued together.  [`LineSplitter`] accumulates the
//! raw bytes and hands out one complete line at a time, in arrival order.
//!
//! The caller drives it like this:
//!
//! ```rust
//! use satellite_core::LineSplitter;
//!
//! let mut splitter = LineSplitter::new();
//! splitter.push(b"PING 1\r\nPO");
//! assert_eq!(splitter.next_line().as_deref(), Some("PING 1"));
//! assert_eq!(splitter.next_line(), None);
//! splitter.push(b"NG 1\n");
//! assert_eq!(splitter.next_line().as_deref(), Some("PONG 1"));
//! ```
//!
//! Pulling lines one by one (instead of returning a `Vec`) lets the caller
//! finish handling a line before the next one is even extracted.

use tracing::warn;

/// Longest unterminated tail kept while waiting for a `\n`.  A peer that
/// sends more than this without a newline loses the tail.
pub const MAX_PENDING_BYTES: usize = 4 * 1024 * 1024;

/// Accumulates stream bytes and yields complete `\n`-terminated lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    /// Creates an empty splitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends newly arrived bytes to the pending buffer.
    ///
    /// Complete lines already buffered are kept; only an unterminated tail
    /// longer than [`MAX_PENDING_BYTES`] is discarded.
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        if self.pending.len() <= MAX_PENDING_BYTES {
            return;
        }
        let complete = self
            .pending
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        let tail = self.pending.len() - complete;
        if tail > MAX_PENDING_BYTES {
            warn!("discarding {tail} bytes of unterminated input");
            self.pending.truncate(complete);
        }
    }

    /// Extracts the next complete, non-empty line.
    ///
    /// One trailing `\r` is stripped.  Empty lines are skipped.  Returns
    /// `None` once no `\n` remains in the buffer; the unterminated tail stays
    /// buffered until more bytes arrive.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD rather than rejected.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop(); // the '\n'
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                continue;
            }
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
        None
    }

    /// Number of bytes waiting for a terminating newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drops any buffered partial line (used when the connection is torn down).
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
