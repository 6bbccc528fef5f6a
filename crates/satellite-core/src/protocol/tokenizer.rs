//! Splits a command body into space-separated tokens.
//!
//! Rules:
//!
//! - Tokens are separated by runs of spaces.
//! - A double quote toggles "quoted" mode; spaces inside quotes belong to the
//!   token.  The quote characters themselves are not emitted.
//! - A backslash emits the following character literally (inside or outside
//!   quotes).  The backslash itself is not emitted.
//! - A missing closing quote is tolerated: the final token is still flushed.
//!
//! ```rust
//! use satellite_core::protocol::tokenize;
//!
//! assert_eq!(tokenize(r#"A B="x y" C"#), vec!["A", "B=x y", "C"]);
//! ```

/// Tokenizes `body` according to the module rules.  Never fails.
pub fn tokenize(body: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // A token can be "started" yet empty, e.g. `""`.
    let mut started = false;
    let mut in_quotes = false;
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
                started = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                started = true;
            }
            ' ' if !in_quotes => {
                if started {
                    tokens.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            other => {
                current.push(other);
                started = true;
            }
        }
    }

    if started {
        tokens.push(current);
    }
    tokens
}

// ── Tests ─────────────────────────────────────────────────────────────────────
