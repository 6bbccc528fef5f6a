//! Command line grammar: `VERB [KEY=VALUE | FLAG]...`.
//!
//! # Decoding
//!
//! ```text
//! ADD-DEVICE OK DEVICEID="dev 1"
//! └─verb───┘ └┬┘ └─────┬──────┘
//!           flag   key=value (quotes removed by the tokenizer)
//! ```
//!
//! The verb is matched case-insensitively and normalised to upper case.
//! Parameter keys are normalised the same way.  Decoding never fails: a body
//! that does not tokenize into anything useful simply yields an empty
//! [`Params`] map and the caller decides what the verb means without it.
//!
//! # Encoding
//!
//! [`CommandBuilder`] renders parameters as `KEY=VALUE`: booleans as `1`/`0`,
//! integers as decimal text, strings wrapped in double quotes.  String
//! content is *not* escaped, so callers must not embed quotes or newlines.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::protocol::tokenizer::tokenize;

// ── Decoding ──────────────────────────────────────────────────────────────────

/// A single decoded parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// A bare token with no `=` (`OK`, `ERROR`); reads as boolean `true`.
    Flag,
    /// The text after the first `=`.
    Value(String),
}

/// Decoded parameters of one command line, keyed by upper-cased name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: BTreeMap<String, ParamValue>,
}

impl Params {
    /// Builds a parameter map from already-tokenized body tokens.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = BTreeMap::new();
        for token in tokens {
            let token = token.as_ref();
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k, ParamValue::Value(v.to_string())),
                None => (token, ParamValue::Flag),
            };
            if key.is_empty() {
                continue;
            }
            entries.insert(key.to_ascii_uppercase(), value);
        }
        Self { entries }
    }

    /// Returns `true` if the key was present at all (flag or value).
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the raw parameter.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    /// Returns the string value; flags have no string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            ParamValue::Value(v) => Some(v.as_str()),
            ParamValue::Flag => None,
        }
    }

    /// Interprets the parameter as a boolean.
    ///
    /// A bare flag is `true`; `1`/`true`/`yes` and `0`/`false`/`no` are
    /// recognised case-insensitively.  Anything else is `None`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.entries.get(key)? {
            ParamValue::Flag => Some(true),
            ParamValue::Value(v) => match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Some(true),
                "0" | "false" | "no" => Some(false),
                _ => None,
            },
        }
    }

    /// Parses the value as a decimal integer.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get_str(key)?.trim().parse().ok()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no parameter was recovered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// One decoded command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Upper-cased verb, e.g. `KEY-STATE`.
    pub verb: String,
    /// Everything after the first space, untouched (needed to echo `PING`).
    pub body: String,
    /// Best-effort parameter map recovered from `body`.
    pub params: Params,
}

impl Command {
    /// Parses a single line (without its newline).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use satellite_core::Command;
    ///
    /// let cmd = Command::parse(r#"key-state DEVICEID="dev1" KEY=3"#);
    /// assert_eq!(cmd.verb, "KEY-STATE");
    /// assert_eq!(cmd.params.get_str("DEVICEID"), Some("dev1"));
    /// assert_eq!(cmd.params.get_int("KEY"), Some(3));
    /// ```
    pub fn parse(line: &str) -> Self {
        let (verb, body) = match line.split_once(' ') {
            Some((verb, body)) => (verb, body),
            None => (line, ""),
        };
        Self {
            verb: verb.to_ascii_uppercase(),
            body: body.to_string(),
            params: Params::from_tokens(tokenize(body)),
        }
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// A typed outgoing parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<u32> for ArgValue {
    fn from(v: u32) -> Self {
        ArgValue::Int(i64::from(v))
    }
}

impl From<usize> for ArgValue {
    fn from(v: usize) -> Self {
        ArgValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Text(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Text(v)
    }
}

/// Builds an outgoing command line with parameters in insertion order.
///
/// ```rust
/// use satellite_core::CommandBuilder;
///
/// let line = CommandBuilder::new("KEY-PRESS")
///     .arg("DEVICEID", "dev1")
///     .arg("KEY", 12u32)
///     .arg("PRESSED", true)
///     .encode();
/// assert_eq!(line, "KEY-PRESS DEVICEID=\"dev1\" KEY=12 PRESSED=1\n");
/// ```
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    verb: String,
    args: Vec<(String, ArgValue)>,
}

impl CommandBuilder {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            args: Vec::new(),
        }
    }

    /// Appends a `KEY=VALUE` parameter.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.push((key.into(), value.into()));
        self
    }

    /// Renders the line, newline included.
    pub fn encode(&self) -> String {
        let mut line = self.verb.clone();
        for (key, value) in &self.args {
            line.push(' ');
            // Writing into a String cannot fail.
            let _ = match value {
                ArgValue::Bool(b) => write!(line, "{key}={}", u8::from(*b)),
                ArgValue::Int(n) => write!(line, "{key}={n}"),
                ArgValue::Text(s) => write!(line, "{key}=\"{s}\""),
            };
        }
        terminate(line)
    }
}

/// Renders `VERB body` with the body passed through verbatim.
///
/// Used to echo a `PING` body back in a `PONG`.
pub fn encode_raw(verb: &str, body: &str) -> String {
    if body.is_empty() {
        terminate(verb.to_string())
    } else {
        terminate(format!("{verb} {body}"))
    }
}

fn terminate(mut line: String) -> String {
    if !line.ends_with('\n') {
        line.push('\n');
    }
    line
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalises_verb_to_upper_case() {
        let cmd = Command::parse("begin ApiVersion=1.0.0");
        assert_eq!(cmd.verb, "BEGIN");
    }

    #[test]
    fn test_parse_keeps_raw_body() {
        let cmd = Command::parse("PING  some  token ");
        assert_eq!(cmd.body, " some  token ");
    }

    #[test]
    fn test_parse_verb_only_has_empty_params() {
        // Arrange / Act
        let cmd = Command::parse("PONG");

        // Assert
        assert_eq!(cmd.verb, "PONG");
        assert_eq!(cmd.body, "");
        assert!(cmd.params.is_empty());
    }

    #[test]
    fn test_parse_flag_reads_as_true() {
        let cmd = Command::parse("ADD-DEVICE OK DEVICEID=dev1");
        assert_eq!(cmd.params.get("OK"), Some(&ParamValue::Flag));
        assert_eq!(cmd.params.get_bool("OK"), Some(true));
        assert_eq!(cmd.params.get_str("OK"), None);
    }

    #[test]
    fn test_parse_splits_on_first_equals_only() {
        let cmd = Command::parse("X TEXT=a=b=c");
        assert_eq!(cmd.params.get_str("TEXT"), Some("a=b=c"));
    }

    #[test]
    fn test_parse_upper_cases_keys() {
        let cmd = Command::parse("BEGIN apiVersion=1.2.3");
        assert_eq!(cmd.params.get_str("APIVERSION"), Some("1.2.3"));
    }

    #[test]
    fn test_get_bool_recognises_numeric_and_words() {
        let cmd = Command::parse("X A=1 B=0 C=true D=No E=maybe");
        assert_eq!(cmd.params.get_bool("A"), Some(true));
        assert_eq!(cmd.params.get_bool("B"), Some(false));
        assert_eq!(cmd.params.get_bool("C"), Some(true));
        assert_eq!(cmd.params.get_bool("D"), Some(false));
        assert_eq!(cmd.params.get_bool("E"), None);
        assert_eq!(cmd.params.get_bool("MISSING"), None);
    }

    #[test]
    fn test_token_with_empty_key_is_skipped() {
        let cmd = Command::parse("X =orphan KEY=1");
        assert_eq!(cmd.params.len(), 1);
        assert_eq!(cmd.params.get_int("KEY"), Some(1));
    }

    #[test]
    fn test_encode_renders_bool_int_and_quoted_text() {
        // Arrange
        let builder = CommandBuilder::new("ADD-DEVICE")
            .arg("DEVICEID", "dev1")
            .arg("KEYS_TOTAL", 32u32)
            .arg("COLORS", true)
            .arg("TEXT_STYLE", false);

        // Act
        let line = builder.encode();

        // Assert
        assert_eq!(
            line,
            "ADD-DEVICE DEVICEID=\"dev1\" KEYS_TOTAL=32 COLORS=1 TEXT_STYLE=0\n"
        );
    }

    #[test]
    fn test_encode_without_args_is_verb_and_newline() {
        assert_eq!(CommandBuilder::new("PING").encode(), "PING\n");
    }

    #[test]
    fn test_encode_negative_int_is_decimal() {
        let line = CommandBuilder::new("X").arg("N", -5i64).encode();
        assert_eq!(line, "X N=-5\n");
    }

    #[test]
    fn test_encode_raw_echoes_body_verbatim() {
        assert_eq!(encode_raw("PONG", "abc \"q\""), "PONG abc \"q\"\n");
        assert_eq!(encode_raw("PONG", ""), "PONG\n");
    }

    #[test]
    fn test_encode_raw_does_not_double_terminate() {
        assert_eq!(encode_raw("PONG", "x\n"), "PONG x\n");
    }

    #[test]
    fn test_encoded_line_parses_back_to_same_values() {
        let line = CommandBuilder::new("KEY-PRESS")
            .arg("DEVICEID", "my dev")
            .arg("KEY", 7u32)
            .arg("PRESSED", true)
            .encode();

        let cmd = Command::parse(line.trim_end());

        assert_eq!(cmd.params.get_str("DEVICEID"), Some("my dev"));
        assert_eq!(cmd.params.get_int("KEY"), Some(7));
        assert_eq!(cmd.params.get_bool("PRESSED"), Some(true));
    }
}
