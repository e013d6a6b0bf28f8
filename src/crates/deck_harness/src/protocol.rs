//! Line-level model of the deck's command/response protocol.
//!
//! Commands are single `VERB:args` lines. Responses are ASCII lines tagged by
//! the text before their first colon (`CTRL:`, `MOVE:`, `STATUS:`, ...).

use std::fmt;

pub const STATUS_TAG: &str = "STATUS";
pub const CTRL_TAG: &str = "CTRL";

/// Token a status line carries once the channel has stopped moving.
pub const IDLE_TOKEN: &str = "STATE=IDLE";
/// Token the MOVE reply carries when a request was clamped to the soft limit.
pub const LIMIT_CLIPPED_TOKEN: &str = "MOVE:LIMIT_CLIPPED=1";
/// Firmware error code reported after a soft-limit violation.
pub const LIMIT_ERROR_CODE: &str = "ERR_LIMIT";

/// Request sent to the deck as one newline-terminated line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Home(u8),
    Wake(u8),
    Sleep(u8),
    Move { channel: u8, steps: i32 },
    Status(u8),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Home(channel) => write!(f, "HOME:{channel}"),
            Command::Wake(channel) => write!(f, "WAKE:{channel}"),
            Command::Sleep(channel) => write!(f, "SLEEP:{channel}"),
            Command::Move { channel, steps } => write!(f, "MOVE:{channel},{steps}"),
            Command::Status(channel) => write!(f, "STATUS:{channel}"),
        }
    }
}

/// One decoded, trimmed line received from the deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine(String);

impl ResponseLine {
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    /// Decode raw bytes, dropping anything outside ASCII and trimming whitespace.
    ///
    /// Returns `None` when nothing printable is left.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        let text: String = raw
            .iter()
            .filter(|byte| byte.is_ascii())
            .map(|byte| char::from(*byte))
            .collect();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text before the first `:`, if the line has one.
    pub fn tag(&self) -> Option<&str> {
        self.0.split_once(':').map(|(tag, _)| tag)
    }

    pub fn is_ctrl(&self) -> bool {
        self.tag() == Some(CTRL_TAG)
    }

    /// Acknowledgement code of a `CTRL:` line (`OK`, `READY`, `ERR_BUSY`, ...).
    pub fn ctrl_code(&self) -> Option<&str> {
        self.0.strip_prefix("CTRL:").map(str::trim)
    }

    /// True for `CTRL:` lines whose code is one of the firmware's `ERR_*` labels.
    pub fn is_rejection(&self) -> bool {
        self.ctrl_code()
            .map(|code| code.starts_with("ERR_"))
            .unwrap_or(false)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }
}

impl fmt::Display for ResponseLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A response line tagged `STATUS:`.
///
/// `is_idle` and `has_error` match literal tokens anywhere in the line, which
/// is the contract the firmware guarantees. The `field` accessors split the
/// body into `KEY=VALUE` tokens on spaces and commas for finer inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine(ResponseLine);

impl StatusLine {
    /// Wrap a response line if and only if its tag is exactly `STATUS`.
    pub fn from_line(line: &ResponseLine) -> Option<Self> {
        (line.tag() == Some(STATUS_TAG)).then(|| Self(line.clone()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_idle(&self) -> bool {
        self.0.contains(IDLE_TOKEN)
    }

    pub fn has_error(&self, code: &str) -> bool {
        self.0.contains(&format!("ERR={code}"))
    }

    /// Value of the first `key=value` token in the body.
    pub fn field(&self, key: &str) -> Option<&str> {
        let body = self.as_str().split_once(':').map(|(_, body)| body)?;
        body.split(|c: char| c == ' ' || c == ',')
            .filter_map(|token| token.split_once('='))
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value)
    }

    pub fn state(&self) -> Option<&str> {
        self.field("STATE")
    }

    pub fn error(&self) -> Option<&str> {
        self.field("ERR")
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// First line tagged exactly `STATUS`, preserving device order.
pub fn extract_status_line(lines: &[ResponseLine]) -> Option<StatusLine> {
    lines.iter().find_map(StatusLine::from_line)
}
