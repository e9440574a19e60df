//! Error types for the protocol library.
//!
//! [`MessageParseError`] covers a single malformed line; [`ProtocolError`]
//! covers everything the line codec can hit while framing the byte stream.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Extract the command name from raw line bytes (for error reporting).
///
/// Skips an optional `@tags` block and `:source` token and returns the next
/// alphanumeric run. Works on invalid UTF-8 so the codec can still report
/// which command carried the bad bytes.
pub(crate) fn extract_command_hint(raw_line: &[u8]) -> Option<String> {
    let mut pos = 0;

    for marker in [b'@', b':'] {
        if pos < raw_line.len() && raw_line[pos] == marker {
            while pos < raw_line.len() && raw_line[pos] != b' ' {
                pos += 1;
            }
            if pos < raw_line.len() && raw_line[pos] == b' ' {
                pos += 1;
            }
        }
    }

    let cmd_start = pos;
    while pos < raw_line.len() && raw_line[pos].is_ascii_alphanumeric() {
        pos += 1;
    }

    if pos > cmd_start {
        String::from_utf8(raw_line[cmd_start..pos].to_vec()).ok()
    } else {
        None
    }
}

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid UTF-8 bytes in a line.
    #[error("invalid UTF-8 in message at byte {byte_pos}: {details}")]
    InvalidUtf8 {
        /// The raw line as bytes.
        raw_line: Vec<u8>,
        /// Byte position where UTF-8 validation failed.
        byte_pos: usize,
        /// Detailed error message from the UTF-8 decoder.
        details: String,
        /// Command name recovered from the raw bytes, if any.
        command_hint: Option<String>,
    },

    /// Line exceeded the maximum allowed length.
    #[error("message too long: {actual} bytes (limit: {limit})")]
    MessageTooLong {
        /// Actual line length.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Illegal control character in a line.
    #[error("illegal control character: {0:?}")]
    IllegalControlChar(char),

    /// Failed to parse a message.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The offending line.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

/// Errors encountered when parsing a single line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// The line was empty.
    #[error("empty message")]
    EmptyMessage,

    /// The `@` tag block was empty.
    #[error("invalid tags")]
    InvalidTags,

    /// The `:` source token was empty.
    #[error("invalid source")]
    InvalidSource,

    /// No command token was present.
    #[error("no command")]
    NoCommand,

    /// Tags and/or a source were present but the line ended before the command.
    #[error("partial message")]
    PartialMessage,
}

impl MessageParseError {
    /// Static label for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "empty_message",
            Self::InvalidTags => "invalid_tags",
            Self::InvalidSource => "invalid_source",
            Self::NoCommand => "no_command",
            Self::PartialMessage => "partial_message",
        }
    }
}
