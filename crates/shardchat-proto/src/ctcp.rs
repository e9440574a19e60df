//! CTCP ACTION handling.
//!
//! `/me` messages arrive as `PRIVMSG #room :\x01ACTION waves\x01`. Only
//! ACTION carries meaning in chat; other CTCP verbs are surfaced as
//! [`CtcpKind::Unknown`] so callers can ignore them.
//!
//! # Example
//!
//! ```
//! use shardchat_proto::ctcp::{Ctcp, CtcpKind};
//!
//! let ctcp = Ctcp::parse("\x01ACTION waves hello\x01").unwrap();
//! assert_eq!(ctcp.kind, CtcpKind::Action);
//! assert_eq!(ctcp.params, Some("waves hello"));
//!
//! assert_eq!(Ctcp::action("dances").to_string(), "\x01ACTION dances\x01");
//! ```

use std::fmt;

/// The CTCP delimiter character (`\x01`).
pub const CTCP_DELIM: char = '\x01';

/// CTCP verb.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CtcpKind {
    /// `/me` text.
    Action,
    /// Anything else.
    Unknown(String),
}

impl CtcpKind {
    /// Parse a verb, case-insensitively.
    pub fn parse(name: &str) -> Self {
        if name.eq_ignore_ascii_case("ACTION") {
            Self::Action
        } else {
            Self::Unknown(name.to_owned())
        }
    }

    /// Canonical spelling.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Action => "ACTION",
            Self::Unknown(s) => s,
        }
    }
}

impl fmt::Display for CtcpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CTCP payload borrowed from a message body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ctcp<'a> {
    /// The verb.
    pub kind: CtcpKind,
    /// Text after the verb.
    pub params: Option<&'a str>,
}

impl<'a> Ctcp<'a> {
    /// Parse a PRIVMSG body. Returns `None` when the body is not CTCP.
    ///
    /// A missing closing delimiter is tolerated.
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.strip_prefix(CTCP_DELIM)?;
        let text = text.strip_suffix(CTCP_DELIM).unwrap_or(text);
        if text.is_empty() {
            return None;
        }

        let (command, params) = match text.split_once(' ') {
            Some((command, params)) => (command, Some(params).filter(|p| !p.is_empty())),
            None => (text, None),
        };

        Some(Self {
            kind: CtcpKind::parse(command),
            params,
        })
    }

    /// Whether a body is wrapped in CTCP delimiters.
    #[inline]
    pub fn is_ctcp(text: &str) -> bool {
        text.starts_with(CTCP_DELIM)
    }

    /// An ACTION payload for outbound `/me`.
    pub fn action(text: &'a str) -> Self {
        Self {
            kind: CtcpKind::Action,
            params: Some(text),
        }
    }
}

impl fmt::Display for Ctcp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CTCP_DELIM}{}", self.kind)?;
        if let Some(params) = self.params {
            write!(f, " {params}")?;
        }
        write!(f, "{CTCP_DELIM}")
    }
}

/// Split a chat body into its visible text and whether it was an ACTION.
///
/// Non-ACTION CTCP bodies are returned unchanged.
pub fn strip_action(text: &str) -> (&str, bool) {
    match Ctcp::parse(text) {
        Some(Ctcp {
            kind: CtcpKind::Action,
            params,
        }) => (params.unwrap_or(""), true),
        _ => (text, false),
    }
}
