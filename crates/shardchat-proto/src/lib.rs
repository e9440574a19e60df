//! # shardchat-proto
//!
//! Parsing and serialization for the tag-annotated IRC dialect spoken by
//! Twitch chat.
//!
//! ## Features
//!
//! - Line parsing into tags, source, command, parameters and trailing text
//! - Deterministic serialization back to wire form
//! - Tag value escaping, badge and timestamp decoding
//! - CTCP ACTION detection
//! - Optional Tokio line codec
//!
//! ## Quick Start
//!
//! ```rust
//! use shardchat_proto::{Command, Message};
//!
//! let raw = "@display-name=Bob;tmi-sent-ts=1507246572675 :bob!bob@bob.tmi.twitch.tv PRIVMSG #room :Hello!";
//! let message: Message = raw.parse().expect("valid line");
//!
//! assert_eq!(message.command, Command::PRIVMSG);
//! assert_eq!(message.tag("display-name"), Some("Bob"));
//! assert_eq!(message.text(), Some("Hello!"));
//!
//! let reply = Message::privmsg("#room", "hi").with_tag("reply-parent-msg-id", "abc");
//! assert_eq!(reply.to_string(), "@reply-parent-msg-id=abc PRIVMSG #room :hi");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod badge;
pub mod chan;
pub mod command;
pub mod ctcp;
pub mod error;
pub mod format;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod source;
pub mod util;

pub use self::badge::{parse_badges, Badge, Badges};
pub use self::chan::ChannelExt;
pub use self::command::{numeric, Command};
pub use self::ctcp::{Ctcp, CtcpKind};
pub use self::error::{MessageParseError, ProtocolError};
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
pub use self::message::{Message, Tags};
pub use self::source::Source;
pub use self::util::parse_sent_ts;
