use crate::chan::ChannelExt;
use crate::command::Command;
use crate::source::Source;

use super::tags::Tags;

/// An owned chat protocol message.
///
/// Produced by parsing one wire line, or built with the constructors below
/// for outbound traffic.
///
/// # Example
///
/// ```
/// use shardchat_proto::{Command, Message};
///
/// let msg: Message = ":bob!bob@bob.tmi.twitch.tv PRIVMSG #room :Hello!".parse().unwrap();
/// assert_eq!(msg.command, Command::PRIVMSG);
/// assert_eq!(msg.channel(), Some("#room"));
///
/// let out = Message::privmsg("#room", "Hi back");
/// assert_eq!(out.to_string(), "PRIVMSG #room :Hi back");
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// The line this message was parsed from. Empty for constructed messages.
    pub raw: String,
    /// Tag block.
    pub tags: Option<Tags>,
    /// Message source.
    pub source: Option<Source>,
    /// The verb.
    pub command: Command,
    /// Positional parameters, in order.
    pub params: Vec<String>,
    /// Free text after the `:` marker.
    pub trailing: Option<String>,
}

impl Message {
    /// A bare message with only a command.
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            raw: String::new(),
            tags: None,
            source: None,
            command,
            params: Vec::new(),
            trailing: None,
        }
    }

    /// Append a positional parameter.
    #[must_use]
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Set the trailing text.
    #[must_use]
    pub fn with_trailing(mut self, text: impl Into<String>) -> Self {
        self.trailing = Some(text.into());
        self
    }

    /// Add or replace a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.get_or_insert_with(Tags::new).insert(key, value);
        self
    }

    /// Set the source.
    #[must_use]
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// `PRIVMSG <target> :<text>`
    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Command::PRIVMSG)
            .with_param(target)
            .with_trailing(text)
    }

    /// `JOIN <channel>`
    #[must_use]
    pub fn join(channel: impl Into<String>) -> Self {
        Self::new(Command::JOIN).with_param(channel)
    }

    /// `PART <channel>`
    #[must_use]
    pub fn part(channel: impl Into<String>) -> Self {
        Self::new(Command::PART).with_param(channel)
    }

    /// `PING :<token>`
    #[must_use]
    pub fn ping(token: impl Into<String>) -> Self {
        Self::new(Command::PING).with_trailing(token)
    }

    /// `PONG :<payload>`
    #[must_use]
    pub fn pong(payload: impl Into<String>) -> Self {
        Self::new(Command::PONG).with_trailing(payload)
    }

    /// `PASS <password>`
    #[must_use]
    pub fn pass(password: impl Into<String>) -> Self {
        Self::new(Command::PASS).with_param(password)
    }

    /// `NICK <nickname>`
    #[must_use]
    pub fn nick(nickname: impl Into<String>) -> Self {
        Self::new(Command::NICK).with_param(nickname)
    }

    /// `CAP REQ :<cap> <cap> ...`
    #[must_use]
    pub fn cap_req<S: AsRef<str>>(capabilities: &[S]) -> Self {
        let caps: Vec<&str> = capabilities.iter().map(AsRef::as_ref).collect();
        Self::new(Command::CAP)
            .with_param("REQ")
            .with_trailing(caps.join(" "))
    }

    /// Value of a tag, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.as_ref()?.get(key)
    }

    /// Positional parameter by index.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// First parameter, when it names a channel.
    pub fn channel(&self) -> Option<&str> {
        self.param(0).filter(|p| p.is_channel_name())
    }

    /// Trailing text.
    pub fn text(&self) -> Option<&str> {
        self.trailing.as_deref()
    }

    /// Nickname of the sender, if the source is a user.
    pub fn source_nickname(&self) -> Option<&str> {
        self.source.as_ref()?.nick()
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::new(command)
    }
}
