//! Command verbs.
//!
//! Only the verb is modelled here; positional parameters and trailing text
//! live on [`Message`](crate::Message). Matching is case-sensitive, so
//! `privmsg` is not `PRIVMSG` and ends up as [`Command::Raw`].

use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;

/// Numeric reply codes the service sends during login and joins.
pub mod numeric {
    /// 001 - welcome.
    pub const RPL_WELCOME: u16 = 1;
    /// 002 - host.
    pub const RPL_YOURHOST: u16 = 2;
    /// 003 - creation date.
    pub const RPL_CREATED: u16 = 3;
    /// 004 - server info.
    pub const RPL_MYINFO: u16 = 4;
    /// 353 - names list.
    pub const RPL_NAMREPLY: u16 = 353;
    /// 366 - end of names list.
    pub const RPL_ENDOFNAMES: u16 = 366;
    /// 372 - MOTD line.
    pub const RPL_MOTD: u16 = 372;
    /// 375 - MOTD start.
    pub const RPL_MOTDSTART: u16 = 375;
    /// 376 - MOTD end; the last line of the login burst.
    pub const RPL_ENDOFMOTD: u16 = 376;
    /// 421 - unknown command.
    pub const ERR_UNKNOWNCOMMAND: u16 = 421;
}

/// A protocol verb.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(clippy::upper_case_acronyms)]
pub enum Command {
    /// Chat message to a room or user.
    PRIVMSG,
    /// Server or room notice.
    NOTICE,
    /// Keep-alive probe.
    PING,
    /// Keep-alive reply.
    PONG,
    /// Join a room.
    JOIN,
    /// Leave a room.
    PART,
    /// Capability negotiation.
    CAP,
    /// Password (OAuth token).
    PASS,
    /// Nickname.
    NICK,
    /// Room moderation settings.
    ROOMSTATE,
    /// Per-room state of the authenticated user.
    USERSTATE,
    /// Global state of the authenticated user.
    GLOBALUSERSTATE,
    /// Subscription, raid and similar room events.
    USERNOTICE,
    /// Chat cleared, or a user timed out or banned.
    CLEARCHAT,
    /// A single message deleted.
    CLEARMSG,
    /// Host mode started or stopped.
    HOSTTARGET,
    /// Private whisper.
    WHISPER,
    /// Server asks clients to reconnect.
    RECONNECT,
    /// Three-digit numeric reply.
    Numeric(u16),
    /// Anything else, verbatim.
    Raw(String),
}

impl Command {
    /// Whether this command marks the end of a successful login.
    pub fn is_ready(&self) -> bool {
        matches!(self, Command::Numeric(numeric::RPL_ENDOFMOTD))
    }

    /// Wire spelling of the verb.
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        use std::borrow::Cow;

        Cow::Borrowed(match self {
            Command::PRIVMSG => "PRIVMSG",
            Command::NOTICE => "NOTICE",
            Command::PING => "PING",
            Command::PONG => "PONG",
            Command::JOIN => "JOIN",
            Command::PART => "PART",
            Command::CAP => "CAP",
            Command::PASS => "PASS",
            Command::NICK => "NICK",
            Command::ROOMSTATE => "ROOMSTATE",
            Command::USERSTATE => "USERSTATE",
            Command::GLOBALUSERSTATE => "GLOBALUSERSTATE",
            Command::USERNOTICE => "USERNOTICE",
            Command::CLEARCHAT => "CLEARCHAT",
            Command::CLEARMSG => "CLEARMSG",
            Command::HOSTTARGET => "HOSTTARGET",
            Command::WHISPER => "WHISPER",
            Command::RECONNECT => "RECONNECT",
            Command::Numeric(code) => return Cow::Owned(format!("{code:03}")),
            Command::Raw(verb) => verb,
        })
    }
}

impl FromStr for Command {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cmd = match s {
            "" => return Err(MessageParseError::NoCommand),
            "PRIVMSG" => Command::PRIVMSG,
            "NOTICE" => Command::NOTICE,
            "PING" => Command::PING,
            "PONG" => Command::PONG,
            "JOIN" => Command::JOIN,
            "PART" => Command::PART,
            "CAP" => Command::CAP,
            "PASS" => Command::PASS,
            "NICK" => Command::NICK,
            "ROOMSTATE" => Command::ROOMSTATE,
            "USERSTATE" => Command::USERSTATE,
            "GLOBALUSERSTATE" => Command::GLOBALUSERSTATE,
            "USERNOTICE" => Command::USERNOTICE,
            "CLEARCHAT" => Command::CLEARCHAT,
            "CLEARMSG" => Command::CLEARMSG,
            "HOSTTARGET" => Command::HOSTTARGET,
            "WHISPER" => Command::WHISPER,
            "RECONNECT" => Command::RECONNECT,
            other if other.len() == 3 && other.bytes().all(|b| b.is_ascii_digit()) => {
                match other.parse() {
                    Ok(code) => Command::Numeric(code),
                    Err(_) => Command::Raw(other.to_owned()),
                }
            }
            other => Command::Raw(other.to_owned()),
        };
        Ok(cmd)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_verbs() {
        assert_eq!("PRIVMSG".parse::<Command>().unwrap(), Command::PRIVMSG);
        assert_eq!("ROOMSTATE".parse::<Command>().unwrap(), Command::ROOMSTATE);
        assert_eq!("RECONNECT".parse::<Command>().unwrap(), Command::RECONNECT);
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(
            "privmsg".parse::<Command>().unwrap(),
            Command::Raw("privmsg".to_owned())
        );
    }

    #[test]
    fn test_numeric() {
        let cmd: Command = "376".parse().unwrap();
        assert_eq!(cmd, Command::Numeric(376));
        assert!(cmd.is_ready());
        assert_eq!("001".parse::<Command>().unwrap(), Command::Numeric(1));
        assert!(!Command::Numeric(1).is_ready());
        assert_eq!(Command::Numeric(1).to_string(), "001");
    }

    #[test]
    fn test_non_numeric_digits_are_raw() {
        assert_eq!("1234".parse::<Command>().unwrap(), Command::Raw("1234".into()));
    }

    #[test]
    fn test_empty_is_no_command() {
        assert_eq!("".parse::<Command>(), Err(MessageParseError::NoCommand));
    }

    #[test]
    fn test_display_roundtrip() {
        for verb in ["PING", "GLOBALUSERSTATE", "CLEARMSG", "FOO", "366"] {
            assert_eq!(verb.parse::<Command>().unwrap().to_string(), verb);
        }
    }
}
