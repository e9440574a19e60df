//! Message source types.
//!
//! The source identifies who sent a message: a bare host for server-origin
//! lines (`tmi.twitch.tv`) or a `nick!user@host` mask for users.

use std::str::FromStr;

use crate::error::MessageParseError;

/// Origin of a message.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Source {
    /// Nickname, absent for server-origin lines.
    pub nickname: Option<String>,
    /// Username, absent for server-origin lines.
    pub username: Option<String>,
    /// Host; always present.
    pub host: String,
}

impl Source {
    /// A server-origin source.
    pub fn server(host: impl Into<String>) -> Self {
        Self {
            nickname: None,
            username: None,
            host: host.into(),
        }
    }

    /// A user source from its three components.
    pub fn user(
        nick: impl Into<String>,
        user: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            nickname: Some(nick.into()),
            username: Some(user.into()),
            host: host.into(),
        }
    }

    /// Whether this is a server-origin source.
    pub fn is_server(&self) -> bool {
        self.nickname.is_none()
    }

    /// Nickname, if any.
    pub fn nick(&self) -> Option<&str> {
        self.nickname.as_deref()
    }
}

impl FromStr for Source {
    type Err = MessageParseError;

    /// Parse a source token without its leading `:`.
    ///
    /// Splits on `!` or `@` into at most three segments: one is a host, two
    /// are `nick@host` (username = nickname), three are `nick!user@host`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(MessageParseError::InvalidSource);
        }

        let mut segments = s.splitn(3, ['!', '@']);
        Ok(match (segments.next(), segments.next(), segments.next()) {
            (Some(nick), Some(user), Some(host)) => Source::user(nick, user, host),
            (Some(nick), Some(host), None) => Source::user(nick, nick, host),
            _ => Source::server(s),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_name() {
        let s: Source = "tmi.twitch.tv".parse().unwrap();
        assert_eq!(s, Source::server("tmi.twitch.tv"));
        assert!(s.is_server());
        assert_eq!(s.nick(), None);
    }

    #[test]
    fn test_parse_nick_user_host() {
        let s: Source = "bob!bob@bob.tmi.twitch.tv".parse().unwrap();
        assert_eq!(s, Source::user("bob", "bob", "bob.tmi.twitch.tv"));
    }

    #[test]
    fn test_parse_nick_host() {
        let s: Source = "alice@alice.tmi.twitch.tv".parse().unwrap();
        assert_eq!(s.nickname.as_deref(), Some("alice"));
        assert_eq!(s.username.as_deref(), Some("alice"));
        assert_eq!(s.host, "alice.tmi.twitch.tv");
    }

    #[test]
    fn test_parse_empty_is_invalid() {
        assert_eq!("".parse::<Source>(), Err(MessageParseError::InvalidSource));
    }

    #[test]
    fn test_display() {
        assert_eq!(Source::server("tmi.twitch.tv").to_string(), "tmi.twitch.tv");
        assert_eq!(Source::user("a", "b", "c").to_string(), "a!b@c");
        let partial = Source {
            nickname: Some("a".into()),
            username: None,
            host: "c".into(),
        };
        assert_eq!(partial.to_string(), "a!a@c");
    }
}
