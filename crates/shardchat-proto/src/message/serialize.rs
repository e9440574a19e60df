use std::fmt::{self, Display, Formatter, Write};

use super::tags::escape_tag_value;
use super::types::Message;

/// Writes the wire form without a line terminator; the codec adds `\r\n`.
impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(tags) = self.tags.as_ref().filter(|t| !t.is_empty()) {
            f.write_char('@')?;
            for (i, (key, value)) in tags.iter().enumerate() {
                if i > 0 {
                    f.write_char(';')?;
                }
                f.write_str(key)?;
                if !value.is_empty() {
                    f.write_char('=')?;
                    escape_tag_value(f, value)?;
                }
            }
            f.write_char(' ')?;
        }

        if let Some(ref source) = self.source {
            write!(f, ":{} ", source)?;
        }

        write!(f, "{}", self.command)?;

        for param in &self.params {
            write!(f, " {}", param)?;
        }

        if let Some(ref trailing) = self.trailing {
            write!(f, " :{}", trailing)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Command, Message, Source};

    #[test]
    fn test_serialize_bare() {
        assert_eq!(Message::new(Command::RECONNECT).to_string(), "RECONNECT");
    }

    #[test]
    fn test_serialize_login_lines() {
        assert_eq!(
            Message::cap_req(&["twitch.tv/tags", "twitch.tv/commands"]).to_string(),
            "CAP REQ :twitch.tv/tags twitch.tv/commands"
        );
        assert_eq!(Message::pass("oauth:abc").to_string(), "PASS oauth:abc");
        assert_eq!(Message::nick("bob").to_string(), "NICK bob");
    }

    #[test]
    fn test_serialize_tags_sorted_and_escaped() {
        let msg = Message::privmsg("#room", "hi")
            .with_tag("z", "last")
            .with_tag("a", "semi;colon space")
            .with_tag("flag", "");
        assert_eq!(
            msg.to_string(),
            "@a=semi\\:colon\\sspace;flag;z=last PRIVMSG #room :hi"
        );
    }

    #[test]
    fn test_serialize_source() {
        let msg = Message::new(Command::JOIN)
            .with_source(Source::user("bob", "bob", "bob.tmi.twitch.tv"))
            .with_param("#room");
        assert_eq!(msg.to_string(), ":bob!bob@bob.tmi.twitch.tv JOIN #room");
    }

    #[test]
    fn test_serialize_empty_trailing() {
        assert_eq!(Message::privmsg("#room", "").to_string(), "PRIVMSG #room :");
    }
}
