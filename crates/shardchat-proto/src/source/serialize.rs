use std::fmt;

use super::types::Source;

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.nickname, &self.username) {
            (Some(nick), Some(user)) => write!(f, "{}!{}@{}", nick, user, self.host),
            // The parser reads `nick@host` as nick == user, so spell that out.
            (Some(nick), None) => write!(f, "{}!{}@{}", nick, nick, self.host),
            _ => f.write_str(&self.host),
        }
    }
}
