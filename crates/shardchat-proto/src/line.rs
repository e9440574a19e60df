//! Line codec for tokio.
//!
//! Frames the byte stream on `\n`, strips the `\r\n` terminator and hands
//! out one `String` per line. The encoder appends `\r\n` and refuses lines
//! that would smuggle a second command.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{self, ProtocolError};

/// Upper bound on a line, tags included.
pub const MAX_LINE_LEN: usize = 8191;

/// Newline-delimited codec.
///
/// In strict mode (the default) invalid UTF-8 and illegal control characters
/// are decode errors. A lenient codec replaces invalid UTF-8 with U+FFFD and
/// passes control characters through, so one odd chat line cannot end a
/// read loop. Over-long lines are an error in both modes.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index of next byte to check for newline.
    next_index: usize,
    max_len: usize,
    lenient: bool,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    /// A strict codec with the default line limit.
    pub fn new() -> Self {
        Self {
            next_index: 0,
            max_len: MAX_LINE_LEN,
            lenient: false,
        }
    }

    /// A strict codec with a custom line limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len,
            ..Self::new()
        }
    }

    /// Switch decoding to lenient mode.
    #[must_use]
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    /// Configured line limit.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    fn validate_line(s: &str) -> error::Result<()> {
        match s.chars().find(|&c| crate::format::is_illegal_control_char(c)) {
            Some(ch) => Err(ProtocolError::IllegalControlChar(ch)),
            None => Ok(()),
        }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
            self.next_index = src.len();
            if src.len() > self.max_len {
                return Err(ProtocolError::MessageTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }
            return Ok(None);
        };

        let line = src.split_to(self.next_index + offset + 1);
        self.next_index = 0;

        if line.len() > self.max_len {
            return Err(ProtocolError::MessageTooLong {
                actual: line.len(),
                limit: self.max_len,
            });
        }

        let body = line.strip_suffix(b"\n").unwrap_or(&line[..]);
        let body = body.strip_suffix(b"\r").unwrap_or(body);

        let data = if self.lenient {
            String::from_utf8_lossy(body).into_owned()
        } else {
            let data = std::str::from_utf8(body).map_err(|e| ProtocolError::InvalidUtf8 {
                raw_line: body.to_vec(),
                byte_pos: e.valid_up_to(),
                details: e.to_string(),
                command_hint: error::extract_command_hint(body),
            })?;
            Self::validate_line(data)?;
            data.to_owned()
        };

        Ok(Some(data))
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: String, dst: &mut BytesMut) -> error::Result<()> {
        if let Some(ch) = msg.chars().find(|&c| c == '\r' || c == '\n') {
            return Err(ProtocolError::IllegalControlChar(ch));
        }
        if msg.len() + 2 > self.max_len {
            return Err(ProtocolError::MessageTooLong {
                actual: msg.len() + 2,
                limit: self.max_len,
            });
        }
        dst.reserve(msg.len() + 2);
        dst.extend_from_slice(msg.as_bytes());
        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}

impl Encoder<&crate::Message> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: &crate::Message, dst: &mut BytesMut) -> error::Result<()> {
        Encoder::<String>::encode(self, msg.to_string(), dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_complete_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :tmi.twitch.tv\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some("PING :tmi.twitch.tv".to_string())
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_bare_lf_and_multiple_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :a\nPING :b\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :a"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :b"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_partial_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"later\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :later"));
    }

    #[test]
    fn test_decode_too_long() {
        let mut codec = LineCodec::with_max_len(10);
        let mut buf = BytesMut::from("this is way too long\n");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::MessageTooLong { .. })
        ));
    }

    #[test]
    fn test_decode_invalid_utf8_strict_and_lenient() {
        let mut strict = LineCodec::new();
        let mut buf = BytesMut::from(&b"PRIVMSG #room :\xff\r\n"[..]);
        match strict.decode(&mut buf) {
            Err(ProtocolError::InvalidUtf8 { command_hint, .. }) => {
                assert_eq!(command_hint.as_deref(), Some("PRIVMSG"));
            }
            other => panic!("expected InvalidUtf8, got {other:?}"),
        }

        let mut lenient = LineCodec::new().lenient();
        let mut buf = BytesMut::from(&b"PRIVMSG #room :\xff\x05\r\n"[..]);
        assert_eq!(
            lenient.decode(&mut buf).unwrap().as_deref(),
            Some("PRIVMSG #room :\u{FFFD}\x05")
        );
    }

    #[test]
    fn test_decode_illegal_control_char() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PRIVMSG #room :\x07\r\n");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::IllegalControlChar('\x07'))
        ));
    }

    #[test]
    fn test_encode_appends_terminator() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("PONG :tmi.twitch.tv".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"PONG :tmi.twitch.tv\r\n");
    }

    #[test]
    fn test_encode_rejects_smuggled_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        let err = codec
            .encode("PRIVMSG #a :x\r\nPART #a".to_string(), &mut buf)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::IllegalControlChar('\r')));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_message() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(&crate::Message::join("#room"), &mut buf).unwrap();
        assert_eq!(&buf[..], b"JOIN #room\r\n");
    }
}
