//! Tag value helpers.

use chrono::{DateTime, TimeZone, Utc};

/// Convert a `tmi-sent-ts` value (milliseconds since the Unix epoch) into a
/// UTC timestamp.
///
/// Returns `None` for non-numeric or out-of-range input.
///
/// ```
/// use shardchat_proto::util::parse_sent_ts;
///
/// let ts = parse_sent_ts("1507246572675").unwrap();
/// assert_eq!(ts.timestamp_millis(), 1507246572675);
/// ```
pub fn parse_sent_ts(millis: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = millis.trim().parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Truncate to at most `max_bytes` without splitting a UTF-8 code point.
pub fn truncate_utf8_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sent_ts() {
        let ts = parse_sent_ts("1507246572675").unwrap();
        assert_eq!(ts.to_rfc3339(), "2017-10-05T23:36:12.675+00:00");
        assert_eq!(parse_sent_ts("abc"), None);
        assert_eq!(parse_sent_ts(""), None);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate_utf8_safe("hello world", 5), "hello");
        assert_eq!(truncate_utf8_safe("hi", 10), "hi");
        assert_eq!(truncate_utf8_safe("héllo", 2), "h");
    }
}
