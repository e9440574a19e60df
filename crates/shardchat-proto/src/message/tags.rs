//! Message tag map and value escaping.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt::{Result as FmtResult, Write};

use crate::error::MessageParseError;

/// Tag map attached to a message.
///
/// Keys are unique. Iteration is in key order, which keeps serialization
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Create an empty tag map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a tag block (without the leading `@`).
    ///
    /// Pairs are `;`-separated `key[=value]`. A missing `=value` yields an
    /// empty string. Empty segments are skipped, but a block with no keys at
    /// all is [`MessageParseError::InvalidTags`].
    pub fn parse(block: &str) -> Result<Self, MessageParseError> {
        let mut map = BTreeMap::new();
        for pair in block.split(';').filter(|s| !s.is_empty()) {
            let (key, value) = match pair.split_once('=') {
                Some((key, value)) => (key, unescape_tag_value(value)),
                None => (pair, String::new()),
            };
            if key.is_empty() {
                continue;
            }
            map.insert(key.to_owned(), value);
        }

        if map.is_empty() {
            return Err(MessageParseError::InvalidTags);
        }
        Ok(Self(map))
    }

    /// Get a tag value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether a tag is present (even with an empty value).
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Boolean reading of a tag: absent or `"0"` is false, anything else is true.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(v) if v != "0")
    }

    /// Get a tag and parse it, returning `None` when absent, empty, or malformed.
    pub fn parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).filter(|v| !v.is_empty())?.parse().ok()
    }

    /// Insert or replace a tag.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Escape a tag value for serialization.
///
/// CR and LF cannot survive a round trip (the parser removes their escapes),
/// so they are dropped here.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' | '\n' => {}
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Unescape a tag value from wire format.
///
/// `\s` is a space, `\:` a semicolon, `\\` a backslash; `\r` and `\n` are
/// removed. Any other escaped character stands for itself and a lone
/// trailing backslash is dropped.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match iter.next() {
            Some(':') => unescaped.push(';'),
            Some('s') => unescaped.push(' '),
            Some('\\') => unescaped.push('\\'),
            Some('r') | Some('n') => {}
            Some(c) => unescaped.push(c),
            None => break,
        }
    }
    unescaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_semicolon() {
        assert_eq!(unescape_tag_value("a\\:b"), "a;b");
    }

    #[test]
    fn test_unescape_space() {
        assert_eq!(unescape_tag_value("hello\\sworld"), "hello world");
    }

    #[test]
    fn test_unescape_backslash() {
        assert_eq!(unescape_tag_value("path\\\\file"), "path\\file");
    }

    #[test]
    fn test_unescape_drops_line_breaks() {
        assert_eq!(unescape_tag_value("line\\rbreak\\nend"), "linebreakend");
    }

    #[test]
    fn test_unescape_trailing_backslash() {
        assert_eq!(unescape_tag_value("test\\"), "test");
    }

    #[test]
    fn test_unescape_unknown_escape() {
        assert_eq!(unescape_tag_value("a\\xb"), "axb");
    }

    #[test]
    fn test_escape_roundtrip() {
        for original in [
            "simple",
            "with space",
            "with;semicolon",
            "with\\backslash",
            "complex; \\ all",
        ] {
            let mut escaped = String::new();
            escape_tag_value(&mut escaped, original).unwrap();
            assert_eq!(unescape_tag_value(&escaped), original, "escaped as {escaped}");
        }
    }

    #[test]
    fn test_parse_block() {
        let tags = Tags::parse("badge-info=;badges=subscriber/1;display-name=Bob;turbo").unwrap();
        assert_eq!(tags.len(), 4);
        assert_eq!(tags.get("badge-info"), Some(""));
        assert_eq!(tags.get("display-name"), Some("Bob"));
        assert_eq!(tags.get("turbo"), Some(""));
        assert!(tags.contains("turbo"));
        assert!(!tags.contains("mod"));
    }

    #[test]
    fn test_parse_empty_block_is_invalid() {
        assert_eq!(Tags::parse(""), Err(MessageParseError::InvalidTags));
        assert_eq!(Tags::parse(";;"), Err(MessageParseError::InvalidTags));
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let tags = Tags::parse("a=1;a=2").unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("a"), Some("2"));
    }

    #[test]
    fn test_flag_and_parsed() {
        let tags = Tags::parse("subs-only=0;emote-only=1;slow=30;followers-only=-1;r9k=").unwrap();
        assert!(!tags.flag("subs-only"));
        assert!(tags.flag("emote-only"));
        assert!(tags.flag("r9k"));
        assert!(!tags.flag("missing"));
        assert_eq!(tags.parsed::<u32>("slow"), Some(30));
        assert_eq!(tags.parsed::<i64>("followers-only"), Some(-1));
        assert_eq!(tags.parsed::<u32>("r9k"), None);
    }
}
