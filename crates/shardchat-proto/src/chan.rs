//! Room name helpers.
//!
//! Rooms travel on the wire as `#login`. Callers may pass `Login`,
//! `#Login` or `login`; all map to the same lower-cased room.

/// Extension trait for room names.
pub trait ChannelExt {
    /// Whether this string is a channel token as sent on the wire.
    ///
    /// A channel starts with `#`, has at least one more character and
    /// contains no space, comma, BEL or other control character.
    fn is_channel_name(&self) -> bool;

    /// Lower-cased room name with the `#` marker, as sent in `JOIN`.
    fn to_channel_name(&self) -> String;

    /// Lower-cased room name without the `#` marker.
    fn to_room_key(&self) -> String;
}

impl ChannelExt for str {
    fn is_channel_name(&self) -> bool {
        match self.strip_prefix('#') {
            Some(rest) if !rest.is_empty() => !rest
                .chars()
                .any(|c| c == ' ' || c == ',' || c.is_control()),
            _ => false,
        }
    }

    fn to_channel_name(&self) -> String {
        format!("#{}", self.to_room_key())
    }

    fn to_room_key(&self) -> String {
        self.trim().trim_start_matches('#').to_lowercase()
    }
}

impl ChannelExt for String {
    fn is_channel_name(&self) -> bool {
        self.as_str().is_channel_name()
    }

    fn to_channel_name(&self) -> String {
        self.as_str().to_channel_name()
    }

    fn to_room_key(&self) -> String {
        self.as_str().to_room_key()
    }
}
