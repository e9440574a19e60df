//! Per-room state tracked by a connection.

use shardchat_proto::{ChannelExt, Tags};

use super::user::UserState;

/// Moderation settings of a room, from `ROOMSTATE` tags.
///
/// `emote-only`, `r9k` and `subs-only` are off when absent or `"0"`.
/// `followers-only` is off when absent or `"-1"`, otherwise the value is
/// the required follow age in minutes. `slow` is off when absent or `"0"`,
/// otherwise the delay in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomState {
    pub room_id: Option<String>,
    pub emote_only: bool,
    /// Unique-message mode.
    pub r9k: bool,
    pub subs_only: bool,
    pub followers_only: Option<i64>,
    pub slow: Option<u32>,
}

impl RoomState {
    /// Full state from the first `ROOMSTATE` of a room.
    pub fn from_tags(tags: &Tags) -> Self {
        let mut state = Self::default();
        state.apply(tags);
        state
    }

    /// Apply an update. Only flags whose tags are present change.
    pub fn apply(&mut self, tags: &Tags) {
        if let Some(id) = tags.get("room-id").filter(|v| !v.is_empty()) {
            self.room_id = Some(id.to_string());
        }
        if tags.contains("emote-only") {
            self.emote_only = tags.flag("emote-only");
        }
        if tags.contains("r9k") {
            self.r9k = tags.flag("r9k");
        }
        if tags.contains("subs-only") {
            self.subs_only = tags.flag("subs-only");
        }
        if let Some(value) = tags.get("followers-only") {
            self.followers_only = match value {
                "-1" => None,
                v => v.parse().ok(),
            };
        }
        if let Some(value) = tags.get("slow") {
            self.slow = value.parse().ok().filter(|secs| *secs != 0);
        }
    }
}

/// Whether the server has confirmed a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    /// `JOIN` sent, no `ROOMSTATE` yet.
    Pending,
    /// Confirmed, with the latest room settings.
    Acknowledged(RoomState),
}

/// A room joined (or being joined) on one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Lower-cased room name without `#`.
    pub name: String,
    pub state: ChannelState,
    /// Our own state in this room, from `USERSTATE`.
    pub user_state: Option<UserState>,
}

impl Channel {
    pub(crate) fn pending(name: &str) -> Self {
        Self {
            name: name.to_room_key(),
            state: ChannelState::Pending,
            user_state: None,
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        matches!(self.state, ChannelState::Acknowledged(_))
    }

    pub fn room_state(&self) -> Option<&RoomState> {
        match &self.state {
            ChannelState::Acknowledged(state) => Some(state),
            ChannelState::Pending => None,
        }
    }

    /// Name as sent on the wire, `#room`.
    pub fn wire_name(&self) -> String {
        self.name.to_channel_name()
    }

    /// Record a `ROOMSTATE`. Returns `true` when this acknowledged the join.
    pub(crate) fn apply_room_state(&mut self, tags: &Tags) -> bool {
        match &mut self.state {
            ChannelState::Pending => {
                self.state = ChannelState::Acknowledged(RoomState::from_tags(tags));
                true
            }
            ChannelState::Acknowledged(state) => {
                state.apply(tags);
                false
            }
        }
    }
}
