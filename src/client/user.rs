//! State of the authenticated user, from `GLOBALUSERSTATE` and `USERSTATE`.

use shardchat_proto::{Badges, Tags, parse_badges};

/// Our own chat identity as the server reports it.
///
/// Always replaced wholesale when a fresh state line arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserState {
    pub display_name: Option<String>,
    /// Hex colour such as `#1E90FF`, absent when never set.
    pub color: Option<String>,
    pub badges: Badges,
    pub badge_info: Badges,
    pub emote_sets: Vec<String>,
    pub moderator: bool,
    pub subscriber: bool,
    pub turbo: bool,
    pub user_id: Option<String>,
    /// `user-type`: empty for regular users, otherwise `mod`, `admin`,
    /// `global_mod` or `staff`.
    pub user_type: Option<String>,
}

impl UserState {
    pub fn from_tags(tags: &Tags) -> Self {
        let non_empty = |key: &str| tags.get(key).filter(|v| !v.is_empty()).map(String::from);
        Self {
            display_name: non_empty("display-name"),
            color: non_empty("color"),
            badges: parse_badges(tags.get("badges").unwrap_or_default()),
            badge_info: parse_badges(tags.get("badge-info").unwrap_or_default()),
            emote_sets: tags
                .get("emote-sets")
                .unwrap_or_default()
                .split(',')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            moderator: tags.flag("mod"),
            subscriber: tags.flag("subscriber"),
            turbo: tags.flag("turbo"),
            user_id: non_empty("user-id"),
            user_type: non_empty("user-type"),
        }
    }

    /// Whether this user may use moderator commands in the room.
    pub fn is_privileged(&self) -> bool {
        self.moderator
            || self
                .badges
                .iter()
                .any(|b| b.name == "broadcaster" || b.name == "moderator")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tags() {
        let tags = Tags::parse(
            "badge-info=subscriber/8;badges=moderator/1,subscriber/6;color=#0D4200;display-name=Bot;emote-sets=0,33,50;mod=1;subscriber=1;turbo=0;user-type=mod",
        )
        .unwrap();
        let state = UserState::from_tags(&tags);
        assert_eq!(state.display_name.as_deref(), Some("Bot"));
        assert_eq!(state.color.as_deref(), Some("#0D4200"));
        assert_eq!(state.badges.len(), 2);
        assert_eq!(state.badge_info[0].version, "8");
        assert_eq!(state.emote_sets, vec!["0", "33", "50"]);
        assert!(state.moderator);
        assert!(state.subscriber);
        assert!(!state.turbo);
        assert_eq!(state.user_type.as_deref(), Some("mod"));
        assert!(state.is_privileged());
    }

    #[test]
    fn test_empty_values() {
        let tags = Tags::parse("badges=;color=;display-name=bot;user-type=").unwrap();
        let state = UserState::from_tags(&tags);
        assert!(state.badges.is_empty());
        assert_eq!(state.color, None);
        assert_eq!(state.user_type, None);
        assert!(!state.is_privileged());
    }
}
