//! Typed payloads decoded from inbound lines.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use shardchat_proto::ctcp::strip_action;
use shardchat_proto::{Badges, ChannelExt, Message, Tags, parse_badges, parse_sent_ts};

/// Who sent a chat line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    /// Login name, from the source nickname.
    pub login: String,
    pub display_name: Option<String>,
    pub user_id: Option<String>,
    pub color: Option<String>,
    pub badges: Badges,
    pub badge_info: Badges,
    pub moderator: bool,
    pub subscriber: bool,
}

impl Sender {
    fn from_message(msg: &Message, tags: &Tags) -> Self {
        let login = msg
            .source_nickname()
            .or_else(|| tags.get("login"))
            .unwrap_or_default()
            .to_string();
        Self {
            login,
            display_name: non_empty(tags, "display-name"),
            user_id: non_empty(tags, "user-id"),
            color: non_empty(tags, "color"),
            badges: parse_badges(tags.get("badges").unwrap_or_default()),
            badge_info: parse_badges(tags.get("badge-info").unwrap_or_default()),
            moderator: tags.flag("mod"),
            subscriber: tags.flag("subscriber"),
        }
    }

    /// Display name when set, else the login.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.login)
    }
}

/// The message a reply answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyParent {
    pub msg_id: String,
    pub user_login: Option<String>,
    pub display_name: Option<String>,
    pub body: Option<String>,
}

/// A chat line in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Room key (lower-cased, no `#`).
    pub channel: String,
    pub sender: Sender,
    pub id: Option<String>,
    /// From `tmi-sent-ts`.
    pub timestamp: Option<DateTime<Utc>>,
    /// Text with any ACTION wrapping removed.
    pub text: String,
    /// Sent with `/me`.
    pub is_action: bool,
    /// Bits cheered with this message.
    pub bits: Option<u64>,
    pub reply_parent: Option<ReplyParent>,
    pub raw: Message,
}

impl ChatMessage {
    /// Decode a `PRIVMSG`. Returns `None` when it is not addressed to a room.
    pub fn from_message(msg: &Message) -> Option<Self> {
        let channel = msg.channel()?.to_room_key();
        let empty = Tags::new();
        let tags = msg.tags.as_ref().unwrap_or(&empty);

        let (text, is_action) = strip_action(msg.text().unwrap_or_default());
        let reply_parent = tags
            .get("reply-parent-msg-id")
            .filter(|id| !id.is_empty())
            .map(|id| ReplyParent {
                msg_id: id.to_string(),
                user_login: non_empty(tags, "reply-parent-user-login"),
                display_name: non_empty(tags, "reply-parent-display-name"),
                body: non_empty(tags, "reply-parent-msg-body"),
            });

        Some(Self {
            channel,
            sender: Sender::from_message(msg, tags),
            id: non_empty(tags, "id"),
            timestamp: tags.get("tmi-sent-ts").and_then(parse_sent_ts),
            text: text.to_string(),
            is_action,
            bits: tags.parsed("bits").filter(|b| *b > 0),
            reply_parent,
            raw: msg.clone(),
        })
    }

    pub fn is_cheer(&self) -> bool {
        self.bits.is_some()
    }

    pub fn is_reply(&self) -> bool {
        self.reply_parent.is_some()
    }
}

/// A `NOTICE`, scoped to a room or to the whole connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Room key, or `None` for server-scoped notices.
    pub channel: Option<String>,
    pub msg_id: Option<String>,
    pub text: String,
}

impl Notice {
    pub fn from_message(msg: &Message) -> Self {
        Self {
            channel: msg.channel().map(|c| c.to_room_key()),
            msg_id: msg.tag("msg-id").filter(|v| !v.is_empty()).map(String::from),
            text: msg.text().unwrap_or_default().to_string(),
        }
    }

    /// Login rejected by the server.
    pub fn is_auth_failure(&self) -> bool {
        self.msg_id.as_deref() == Some("msg_login_unsuccessful")
            || self.text.starts_with("Login authentication failed")
            || self.text.starts_with("Improperly formatted auth")
            || self.text.starts_with("Invalid NICK")
    }

    /// The room does not exist, was banned, or is otherwise not joinable.
    pub fn is_room_unavailable(&self) -> bool {
        matches!(
            self.msg_id.as_deref(),
            Some(
                "msg_channel_suspended"
                    | "msg_channel_blocked"
                    | "msg_banned"
                    | "msg_room_not_found"
                    | "tos_ban"
            )
        )
    }
}

/// A `USERNOTICE`: subscriptions, raids, announcements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub channel: String,
    pub sender: Sender,
    /// Kind, e.g. `sub`, `resub`, `raid`.
    pub msg_id: Option<String>,
    pub system_message: Option<String>,
    /// Optional text the user attached.
    pub text: Option<String>,
    /// `msg-param-*` tags with the prefix removed.
    pub params: BTreeMap<String, String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl UserNotice {
    pub fn from_message(msg: &Message) -> Option<Self> {
        let channel = msg.channel()?.to_room_key();
        let empty = Tags::new();
        let tags = msg.tags.as_ref().unwrap_or(&empty);
        Some(Self {
            channel,
            sender: Sender::from_message(msg, tags),
            msg_id: non_empty(tags, "msg-id"),
            system_message: non_empty(tags, "system-msg"),
            text: msg.text().map(String::from),
            params: tags
                .iter()
                .filter_map(|(k, v)| Some((k.strip_prefix("msg-param-")?.to_string(), v.clone())))
                .collect(),
            timestamp: tags.get("tmi-sent-ts").and_then(parse_sent_ts),
        })
    }
}

/// What a `CLEARCHAT` removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearChatKind {
    /// The whole room history.
    All,
    Ban { login: String },
    Timeout { login: String, seconds: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearChat {
    pub channel: String,
    pub kind: ClearChatKind,
    pub target_user_id: Option<String>,
}

impl ClearChat {
    pub fn from_message(msg: &Message) -> Option<Self> {
        let channel = msg.channel()?.to_room_key();
        let kind = match (msg.text(), msg.tag("ban-duration").and_then(|d| d.parse().ok())) {
            (Some(login), Some(seconds)) => ClearChatKind::Timeout {
                login: login.to_string(),
                seconds,
            },
            (Some(login), None) => ClearChatKind::Ban {
                login: login.to_string(),
            },
            (None, _) => ClearChatKind::All,
        };
        Some(Self {
            channel,
            kind,
            target_user_id: msg.tag("target-user-id").filter(|v| !v.is_empty()).map(String::from),
        })
    }
}

/// A `CLEARMSG`: one message deleted by a moderator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearMessage {
    pub channel: String,
    pub login: Option<String>,
    pub target_msg_id: Option<String>,
    pub text: Option<String>,
}

impl ClearMessage {
    pub fn from_message(msg: &Message) -> Option<Self> {
        Some(Self {
            channel: msg.channel()?.to_room_key(),
            login: msg.tag("login").filter(|v| !v.is_empty()).map(String::from),
            target_msg_id: msg
                .tag("target-msg-id")
                .filter(|v| !v.is_empty())
                .map(String::from),
            text: msg.text().map(String::from),
        })
    }
}

fn non_empty(tags: &Tags, key: &str) -> Option<String> {
    tags.get(key).filter(|v| !v.is_empty()).map(String::from)
}
