//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use rand::Rng;

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_host() -> String {
    "irc.chat.twitch.tv".to_string()
}

pub fn default_port() -> u16 {
    6697
}

// =============================================================================
// Identity Defaults
// =============================================================================

/// Placeholder password sent by anonymous identities.
pub const ANONYMOUS_TOKEN: &str = "SCHMOOPIIE";

/// Reserved login prefix for read-only identities.
pub const ANONYMOUS_PREFIX: &str = "justinfan";

/// A fresh read-only login, `justinfan` followed by random digits.
pub fn anonymous_username() -> String {
    let n: u32 = rand::thread_rng().gen_range(10_000..100_000_000);
    format!("{ANONYMOUS_PREFIX}{n}")
}

// =============================================================================
// Client Defaults
// =============================================================================

pub fn default_capabilities() -> Vec<String> {
    ["twitch.tv/tags", "twitch.tv/commands", "twitch.tv/membership"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub fn default_login_timeout_ms() -> u64 {
    10_000
}

pub fn default_join_timeout_ms() -> u64 {
    10_000
}

pub fn default_ping_timeout_ms() -> u64 {
    5_000
}

pub fn default_close_grace_ms() -> u64 {
    2_000
}

pub fn default_max_channels_per_shard() -> usize {
    100
}
