//! Badge tag decoding.
//!
//! `badges` and `badge-info` carry comma-separated `name/version` pairs,
//! e.g. `subscriber/12,premium/1`. Versions may contain further slashes
//! (`predictions/blue-1`), so only the first one splits.

use smallvec::SmallVec;

/// One chat badge.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Badge {
    /// Badge set, e.g. `subscriber`.
    pub name: String,
    /// Version or metadata, e.g. `12`. May be empty.
    pub version: String,
}

/// Badge list in tag order. Most users carry few badges.
pub type Badges = SmallVec<[Badge; 4]>;

/// Parse a `badges` or `badge-info` tag value.
///
/// Empty input yields an empty list. Entries without a `/` become badges
/// with an empty version.
pub fn parse_badges(value: &str) -> Badges {
    value
        .split(',')
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, version) = entry.split_once('/').unwrap_or((entry, ""));
            Badge {
                name: name.to_owned(),
                version: version.to_owned(),
            }
        })
        .collect()
}

/// Look up a badge version by set name.
pub fn badge_version<'a>(badges: &'a [Badge], name: &str) -> Option<&'a str> {
    badges
        .iter()
        .find(|b| b.name == name)
        .map(|b| b.version.as_str())
}
