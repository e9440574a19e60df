//! Message types and parsing.

mod parse;
mod serialize;
/// Tag map and value escaping.
pub mod tags;
mod types;

pub use self::tags::Tags;
pub use self::types::Message;
