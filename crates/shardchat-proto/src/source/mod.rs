//! Message source (`:nick!user@host`).

mod serialize;
mod types;

pub use self::types::Source;
