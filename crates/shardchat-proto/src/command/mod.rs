//! Chat protocol commands.

mod types;

pub use types::{numeric, Command};
