//! shardchat - sharded client for the Twitch flavour of IRC.
//!
//! A [`Connection`] manages one socket: login, room joins, keep-alive and
//! event dispatch. A [`ShardManager`] spreads rooms over as many
//! connections as the per-shard capacity requires.
//!
//! ```no_run
//! use shardchat::{ClientConfig, ShardManager};
//! use shardchat::config::ServerConfig;
//!
//! # async fn run() -> shardchat::ClientResult<()> {
//! let manager = ShardManager::new(ClientConfig::anonymous(ServerConfig::default()));
//! manager.events().chat.on(|msg| println!("[{}] {}: {}", msg.event.channel, msg.event.sender.name(), msg.event.text));
//! manager.join(&["somestreamer"]).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod telemetry;

pub use client::{Connection, ConnectionState, ShardManager, ensure_connection};
pub use config::{ClientConfig, Config};
pub use error::{ClientError, ClientResult};
