//! Chat client: connections, events and the shard manager.

pub mod channel;
pub mod chat;
pub mod connection;
pub mod establish;
pub mod events;
pub mod shard;
mod transport;
pub mod user;

pub use channel::{Channel, ChannelState, RoomState};
pub use chat::{ChatMessage, ClearChat, ClearChatKind, ClearMessage, Notice, ReplyParent, Sender, UserNotice};
pub use connection::{Connection, ConnectionState};
pub use establish::{Connect, ensure_connection};
pub use events::{DisconnectReason, Dispatcher, Events};
pub use shard::{ShardEvents, ShardManager, Sharded};
pub use user::UserState;
