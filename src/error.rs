//! Unified error handling for shardchat.
//!
//! Blocking client calls (`connect`, `join`, `ping`, `close`) return a typed
//! [`ClientError`]. Errors are classified as fatal (retrying cannot help)
//! or retryable, which the establishment helper uses to drive backoff.

use shardchat_proto::ProtocolError;
use thiserror::Error;

/// Errors surfaced by connections and the shard manager.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not connected")]
    NotConnected,

    #[error("no connection to establish")]
    NoConnection,

    #[error("operation cancelled")]
    Cancelled,

    #[error("connection closed")]
    Disconnected,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("login timed out")]
    LoginTimeout,

    #[error("timed out joining {room}")]
    JoinTimeout { room: String },

    #[error("room {room} is unavailable: {reason}")]
    RoomUnavailable { room: String, reason: String },

    #[error("ping timed out")]
    PingTimeout,

    #[error("shard id {0} is out of bounds")]
    ShardOutOfBounds(i64),
}

impl ClientError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::NoConnection => "no_connection",
            Self::Cancelled => "cancelled",
            Self::Disconnected => "disconnected",
            Self::Io(_) => "io_error",
            Self::Protocol(_) => "protocol_error",
            Self::InvalidServerName(_) => "invalid_server_name",
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::LoginTimeout => "login_timeout",
            Self::JoinTimeout { .. } => "join_timeout",
            Self::RoomUnavailable { .. } => "room_unavailable",
            Self::PingTimeout => "ping_timeout",
            Self::ShardOutOfBounds(_) => "shard_out_of_bounds",
        }
    }

    /// Errors no amount of retrying will fix.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed(_)
                | Self::InvalidServerName(_)
                | Self::NoConnection
                | Self::ShardOutOfBounds(_)
        )
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::Disconnected
                | Self::Io(_)
                | Self::Protocol(_)
                | Self::LoginTimeout
                | Self::JoinTimeout { .. }
                | Self::PingTimeout
        )
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
