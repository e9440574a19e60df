//! Core configuration types and loading.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] super::validation::ValidationError),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Login credentials.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Upstream endpoint.
    #[serde(default)]
    pub server: ServerConfig,
    /// Timeouts, capabilities and sharding.
    #[serde(default)]
    pub client: ClientOptions,
    /// Rooms joined at startup.
    #[serde(default)]
    pub rooms: Vec<String>,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        super::validation::validate(&config)?;
        Ok(config)
    }

    /// Settings handed to each connection.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            identity: self.identity.clone(),
            server: self.server.clone(),
            options: self.client.clone(),
        }
    }
}

/// Secret OAuth token.
///
/// An `oauth:` prefix is stripped on construction. The value is wiped on
/// drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Token(String);

impl Token {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match raw.strip_prefix("oauth:") {
            Some(stripped) => Self(stripped.to_string()),
            None => Self(raw),
        }
    }

    /// The bare token, without the `oauth:` prefix.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Token::new)
    }
}

/// Login credentials. Without a token the connection is anonymous.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    /// Login name. Ignored for anonymous identities.
    pub username: Option<String>,
    /// OAuth token.
    pub token: Option<Token>,
}

impl IdentityConfig {
    /// Authenticated identity.
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            token: Some(Token::new(token)),
        }
    }

    /// Whether this identity logs in read-only.
    pub fn is_anonymous(&self) -> bool {
        self.token.is_none() || self.username.is_none()
    }
}

/// Upstream endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Wrap the socket in TLS.
    #[serde(default = "default_true")]
    pub tls: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: true,
        }
    }
}

impl ServerConfig {
    /// Plain TCP endpoint, used by tests and local relays.
    pub fn plain(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: false,
        }
    }
}

/// Tuning knobs (`[client]` section).
#[derive(Debug, Clone, Deserialize)]
pub struct ClientOptions {
    /// Capabilities requested at login.
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,
    #[serde(default = "default_login_timeout_ms")]
    pub login_timeout_ms: u64,
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
    /// Base ping timeout; the last measured latency is added on top.
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
    /// How long `close` waits for the read loop to wind down.
    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
    #[serde(default = "default_max_channels_per_shard")]
    pub max_channels_per_shard: usize,
    /// Reconnect shards that drop or are asked to reconnect.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    /// Connect on demand when sending while disconnected.
    #[serde(default = "default_true")]
    pub auto_connect: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            capabilities: default_capabilities(),
            login_timeout_ms: default_login_timeout_ms(),
            join_timeout_ms: default_join_timeout_ms(),
            ping_timeout_ms: default_ping_timeout_ms(),
            close_grace_ms: default_close_grace_ms(),
            max_channels_per_shard: default_max_channels_per_shard(),
            auto_reconnect: true,
            auto_connect: true,
        }
    }
}

impl ClientOptions {
    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

/// Everything one connection needs.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub identity: IdentityConfig,
    pub server: ServerConfig,
    pub options: ClientOptions,
}

impl ClientConfig {
    /// Anonymous identity against the given endpoint.
    pub fn anonymous(server: ServerConfig) -> Self {
        Self {
            server,
            ..Self::default()
        }
    }

    /// Replace the identity.
    #[must_use]
    pub fn with_identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = identity;
        self
    }

    /// Replace the tuning options.
    #[must_use]
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }
}
