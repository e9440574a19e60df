//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config structs and TOML loading
//! - [`defaults`]: serde default functions and identity constants
//! - [`validation`]: startup checks

pub mod defaults;
mod types;
mod validation;

pub use types::{
    ClientConfig, ClientOptions, Config, ConfigError, IdentityConfig, ServerConfig, Token,
};
pub use validation::{ValidationError, validate};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.host, "irc.chat.twitch.tv");
        assert_eq!(config.server.port, 6697);
        assert!(config.server.tls);
        assert!(config.identity.is_anonymous());
        assert_eq!(config.client.max_channels_per_shard, 100);
        assert_eq!(config.client.join_timeout_ms, 10_000);
        assert_eq!(config.client.capabilities.len(), 3);
        assert!(config.rooms.is_empty());
    }

    #[test]
    fn test_oauth_prefix_stripped() {
        let config = Config::parse(
            r##"
            rooms = ["alpha", "#Beta"]

            [identity]
            username = "bot"
            token = "oauth:abc123"

            [server]
            host = "127.0.0.1"
            port = 6667
            tls = false

            [client]
            max_channels_per_shard = 5
            auto_reconnect = false
            "##,
        )
        .unwrap();

        assert_eq!(config.identity.token.as_ref().unwrap().expose(), "abc123");
        assert!(!config.identity.is_anonymous());
        assert_eq!(config.rooms, vec!["alpha", "#Beta"]);
        assert_eq!(config.client.max_channels_per_shard, 5);
        assert!(!config.client.auto_reconnect);
        assert!(!config.server.tls);

        let client = config.client_config();
        assert_eq!(client.server.port, 6667);
        assert_eq!(client.options.login_timeout().as_secs(), 10);
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = Token::new("oauth:secret");
        assert_eq!(token.expose(), "secret");
        assert!(!format!("{token:?}").contains("secret"));
        assert_eq!(Token::new("plain").expose(), "plain");
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            Config::parse("[server]\nhost = \"\""),
            Err(ConfigError::Invalid(ValidationError::MissingHost))
        ));
        assert!(matches!(
            Config::parse("[server]\nport = 0"),
            Err(ConfigError::Invalid(ValidationError::ZeroPort))
        ));
        assert!(matches!(
            Config::parse("[identity]\ntoken = \"oauth:abc\""),
            Err(ConfigError::Invalid(ValidationError::MissingUsername))
        ));
        assert!(matches!(
            Config::parse("[identity]\nusername = \"bot\"\ntoken = \"oauth:\""),
            Err(ConfigError::Invalid(ValidationError::EmptyToken))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rooms = [\"room\"]\n[server]\nport = 6667\ntls = false").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.rooms, vec!["room"]);
        assert_eq!(config.server.port, 6667);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/shardchat.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(Config::parse("rooms = 5"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_anonymous_username() {
        let name = defaults::anonymous_username();
        assert!(name.starts_with(defaults::ANONYMOUS_PREFIX));
        assert!(name[defaults::ANONYMOUS_PREFIX.len()..].chars().all(|c| c.is_ascii_digit()));
    }
}
