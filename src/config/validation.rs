//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("server.host is required")]
    MissingHost,
    #[error("server.port must be non-zero")]
    ZeroPort,
    #[error("identity.username is required when a token is set")]
    MissingUsername,
    #[error("identity.token is empty")]
    EmptyToken,
    #[error("client.capabilities entry is empty")]
    EmptyCapability,
}

/// Validate a configuration, returning the first error found.
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.server.host.trim().is_empty() {
        return Err(ValidationError::MissingHost);
    }
    if config.server.port == 0 {
        return Err(ValidationError::ZeroPort);
    }

    if let Some(ref token) = config.identity.token {
        if token.expose().is_empty() {
            return Err(ValidationError::EmptyToken);
        }
        if config
            .identity
            .username
            .as_deref()
            .is_none_or(|u| u.trim().is_empty())
        {
            return Err(ValidationError::MissingUsername);
        }
    }

    if config.client.capabilities.iter().any(|c| c.trim().is_empty()) {
        return Err(ValidationError::EmptyCapability);
    }

    Ok(())
}
