//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (message size, connection limits)
//! - Validate addresses parse before anything binds to them
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::protocol::HANDSHAKE_TOKEN;

/// Upper bound on `protocol.max_message_size`.
pub const MAX_MESSAGE_SIZE_LIMIT: usize = 64 * 1024;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    InvalidBindAddress(String),

    #[error("listener.max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("tls.cert_path must not be empty")]
    MissingCertPath,

    #[error("tls.key_path must not be empty")]
    MissingKeyPath,

    #[error("protocol.max_message_size {actual} outside {min}..={max}")]
    MessageSizeOutOfRange { actual: usize, min: usize, max: usize },

    #[error("observability.metrics_address `{0}` is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    if config.tls.cert_path.trim().is_empty() {
        errors.push(ValidationError::MissingCertPath);
    }
    if config.tls.key_path.trim().is_empty() {
        errors.push(ValidationError::MissingKeyPath);
    }

    // The handshake token has to fit in a single message.
    let size = config.protocol.max_message_size;
    let min = HANDSHAKE_TOKEN.len();
    if !(min..=MAX_MESSAGE_SIZE_LIMIT).contains(&size) {
        errors.push(ValidationError::MessageSizeOutOfRange {
            actual: size,
            min,
            max: MAX_MESSAGE_SIZE_LIMIT,
        });
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
