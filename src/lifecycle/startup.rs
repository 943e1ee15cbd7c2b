//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration, including command-line overrides
//! - Load the server identity
//! - Bind the listener
//! - Hand back a server ready to accept traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and nothing is left listening
//! - Identity loads before bind, so a bad key never opens a port

use std::path::Path;

use thiserror::Error;

use crate::config::{self, ConfigError, ServerConfig};
use crate::net::listener::{Listener, ListenerError};
use crate::net::tls::{IdentityError, ServerIdentity};
use crate::server::Server;

/// A fatal error before the accept loop starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("server identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),
}

/// Build the effective configuration.
///
/// Reads `path` when given (defaults otherwise), applies `overrides`, then
/// validates the result so overrides cannot slip past the checks.
pub fn prepare_config<F>(path: Option<&Path>, overrides: F) -> Result<ServerConfig, StartupError>
where
    F: FnOnce(&mut ServerConfig),
{
    let mut config = match path {
        Some(path) => config::load_config(path)?,
        None => ServerConfig::default(),
    };
    overrides(&mut config);
    config::validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load identity and bind the listener for `config`.
pub async fn bootstrap(config: &ServerConfig) -> Result<(Server, Listener), StartupError> {
    let identity = ServerIdentity::from_pem_files(
        Path::new(&config.tls.cert_path),
        Path::new(&config.tls.key_path),
    )?;
    tracing::info!(cert_path = %config.tls.cert_path, "Server identity loaded");

    let listener = Listener::bind(&config.listener).await?;
    Ok((Server::new(config, identity), listener))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pem_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_pass_without_a_file() {
        let config = prepare_config(None, |_| {}).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:4433");
    }

    #[test]
    fn invalid_override_is_a_config_error() {
        let err = prepare_config(None, |c| c.listener.bind_address = "nowhere".into())
            .err()
            .unwrap();
        match err {
            StartupError::Config(ConfigError::Validation(errors)) => {
                assert!(matches!(errors[..], [ValidationError::InvalidBindAddress(_)]));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let err = prepare_config(Some(Path::new("/no/such/tls-gate.toml")), |_| {})
            .err()
            .unwrap();
        assert!(matches!(err, StartupError::Config(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn missing_identity_aborts_before_bind() {
        let mut config = ServerConfig::default();
        config.tls.cert_path = "/no/such/cert.pem".into();
        config.tls.key_path = "/no/such/key.pem".into();
        config.listener.bind_address = "127.0.0.1:0".into();

        let err = bootstrap(&config).await.err().unwrap();
        assert!(matches!(err, StartupError::Identity(IdentityError::Io { .. })));
    }

    #[tokio::test]
    async fn occupied_port_is_a_listener_error() {
        let ck = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert = pem_file(&ck.cert.pem());
        let key = pem_file(&ck.key_pair.serialize_pem());

        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = ServerConfig::default();
        config.tls.cert_path = cert.path().display().to_string();
        config.tls.key_path = key.path().display().to_string();
        config.listener.bind_address = occupied.local_addr().unwrap().to_string();

        let err = bootstrap(&config).await.err().unwrap();
        assert!(matches!(err, StartupError::Listener(ListenerError::Bind(_))));
    }
}
