//! TLS identity loading and per-connection session negotiation.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::resilience::timeouts::{self, TimedOut};

/// An established TLS session over one accepted TCP connection.
pub type Session = TlsStream<TcpStream>;

/// Errors loading the server identity. Always fatal at startup.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no certificates found in {0:?}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0:?}")]
    NoPrivateKey(PathBuf),

    /// Certificate and key are unusable together (e.g. mismatched key).
    #[error("invalid TLS identity: {0}")]
    Tls(#[from] rustls::Error),
}

/// Errors negotiating TLS for a single connection.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] io::Error),

    #[error(transparent)]
    TimedOut(#[from] TimedOut),
}

/// Server certificate and key, loaded once and shared by every session.
#[derive(Clone)]
pub struct ServerIdentity {
    acceptor: TlsAcceptor,
}

impl std::fmt::Debug for ServerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerIdentity").finish_non_exhaustive()
    }
}

impl ServerIdentity {
    /// Load a PEM certificate chain and private key from disk.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, IdentityError> {
        let cert_chain = load_certs(cert_path)?;
        let private_key = load_private_key(key_path)?;
        Self::from_der(cert_chain, private_key)
    }

    /// Build an identity from already-decoded material.
    ///
    /// Fails if the key does not match the end-entity certificate.
    pub fn from_der(
        cert_chain: Vec<CertificateDer<'static>>,
        private_key: PrivateKeyDer<'static>,
    ) -> Result<Self, IdentityError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(cert_chain, private_key)?;

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }

    /// Negotiate a server-side TLS session over a freshly accepted connection.
    ///
    /// Takes ownership of the stream; afterwards all I/O goes through the session.
    pub async fn negotiate(
        &self,
        stream: TcpStream,
        io_timeout: Option<Duration>,
    ) -> Result<Session, NegotiationError> {
        timeouts::within(io_timeout, self.acceptor.accept(stream))
            .await?
            .map_err(NegotiationError::Handshake)
    }
}

fn open(path: &Path) -> Result<BufReader<File>, IdentityError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, IdentityError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(IdentityError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, IdentityError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| IdentityError::NoPrivateKey(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pem_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn self_signed() -> rcgen::CertifiedKey {
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap()
    }

    #[test]
    fn loads_matching_pem_pair() {
        let ck = self_signed();
        let cert = pem_file(&ck.cert.pem());
        let key = pem_file(&ck.key_pair.serialize_pem());

        assert!(ServerIdentity::from_pem_files(cert.path(), key.path()).is_ok());
    }

    #[test]
    fn missing_file_is_io_error() {
        let ck = self_signed();
        let key = pem_file(&ck.key_pair.serialize_pem());

        let err = ServerIdentity::from_pem_files(Path::new("/no/such/cert.pem"), key.path())
            .unwrap_err();
        assert!(matches!(err, IdentityError::Io { .. }));
    }

    #[test]
    fn empty_pem_files_are_rejected() {
        let ck = self_signed();
        let cert = pem_file(&ck.cert.pem());
        let key = pem_file(&ck.key_pair.serialize_pem());
        let empty = pem_file("");

        let err = ServerIdentity::from_pem_files(empty.path(), key.path()).unwrap_err();
        assert!(matches!(err, IdentityError::NoCertificates(_)));

        let err = ServerIdentity::from_pem_files(cert.path(), empty.path()).unwrap_err();
        assert!(matches!(err, IdentityError::NoPrivateKey(_)));
    }

    #[test]
    fn mismatched_key_is_rejected() {
        let first = self_signed();
        let second = self_signed();
        let cert = pem_file(&first.cert.pem());
        let key = pem_file(&second.key_pair.serialize_pem());

        let err = ServerIdentity::from_pem_files(cert.path(), key.path()).unwrap_err();
        assert!(matches!(err, IdentityError::Tls(_)));
    }
}
