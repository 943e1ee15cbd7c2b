//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;

use tls_gate::config::{ConnectionMode, ServerConfig};
use tls_gate::lifecycle::Shutdown;
use tls_gate::net::listener::Listener;
use tls_gate::net::tls::ServerIdentity;
use tls_gate::server::{ConnectionReport, Server};

/// Self-signed certificate for `localhost`.
pub struct TestPki {
    pub cert: CertificateDer<'static>,
    key_der: Vec<u8>,
}

impl TestPki {
    pub fn generate() -> Self {
        let ck = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        Self {
            cert: ck.cert.der().clone(),
            key_der: ck.key_pair.serialize_der(),
        }
    }

    pub fn identity(&self) -> ServerIdentity {
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()));
        ServerIdentity::from_der(vec![self.cert.clone()], key).unwrap()
    }

    /// Client connector that trusts only this certificate.
    pub fn connector(&self) -> TlsConnector {
        let mut roots = rustls::RootCertStore::empty();
        roots.add(self.cert.clone()).unwrap();
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(roots)
            .with_no_client_auth();
        TlsConnector::from(Arc::new(config))
    }
}

/// A running server on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub pki: TestPki,
    pub reports: mpsc::UnboundedReceiver<ConnectionReport>,
    shutdown: Shutdown,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start(allowed: &[&str], mode: ConnectionMode, io_secs: u64) -> Self {
        let mut config = ServerConfig::default();
        config.access.allowed_addresses = allowed.iter().map(|a| a.to_string()).collect();
        config.listener.mode = mode;
        config.timeouts.io_secs = io_secs;
        Self::start_with(config).await
    }

    /// Start with a full configuration. The bind address is ignored.
    pub async fn start_with(config: ServerConfig) -> Self {
        let pki = TestPki::generate();
        let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = tcp.local_addr().unwrap();
        let listener = Listener::from_tcp(tcp, config.listener.max_connections);

        let (tx, reports) = mpsc::unbounded_channel();
        let server = Server::new(&config, pki.identity()).with_reports(tx);
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

        Self {
            addr,
            pki,
            reports,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Wait for the next finished connection.
    pub async fn next_report(&mut self) -> ConnectionReport {
        tokio::time::timeout(Duration::from_secs(10), self.reports.recv())
            .await
            .expect("no connection report within 10s")
            .expect("server stopped")
    }

    /// Trigger shutdown and return the server task, which finishes once
    /// in-flight connections have drained.
    pub fn stop(&mut self) -> JoinHandle<()> {
        self.shutdown.trigger();
        self.handle.take().expect("server already stopped")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Connect over TLS, send `handshake` then `request`, and collect everything
/// the server sends until it closes.
pub async fn exchange(server: &TestServer, handshake: &[u8], request: &[u8]) -> Vec<u8> {
    let tcp = TcpStream::connect(server.addr).await.unwrap();
    let name = ServerName::try_from("localhost").unwrap();
    let mut tls = server.pki.connector().connect(name, tcp).await.unwrap();

    tls.write_all(handshake).await.unwrap();
    tls.flush().await.unwrap();
    // One message per server read.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let _ = tls.write_all(request).await;
    let _ = tls.flush().await;

    let mut received = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        match tls.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => received.extend_from_slice(&buf[..n]),
        }
    }
    received
}
