use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use tls_gate::protocol::{Response, DEFAULT_MESSAGE_CAPACITY, HANDSHAKE_TOKEN};

#[derive(Parser)]
#[command(name = "tls-gate-cli")]
#[command(about = "Send one handshake and request to a tls-gate server", long_about = None)]
struct Cli {
    /// Server address.
    #[arg(short, long, default_value = "127.0.0.1:4433")]
    addr: String,

    /// PEM certificate (or CA) the server certificate must chain to.
    #[arg(long)]
    ca: PathBuf,

    /// Name to verify in the server certificate.
    #[arg(long, default_value = "localhost")]
    server_name: String,

    /// Handshake to send instead of the protocol token.
    #[arg(long)]
    handshake: Option<String>,

    /// Request payload.
    #[arg(short, long, default_value = "REQUEST")]
    request: String,

    /// Pause between handshake and request, in milliseconds.
    #[arg(long, default_value_t = 100)]
    pause_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut BufReader::new(File::open(&cli.ca)?)) {
        roots.add(cert?)?;
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let tls_config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(tls_config));

    let server_name = ServerName::try_from(cli.server_name.clone())?;
    let tcp = TcpStream::connect(&cli.addr).await?;
    let mut tls = connector.connect(server_name, tcp).await?;

    let handshake = cli
        .handshake
        .as_deref()
        .map(str::as_bytes)
        .unwrap_or(HANDSHAKE_TOKEN);
    tls.write_all(handshake).await?;
    tls.flush().await?;

    // The server reads each message with a single read; keep them apart.
    tokio::time::sleep(Duration::from_millis(cli.pause_ms)).await;

    // The server may already have closed after a rejected handshake.
    if let Err(e) = async {
        tls.write_all(cli.request.as_bytes()).await?;
        tls.flush().await
    }
    .await
    {
        eprintln!("Request not delivered: {}", e);
    }

    let mut buf = vec![0u8; DEFAULT_MESSAGE_CAPACITY];
    match tls.read(&mut buf).await {
        Ok(0) | Err(_) => {
            eprintln!("Server closed the connection without a response");
            std::process::exit(2);
        }
        Ok(n) => match Response::from_wire(&buf[..n]) {
            Some(response) => println!("{}", String::from_utf8_lossy(response.as_bytes())),
            None => {
                eprintln!("Unexpected response: {:?}", String::from_utf8_lossy(&buf[..n]));
                std::process::exit(3);
            }
        },
    }

    Ok(())
}
