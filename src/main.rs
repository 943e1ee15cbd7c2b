//! tls-gate server.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client                    ┌──────────────────────────────────────────────┐
//!   ─────── TCP ─────────────▶│ net::listener ──▶ net::tls (negotiate)       │
//!                             │                        │                     │
//!                             │                        ▼                     │
//!                             │        protocol::handshake (verify token)    │
//!                             │                        │                     │
//!                             │                        ▼                     │
//!                             │ security::access_control ──▶ protocol::dispatch
//!   ◀──── "OK" | "RATE_LIMIT_EXCEEDED" ─────────────────┘                    │
//!                             │                                              │
//!                             │  server::supervisor owns each connection     │
//!                             │  from accept to close                        │
//!                             └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use tls_gate::config::{ConnectionMode, ServerConfig};
use tls_gate::lifecycle::{bootstrap, prepare_config, Shutdown, StartupError};
use tls_gate::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "tls-gate")]
#[command(about = "Minimal TLS request/response server with a static access list", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(long)]
    bind: Option<String>,

    /// Override tls.cert_path.
    #[arg(long)]
    cert: Option<String>,

    /// Override tls.key_path.
    #[arg(long)]
    key: Option<String>,

    /// Replace the access list. Repeat for multiple addresses.
    #[arg(long = "allow")]
    allow: Vec<String>,

    /// Handle each connection on its own task.
    #[arg(long)]
    concurrent: bool,
}

impl Cli {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(cert) = self.cert {
            config.tls.cert_path = cert;
        }
        if let Some(key) = self.key {
            config.tls.key_path = key;
        }
        if !self.allow.is_empty() {
            config.access.allowed_addresses = self.allow;
        }
        if self.concurrent {
            config.listener.mode = ConnectionMode::Concurrent;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let mut cli = Cli::parse();
    let path = cli.config.take();
    let config = prepare_config(path.as_deref(), |config| cli.apply(config))?;

    logging::init_logging(&config.observability);
    tracing::info!("tls-gate v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        mode = ?config.listener.mode,
        allowed_addresses = config.access.allowed_addresses.len(),
        max_message_size = config.protocol.max_message_size,
        io_timeout_secs = config.timeouts.io_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validated above.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let (server, listener) = bootstrap(&config).await.inspect_err(|e| {
        tracing::error!(error = %e, "Startup failed");
    })?;

    // Runs until the process is terminated.
    let shutdown = Shutdown::new();
    server.run(listener, shutdown.subscribe()).await;
    Ok(())
}
