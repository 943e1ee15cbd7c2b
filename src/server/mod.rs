//! Accept loop and per-connection scheduling.
//!
//! # Data Flow
//! ```text
//! Listener::accept
//!     → Supervisor::handle (negotiate → verify → dispatch → close)
//!     → ConnectionReport (logged, counted, optionally forwarded)
//! ```
//!
//! # Design Decisions
//! - Sequential by default: one connection runs to `Closed` before the next
//!   accept, so a silent client stalls the server until `timeouts.io_secs`
//! - Concurrent mode spawns one task per connection with the same state machine
//! - Accept failures are logged and the loop keeps going after a short pause
//! - Shutdown stops accepting, then waits for in-flight connections

pub mod supervisor;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use crate::config::{ConnectionMode, ServerConfig};
use crate::net::connection::ConnectionTracker;
use crate::net::listener::Listener;
use crate::net::tls::ServerIdentity;
use crate::protocol::MessageLimits;
use crate::resilience::timeouts;
use crate::security::access_control::AccessList;

pub use supervisor::{ConnectionReport, FailureReason, Outcome, Supervisor};

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// The encrypted request/response server.
pub struct Server {
    supervisor: Supervisor,
    mode: ConnectionMode,
    tracker: ConnectionTracker,
    reports: Option<mpsc::UnboundedSender<ConnectionReport>>,
}

impl Server {
    /// Create a server from validated configuration and a loaded identity.
    pub fn new(config: &ServerConfig, identity: ServerIdentity) -> Self {
        let access = Arc::new(AccessList::new(config.access.allowed_addresses.iter().cloned()));
        let limits = MessageLimits::new(
            config.protocol.max_message_size,
            timeouts::from_secs(config.timeouts.io_secs),
        );

        if limits.io_timeout.is_none() && config.listener.mode == ConnectionMode::Sequential {
            tracing::warn!("No I/O timeout in sequential mode: one silent client blocks all others");
        }
        tracing::debug!(
            allowed_addresses = config.access.allowed_addresses.len(),
            "Access list loaded"
        );

        Self {
            supervisor: Supervisor::new(identity, access, limits),
            mode: config.listener.mode,
            tracker: ConnectionTracker::new(),
            reports: None,
        }
    }

    /// Forward every finished connection's report to `tx`.
    pub fn with_reports(mut self, tx: mpsc::UnboundedSender<ConnectionReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    /// Accept connections until `shutdown` fires or its sender is dropped.
    ///
    /// In sequential mode the connection in progress finishes before the
    /// signal is seen. In concurrent mode the loop stops accepting, then waits
    /// for every spawned connection to reach `Closed`.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(mode = ?self.mode, "Server accepting connections");

        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => accepted,
            };

            let (stream, peer, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    // Persistent failures (e.g. EMFILE) must not spin the loop.
                    tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                    continue;
                }
            };

            let guard = self.tracker.track();
            tracing::debug!(
                connection_id = %guard.id(),
                active_connections = self.tracker.active_count(),
                "Connection tracked"
            );

            match self.mode {
                ConnectionMode::Sequential => {
                    let report = self.supervisor.handle(guard.id(), stream, peer).await;
                    drop(guard);
                    drop(permit);
                    self.publish(report);
                }
                ConnectionMode::Concurrent => {
                    let supervisor = self.supervisor.clone();
                    let reports = self.reports.clone();
                    tokio::spawn(async move {
                        let report = supervisor.handle(guard.id(), stream, peer).await;
                        drop(guard);
                        drop(permit);
                        if let Some(tx) = reports {
                            let _ = tx.send(report);
                        }
                    });
                }
            }
        }

        let in_flight = self.tracker.active_count();
        tracing::info!(in_flight, "Shutdown requested, no longer accepting");
        self.tracker.drained().await;
        tracing::info!("Server stopped");
    }

    fn publish(&self, report: ConnectionReport) {
        if let Some(tx) = &self.reports {
            let _ = tx.send(report);
        }
    }
}
