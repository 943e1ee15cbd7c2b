//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Track connection state (Accepted → SecurityNegotiated → HandshakeVerified → Dispatched → Closed)
//! - Generate unique connection IDs for tracing
//! - Count live connections, releasing the slot on every exit path

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Per-connection protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Raw TCP stream accepted, nothing negotiated yet.
    Accepted,
    /// TLS session established.
    SecurityNegotiated,
    /// Client sent the handshake token.
    HandshakeVerified,
    /// Response chosen and a write attempted.
    Dispatched,
    /// A step failed; only `Closed` may follow.
    Failed,
    /// Session and connection released. Terminal.
    Closed,
}

impl ConnectionState {
    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Accepted, SecurityNegotiated)
                | (SecurityNegotiated, HandshakeVerified)
                | (HandshakeVerified, Dispatched)
                | (Accepted | SecurityNegotiated | HandshakeVerified | Dispatched, Failed)
                | (Accepted | SecurityNegotiated | HandshakeVerified | Dispatched | Failed, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Accepted => "accepted",
            ConnectionState::SecurityNegotiated => "security_negotiated",
            ConnectionState::HandshakeVerified => "handshake_verified",
            ConnectionState::Dispatched => "dispatched",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempted an illegal state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal connection transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// Ordered record of the states one connection passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTrail {
    states: Vec<ConnectionState>,
}

impl StateTrail {
    /// Start in `Accepted`.
    pub fn new() -> Self {
        Self {
            states: vec![ConnectionState::Accepted],
        }
    }

    pub fn current(&self) -> ConnectionState {
        self.states
            .last()
            .copied()
            .unwrap_or(ConnectionState::Accepted)
    }

    /// Move to `next`, rejecting revisits and moves out of terminal states.
    pub fn advance(&mut self, next: ConnectionState) -> Result<(), InvalidTransition> {
        let from = self.current();
        if !from.can_advance_to(next) {
            return Err(InvalidTransition { from, to: next });
        }
        tracing::trace!(from = %from, to = %next, "Connection state change");
        self.states.push(next);
        Ok(())
    }

    pub fn states(&self) -> &[ConnectionState] {
        &self.states
    }

    /// Number of times `state` appears in the trail.
    pub fn count(&self, state: ConnectionState) -> usize {
        self.states.iter().filter(|s| **s == state).count()
    }
}

impl Default for StateTrail {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks live connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    /// Current count of active connections.
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has been released.
    pub async fn drained(&self) {
        while self.active_count() > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection released");
    }
}
