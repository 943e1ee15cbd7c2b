//! Per-connection supervisor.
//!
//! Drives one accepted connection through
//! `Accepted → SecurityNegotiated → HandshakeVerified → Dispatched → Closed`,
//! diverting to `Failed` on any step's error. Every path ends in `Closed`
//! exactly once, and no error escapes to the accept loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::net::connection::{ConnectionId, ConnectionState, StateTrail};
use crate::net::tls::{NegotiationError, ServerIdentity, Session};
use crate::observability::metrics;
use crate::protocol::{self, DispatchError, MessageLimits, ProtocolError, Response};
use crate::resilience::timeouts;
use crate::security::access_control::{client_address, AccessList};

/// Why a connection ended in `Failed`.
#[derive(Debug)]
pub enum FailureReason {
    /// TLS negotiation failed; no application data was read.
    Negotiation(NegotiationError),
    /// The handshake message could not be read.
    HandshakeRead(ProtocolError),
    /// The handshake message was not the protocol token.
    TokenMismatch,
    /// The request message could not be read; no response was sent.
    RequestRead(ProtocolError),
}

impl FailureReason {
    fn label(&self) -> &'static str {
        match self {
            FailureReason::Negotiation(_) => "negotiation_failed",
            FailureReason::HandshakeRead(_) => "handshake_read_failed",
            FailureReason::TokenMismatch => "token_mismatch",
            FailureReason::RequestRead(_) => "request_read_failed",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Negotiation(e) => write!(f, "{}", e),
            FailureReason::HandshakeRead(e) => write!(f, "handshake read failed: {}", e),
            FailureReason::TokenMismatch => write!(f, "handshake token mismatch"),
            FailureReason::RequestRead(e) => write!(f, "request read failed: {}", e),
        }
    }
}

/// How a connection ended.
#[derive(Debug)]
pub enum Outcome {
    /// The response was written and flushed.
    Responded(Response),
    /// The response was chosen but the write failed.
    ResponseWriteFailed(Response),
    /// A step before dispatch failed; nothing was sent.
    Failed(FailureReason),
}

impl Outcome {
    /// Label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Responded(Response::Ok) => "ok",
            Outcome::Responded(Response::RateLimitExceeded) => "rate_limit_exceeded",
            Outcome::ResponseWriteFailed(_) => "response_write_failed",
            Outcome::Failed(reason) => reason.label(),
        }
    }

    /// The response that reached the client, if any.
    pub fn response(&self) -> Option<Response> {
        match self {
            Outcome::Responded(r) => Some(*r),
            _ => None,
        }
    }
}

/// Summary of one finished connection.
#[derive(Debug)]
pub struct ConnectionReport {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub trail: StateTrail,
    pub outcome: Outcome,
}

/// Runs the protocol pipeline for accepted connections.
///
/// Cheap to clone; holds only the shared identity and access list.
#[derive(Debug, Clone)]
pub struct Supervisor {
    identity: ServerIdentity,
    access: Arc<AccessList>,
    limits: MessageLimits,
}

impl Supervisor {
    pub fn new(identity: ServerIdentity, access: Arc<AccessList>, limits: MessageLimits) -> Self {
        Self {
            identity,
            access,
            limits,
        }
    }

    /// Drive one connection to `Closed`. Never fails; the outcome is reported.
    pub async fn handle(
        &self,
        id: ConnectionId,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> ConnectionReport {
        let span = tracing::info_span!("connection", connection_id = %id, peer_addr = %peer);

        async move {
            let started = Instant::now();
            let mut trail = StateTrail::new();

            let outcome = match self.identity.negotiate(stream, self.limits.io_timeout).await {
                Ok(mut session) => {
                    enter(&mut trail, ConnectionState::SecurityNegotiated);
                    let client = client_address(&peer);
                    let outcome =
                        run_protocol(&mut session, &client, &self.access, self.limits, &mut trail)
                            .await;
                    self.close_session(session).await;
                    outcome
                }
                // The acceptor owned the stream and dropped it on failure.
                Err(e) => Outcome::Failed(FailureReason::Negotiation(e)),
            };

            if let Outcome::Failed(reason) = &outcome {
                tracing::warn!(reason = %reason, "Connection failed");
                enter(&mut trail, ConnectionState::Failed);
            }
            enter(&mut trail, ConnectionState::Closed);

            metrics::record_connection(outcome.label(), started);
            tracing::debug!(
                outcome = outcome.label(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Connection closed"
            );

            ConnectionReport {
                id,
                peer,
                trail,
                outcome,
            }
        }
        .instrument(span)
        .await
    }

    /// Shut the session down, then release the TCP connection.
    async fn close_session(&self, mut session: Session) {
        match timeouts::within(self.limits.io_timeout, session.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "TLS shutdown failed"),
            Err(e) => tracing::debug!(error = %e, "TLS shutdown timed out"),
        }
        let (tcp, _) = session.into_inner();
        drop(tcp);
    }
}

/// Application protocol over an established session: verify, decide, dispatch.
///
/// Leaves `trail` in `HandshakeVerified` or `Dispatched`; the caller records
/// `Failed` and `Closed`.
pub async fn run_protocol<S>(
    session: &mut S,
    client: &str,
    access: &AccessList,
    limits: MessageLimits,
    trail: &mut StateTrail,
) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match protocol::verify(session, limits).await {
        Ok(true) => enter(trail, ConnectionState::HandshakeVerified),
        Ok(false) => return Outcome::Failed(FailureReason::TokenMismatch),
        Err(e) => return Outcome::Failed(FailureReason::HandshakeRead(e)),
    }

    let allowed = access.is_allowed(client);
    tracing::debug!(client = %client, allowed, "Access decision");

    match protocol::dispatch(session, allowed, limits).await {
        Ok(response) => {
            enter(trail, ConnectionState::Dispatched);
            metrics::record_response(response);
            tracing::info!(client = %client, response = %response, "Response sent");
            Outcome::Responded(response)
        }
        Err(DispatchError::Write { response, source }) => {
            enter(trail, ConnectionState::Dispatched);
            metrics::record_write_failure(response);
            tracing::warn!(client = %client, response = %response, error = %source, "Response write failed");
            Outcome::ResponseWriteFailed(response)
        }
        Err(DispatchError::Request(e)) => Outcome::Failed(FailureReason::RequestRead(e)),
    }
}

fn enter(trail: &mut StateTrail, next: ConnectionState) {
    if let Err(e) = trail.advance(next) {
        tracing::error!(error = %e, "Connection state machine violated");
    }
}
