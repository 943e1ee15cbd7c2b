//! Application protocol spoken inside the TLS session.
//!
//! # Wire Format
//! ```text
//! client → server   handshake   exactly HANDSHAKE_TOKEN
//! client → server   request     any bytes (content ignored)
//! server → client   response    "OK" | "RATE_LIMIT_EXCEEDED"
//! ```
//!
//! Every message is a single read of at most `capacity` bytes. There is no
//! length prefix or terminator, so peers must not coalesce messages.
//!
//! # Design Decisions
//! - Bounded reads report the byte count and reject oversize or empty messages
//! - The handshake token is not secret; it only filters non-protocol clients
//! - The deny token is a fixed decision notification, not a rate limiter

pub mod codec;
pub mod dispatch;
pub mod handshake;

use std::fmt;
use std::time::Duration;

pub use codec::{read_message, write_message, ProtocolError};
pub use dispatch::{dispatch, DispatchError};
pub use handshake::verify;

/// Token the client must send as its first message.
pub const HANDSHAKE_TOKEN: &[u8] = b"HELLO_SECURE_SERVER";

/// Default per-message capacity in bytes.
pub const DEFAULT_MESSAGE_CAPACITY: usize = 1024;

/// Limits applied to every read and write on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLimits {
    /// Largest accepted message in bytes.
    pub capacity: usize,
    /// Per-operation deadline. `None` waits forever.
    pub io_timeout: Option<Duration>,
}

impl MessageLimits {
    pub fn new(capacity: usize, io_timeout: Option<Duration>) -> Self {
        Self {
            capacity,
            io_timeout,
        }
    }
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_CAPACITY, None)
    }
}

/// The two responses the server can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Response {
    /// Client address is on the access list.
    Ok,
    /// Client address is not on the access list.
    RateLimitExceeded,
}

impl Response {
    /// Map an access decision to its response.
    pub fn for_decision(allowed: bool) -> Self {
        if allowed {
            Response::Ok
        } else {
            Response::RateLimitExceeded
        }
    }

    /// Wire representation.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Response::Ok => b"OK",
            Response::RateLimitExceeded => b"RATE_LIMIT_EXCEEDED",
        }
    }

    /// Label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Response::Ok => "ok",
            Response::RateLimitExceeded => "rate_limit_exceeded",
        }
    }

    /// Recognize a response received from a server.
    pub fn from_wire(bytes: &[u8]) -> Option<Self> {
        [Response::Ok, Response::RateLimitExceeded]
            .into_iter()
            .find(|r| r.as_bytes() == bytes)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
