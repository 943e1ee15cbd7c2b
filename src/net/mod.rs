//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → tls.rs (server-side TLS negotiation)
//!     → connection.rs (lifecycle tracking, state machine)
//!     → Hand off to the protocol layer
//!
//! Connection States:
//!     Accepted → SecurityNegotiated → HandshakeVerified → Dispatched → Closed
//!                       (any step may divert to Failed → Closed)
//! ```
//!
//! # Design Decisions
//! - Server identity loads once; a bad certificate or key aborts startup
//! - Negotiation failures stay local to their connection
//! - No plaintext I/O happens on the raw TCP stream

pub mod connection;
pub mod listener;
pub mod tls;
