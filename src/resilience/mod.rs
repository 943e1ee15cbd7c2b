//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Per connection:
//!     → timeouts.rs (bound TLS negotiation, each read and the response write)
//! ```
//!
//! # Design Decisions
//! - Nothing is retried; a failed step closes the connection
//! - Timeouts never change the wire format

pub mod timeouts;
