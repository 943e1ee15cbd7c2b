//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! After a verified handshake:
//!     → access_control.rs (peer IP against the static access list)
//!     → allow → "OK" / deny → "RATE_LIMIT_EXCEEDED"
//! ```
//!
//! # Design Decisions
//! - Fail closed: anything not on the list is denied
//! - The access list is immutable and injected, never global
//! - No rate is counted; the deny token is only a decision notification

pub mod access_control;

pub use access_control::AccessList;
