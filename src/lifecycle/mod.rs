//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Apply overrides → Validate → Load identity → Bind listener → Accept
//!
//! Shutdown (shutdown.rs):
//!     trigger() → Stop accepting → Drain in-flight connections → run() returns
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then identity, then the listener
//! - Shutdown is a broadcast the embedding code owns; no OS signal handling

pub mod shutdown;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{bootstrap, prepare_config, StartupError};
