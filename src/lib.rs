//! Minimal encrypted request/response server.
//!
//! Each connection is upgraded to TLS, must open with a fixed handshake
//! token, and receives exactly one response chosen by a static access list.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod resilience;
pub mod security;
pub mod server;

pub use config::schema::ServerConfig;
pub use server::Server;
