//! PostgreSQL driver for pgprobe
//!
//! Implements `pgprobe_core::Connection` over `tokio-postgres`, with optional
//! TLS through `native-tls`. None of the diagnostics crates depend on this one;
//! it is the concrete connection handed to them in production.

mod config;
mod connection;
mod decode;
mod tls;

pub use config::*;
pub use connection::*;
