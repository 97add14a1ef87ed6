//! pgprobe Core - Shared abstractions for plan diagnostics and query validation
//!
//! This crate provides the types every other pgprobe crate depends on:
//!
//! - `Connection` - The database capability (execute, explain) consumed by
//!   validators and the hypothetical-index prober
//! - `ProbeError` - The error taxonomy shared across the workspace
//! - Common types like `Value`, `Row` and `QueryResult`

mod connection;
mod error;
mod types;

pub use connection::*;
pub use error::*;
pub use types::*;
