//! pgprobe Hypo - estimating index benefit without building the index
//!
//! A candidate `CREATE INDEX` statement is registered as a hypothetical
//! index, the query is re-planned, and the before/after costs are compared.
//! The hypothetical index is always removed again before a probe returns.

mod backend;
mod hypopg;
mod prober;

pub use backend::{HypoIndexBackend, HypoIndexHandle};
pub use hypopg::{HypoPg, HypoPgStatus, detect};
pub use prober::{HypoIndexProber, HypoIndexResult, ProberConfig};
