//! pgprobe Analyzer - EXPLAIN plan parsing and bottleneck detection
//!
//! This crate provides functionality for:
//! - Parsing PostgreSQL `EXPLAIN (FORMAT JSON)` output into a typed plan tree
//! - Detecting bottlenecks (sequential scans, spilled sorts, unindexed joins, ...)
//! - Synthesizing `CREATE INDEX` and `ANALYZE` suggestions from filter text

pub mod analysis;
pub mod explain;
pub mod filter;

pub use analysis::*;
pub use explain::*;
