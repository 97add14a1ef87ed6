//! pgprobe - diagnostics for PostgreSQL queries
//!
//! Three independent components share one connection capability:
//!
//! - [`ExplainAnalyzer`] turns `EXPLAIN (FORMAT JSON)` output into ranked
//!   bottlenecks with index and statistics suggestions
//! - [`ValidationSuite`] runs the TLP and NoREC metamorphic checks against a
//!   query to catch wrong-result bugs
//! - [`HypoIndexProber`] measures what a candidate index would do to a plan
//!   through hypopg, without building it
//!
//! [`ProbeConfig`] loads every component's settings from one TOML document
//! and [`Diagnostics`] wires the components up from it.

mod config;
mod diagnostics;

pub use config::*;
pub use diagnostics::*;

pub use pgprobe_analyzer as analyzer;
pub use pgprobe_core as core;
pub use pgprobe_driver_postgres as postgres;
pub use pgprobe_hypo as hypo;
pub use pgprobe_validation as validation;

pub use pgprobe_analyzer::{
    AnalysisResult, AnalyzerThresholds, Bottleneck, ExplainAnalyzer, Severity,
};
pub use pgprobe_core::{Connection, ProbeError, QueryResult, Result, Value};
pub use pgprobe_driver_postgres::{PostgresConfig, PostgresConnection, SslMode};
pub use pgprobe_hypo::{HypoIndexProber, HypoIndexResult, ProberConfig};
pub use pgprobe_validation::{
    ComparatorConfig, SuiteResult, ValidationIssue, ValidationResult, ValidationSuite,
};
