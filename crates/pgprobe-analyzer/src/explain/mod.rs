//! Query EXPLAIN Parser Module
//!
//! Parses PostgreSQL `EXPLAIN (FORMAT JSON[, ANALYZE, VERBOSE, BUFFERS])` output.
//! Both valid document shapes are accepted: the one-element array PostgreSQL
//! emits and the bare object inside it.
//!
//! # Example
//!
//! ```
//! use pgprobe_analyzer::explain::{parse_explain_json, NodeType};
//!
//! let json = r#"[{"Plan": {"Node Type": "Seq Scan", "Relation Name": "users"}}]"#;
//! let plan = parse_explain_json(json).unwrap();
//! assert_eq!(plan.root.node_type, NodeType::SeqScan);
//! ```

pub mod plan;
pub mod postgres;

pub use plan::{JoinType, NodeType, PlanNode, PlanNodeIterator, QueryPlan};
pub use postgres::{parse_explain_json, parse_explain_value, parse_plan_node};
