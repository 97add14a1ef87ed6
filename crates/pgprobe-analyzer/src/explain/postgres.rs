//! PostgreSQL EXPLAIN (FORMAT JSON) Parser
//!
//! # Examples
//!
//! ```
//! use pgprobe_analyzer::explain::postgres::parse_explain_json;
//!
//! let json_output = r#"{
//!   "Plan": {
//!     "Node Type": "Seq Scan",
//!     "Relation Name": "users",
//!     "Startup Cost": 0.0,
//!     "Total Cost": 10.0,
//!     "Plan Rows": 100,
//!     "Plan Width": 36
//!   }
//! }"#;
//!
//! let plan = parse_explain_json(json_output).unwrap();
//! assert!(plan.has_sequential_scans());
//! ```

use crate::explain::plan::{JoinType, NodeType, PlanNode, QueryPlan};
use pgprobe_core::{ProbeError, Result};
use serde_json::Value;

/// Keys read into dedicated `PlanNode` fields; everything else lands in `extra`
const KNOWN_KEYS: &[&str] = &[
    "Node Type",
    "Relation Name",
    "Schema",
    "Alias",
    "Parent Relationship",
    "Startup Cost",
    "Total Cost",
    "Plan Rows",
    "Plan Width",
    "Actual Rows",
    "Actual Loops",
    "Filter",
    "Rows Removed by Filter",
    "Index Name",
    "Index Cond",
    "Join Type",
    "Join Filter",
    "Hash Cond",
    "Merge Cond",
    "Sort Key",
    "Sort Method",
    "Plans",
];

/// Parses EXPLAIN JSON text
pub fn parse_explain_json(json: &str) -> Result<QueryPlan> {
    let value: Value = serde_json::from_str(json.trim()).map_err(|e| {
        ProbeError::MalformedPlanInput(format!("EXPLAIN output is not valid JSON: {}", e))
    })?;
    parse_explain_value(&value)
}

/// Parses an already-decoded EXPLAIN document.
///
/// Accepts the one-element array PostgreSQL returns as well as the bare
/// object it wraps. The document must contain a `Plan` object.
pub fn parse_explain_value(value: &Value) -> Result<QueryPlan> {
    let document = match value {
        Value::Array(items) => items.first().ok_or_else(|| {
            ProbeError::MalformedPlanInput("EXPLAIN output is an empty array".into())
        })?,
        other => other,
    };

    let plan_obj = document
        .get("Plan")
        .ok_or_else(|| ProbeError::MalformedPlanInput("Missing Plan object".into()))?;

    let mut plan = QueryPlan::new(parse_plan_node(plan_obj)?);

    // Timing information is only present with EXPLAIN ANALYZE
    plan.planning_time_ms = document.get("Planning Time").and_then(Value::as_f64);
    plan.execution_time_ms = document.get("Execution Time").and_then(Value::as_f64);

    Ok(plan)
}

/// Parses a single plan node (and its children) from JSON
pub fn parse_plan_node(value: &Value) -> Result<PlanNode> {
    let node_type_str = value
        .get("Node Type")
        .and_then(Value::as_str)
        .ok_or_else(|| ProbeError::MalformedPlanInput("Missing Node Type".into()))?;

    let mut node = PlanNode::new(NodeType::from_postgres_str(node_type_str));

    node.relation_name = get_string(value, "Relation Name");
    node.schema = get_string(value, "Schema");
    node.alias = get_string(value, "Alias");
    node.parent_relationship = get_string(value, "Parent Relationship");

    node.startup_cost = value.get("Startup Cost").and_then(Value::as_f64);
    node.total_cost = value.get("Total Cost").and_then(Value::as_f64);
    node.plan_rows = get_row_count(value, "Plan Rows");
    node.plan_width = value
        .get("Plan Width")
        .and_then(Value::as_u64)
        .map(|w| w as u32);

    node.actual_rows = get_row_count(value, "Actual Rows");
    node.actual_loops = get_row_count(value, "Actual Loops");

    node.filter = get_string(value, "Filter");
    node.rows_removed_by_filter = get_row_count(value, "Rows Removed by Filter");

    node.index_name = get_string(value, "Index Name");
    node.index_cond = get_string(value, "Index Cond");

    node.join_type = value
        .get("Join Type")
        .and_then(Value::as_str)
        .and_then(JoinType::parse);
    node.join_filter = get_string(value, "Join Filter");
    node.hash_cond = get_string(value, "Hash Cond");
    node.merge_cond = get_string(value, "Merge Cond");

    if let Some(keys) = value.get("Sort Key").and_then(Value::as_array) {
        node.sort_key = keys
            .iter()
            .filter_map(|k| k.as_str().map(String::from))
            .collect();
    }
    node.sort_method = get_string(value, "Sort Method");

    if let Some(plans) = value.get("Plans").and_then(Value::as_array) {
        for child_value in plans {
            node.children.push(parse_plan_node(child_value)?);
        }
    }

    if let Some(obj) = value.as_object() {
        for (key, val) in obj {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                node.extra.insert(key.clone(), val.clone());
            }
        }
    }

    Ok(node)
}

fn get_string(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

/// Row counts are integers up to PostgreSQL 17 and may be fractional
/// per-loop averages from 18 on
fn get_row_count(value: &Value, key: &str) -> Option<u64> {
    let raw = value.get(key)?;
    raw.as_u64()
        .or_else(|| raw.as_f64().filter(|v| *v >= 0.0).map(|v| v.round() as u64))
}
