use super::*;
use async_trait::async_trait;
use pgprobe_analyzer::Severity;
use pgprobe_core::{QueryResult, Value, ValueRow};
use pgprobe_hypo::ProberConfig;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;

const SQL: &str = "SELECT * FROM orders WHERE o_custkey = 123 AND o_orderstatus = 'F'";

/// Replies are queued per pattern; the last reply of a queue repeats
struct ScriptedConnection {
    rules: Vec<(&'static str, Mutex<VecDeque<Vec<ValueRow>>>)>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedConnection {
    fn new() -> Self {
        Self {
            rules: Vec::new(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn on(mut self, pattern: &'static str, replies: Vec<Vec<ValueRow>>) -> Self {
        self.rules.push((pattern, Mutex::new(replies.into())));
        self
    }

    fn count(&self, pattern: &str) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|sql| sql.contains(pattern))
            .count()
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn driver_name(&self) -> &str {
        "scripted"
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.seen.lock().unwrap().push(sql.to_string());
        for (pattern, replies) in &self.rules {
            if sql.contains(pattern) {
                let mut replies = replies.lock().unwrap();
                let rows = if replies.len() > 1 {
                    replies.pop_front().unwrap()
                } else {
                    replies.front().cloned().unwrap_or_default()
                };
                return Ok(QueryResult::from_values(&["v"], rows));
            }
        }
        Ok(QueryResult::empty())
    }

    async fn execute(&self, _sql: &str) -> Result<u64> {
        Ok(0)
    }
}

fn plan(doc: serde_json::Value) -> Vec<ValueRow> {
    vec![vec![Value::Json(doc)]]
}

fn seq_scan_plan() -> Vec<ValueRow> {
    plan(json!([{
        "Plan": {
            "Node Type": "Seq Scan",
            "Relation Name": "orders",
            "Alias": "orders",
            "Total Cost": 2000.0,
            "Plan Rows": 50000,
            "Filter": "((o_custkey = 123) AND (o_orderstatus = 'F'::bpchar))"
        }
    }]))
}

fn index_scan_plan() -> Vec<ValueRow> {
    plan(json!([{
        "Plan": {
            "Node Type": "Index Scan",
            "Index Name": "<13543>btree_orders_o_custkey_o_orderstatus",
            "Relation Name": "orders",
            "Total Cost": 40.0,
            "Plan Rows": 12
        }
    }]))
}

#[tokio::test]
async fn test_analyze_query_estimate_uses_plain_explain() {
    let conn = ScriptedConnection::new().on("EXPLAIN", vec![seq_scan_plan()]);
    let diagnostics = Diagnostics::default();

    let analysis = diagnostics
        .analyze_query(SQL, &conn, ExplainMode::Estimate)
        .await
        .unwrap();

    assert_eq!(analysis.optimization_priority, Severity::High);
    assert_eq!(
        analysis.index_suggestions(),
        vec!["CREATE INDEX idx_orders_composite ON orders(o_custkey, o_orderstatus);"]
    );
    assert_eq!(conn.count("EXPLAIN (FORMAT JSON)"), 1);
    assert_eq!(conn.count("ANALYZE"), 0);
}

#[tokio::test]
async fn test_analyze_query_execute_uses_explain_analyze() {
    let conn = ScriptedConnection::new().on("EXPLAIN", vec![seq_scan_plan()]);
    Diagnostics::default()
        .analyze_query(SQL, &conn, ExplainMode::Execute)
        .await
        .unwrap();

    assert_eq!(conn.count("EXPLAIN (ANALYZE, BUFFERS, FORMAT JSON)"), 1);
}

#[tokio::test]
async fn test_analyze_query_propagates_malformed_plans() {
    let conn =
        ScriptedConnection::new().on("EXPLAIN", vec![plan(json!([{"Query Text": "SELECT 1"}]))]);
    let err = Diagnostics::default()
        .analyze_query(SQL, &conn, ExplainMode::Estimate)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "MalformedPlanInput");
}

#[tokio::test]
async fn test_probe_suggestions_end_to_end() {
    let conn = ScriptedConnection::new()
        .on("pg_extension", vec![vec![vec![Value::from("1.4.1")]]])
        .on(
            "hypopg_create_index",
            vec![vec![vec![
                Value::Int64(13543),
                Value::from("<13543>btree_orders_o_custkey_o_orderstatus"),
            ]]],
        )
        .on("hypopg_drop_index", vec![vec![vec![Value::Bool(true)]]])
        .on("EXPLAIN", vec![seq_scan_plan(), seq_scan_plan(), index_scan_plan()]);
    let diagnostics = Diagnostics::default();

    let analysis = diagnostics
        .analyze_query(SQL, &conn, ExplainMode::Estimate)
        .await
        .unwrap();
    let results = diagnostics
        .probe_suggestions(SQL, &conn, &analysis)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(result.would_be_used);
    assert_eq!(result.cost_before, 2000.0);
    assert_eq!(result.cost_after, 40.0);
    assert_eq!(result.improvement_pct, 98.0);
    assert!(diagnostics.prober().is_worthwhile(result));
    assert_eq!(conn.count("hypopg_drop_index(13543)"), 1);
}

#[tokio::test]
async fn test_probe_suggestions_requires_hypopg() {
    let conn = ScriptedConnection::new().on("EXPLAIN", vec![seq_scan_plan()]);
    let diagnostics = Diagnostics::default();
    let analysis = diagnostics
        .analyze_query(SQL, &conn, ExplainMode::Estimate)
        .await
        .unwrap();

    let err = diagnostics
        .probe_suggestions(SQL, &conn, &analysis)
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::DependencyUnavailable(_)));
    assert_eq!(conn.count("hypopg_create_index"), 0);
}

#[tokio::test]
async fn test_probe_suggestions_without_candidates_skips_detection() {
    let conn = ScriptedConnection::new();
    let analysis = Diagnostics::default().analyzer().analyze_str(
        r#"{"Plan": {"Node Type": "Index Scan", "Relation Name": "orders", "Total Cost": 8.3}}"#,
    )
    .unwrap();

    let results = Diagnostics::default()
        .probe_suggestions(SQL, &conn, &analysis)
        .await
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(conn.count("pg_extension"), 0);
}

#[tokio::test]
async fn test_validate_runs_both_validators() {
    let rows: Vec<ValueRow> = (0..4).map(|i| vec![Value::Int64(i)]).collect();
    let conn = ScriptedConnection::new()
        .on("IS TRUE", vec![rows.clone()])
        .on("IS FALSE", vec![vec![]])
        .on("IS NULL", vec![vec![]])
        .on("= TRUE", vec![rows.clone()])
        .on("SELECT", vec![rows]);

    let result = Diagnostics::default()
        .validate("SELECT id FROM t WHERE id < 4", &conn)
        .await;
    assert!(result.passed(), "{:?}", result);
}

#[test]
fn test_try_new_rejects_invalid_config() {
    let config = ProbeConfig::new().with_prober(ProberConfig::new().with_min_improvement_pct(-1.0));
    assert!(Diagnostics::try_new(&config).is_err());
}

#[tokio::test]
async fn test_connect_without_database_section() {
    let err = Diagnostics::connect(&ProbeConfig::default()).await.err().unwrap();
    assert!(matches!(err, ProbeError::Configuration(_)));
}
