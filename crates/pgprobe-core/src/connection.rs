//! Database connection capability

use crate::{ProbeError, QueryResult, Result, Value};
use async_trait::async_trait;

/// A database connection as seen by the diagnostics components.
///
/// Validators only need `query`; the hypothetical-index prober additionally
/// needs `explain`. Both `explain` variants have default implementations that
/// issue PostgreSQL `EXPLAIN (FORMAT JSON ...)` through `query`, so a driver
/// only has to implement the two execution methods.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "postgresql")
    fn driver_name(&self) -> &str;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str) -> Result<QueryResult>;

    /// Execute a statement that does not return rows, returning the affected row count
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Returns the estimated plan of `sql` as EXPLAIN JSON
    async fn explain(&self, sql: &str) -> Result<serde_json::Value> {
        let result = self.query(&format!("EXPLAIN (FORMAT JSON) {}", sql)).await?;
        explain_document(&result)
    }

    /// Executes `sql` and returns the plan annotated with actual row counts and timings
    async fn explain_analyze(&self, sql: &str) -> Result<serde_json::Value> {
        let result = self
            .query(&format!("EXPLAIN (ANALYZE, BUFFERS, FORMAT JSON) {}", sql))
            .await?;
        explain_document(&result)
    }
}

/// Extracts the JSON document from the single-cell result of an EXPLAIN query
pub fn explain_document(result: &QueryResult) -> Result<serde_json::Value> {
    match result.first_value() {
        Some(Value::Json(doc)) => Ok(doc.clone()),
        Some(Value::String(text)) => Ok(serde_json::from_str(text)?),
        Some(other) => Err(ProbeError::MalformedPlanInput(format!(
            "EXPLAIN returned a non-JSON value: {}",
            other
        ))),
        None => Err(ProbeError::MalformedPlanInput(
            "EXPLAIN returned no rows".into(),
        )),
    }
}

/// Truncates SQL for log fields
pub fn sql_preview(sql: &str) -> String {
    sql.chars().take(100).collect()
}
