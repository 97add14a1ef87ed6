//! In-memory connection for validator tests

use async_trait::async_trait;
use pgprobe_core::{Connection, ProbeError, QueryResult, Result, ValueRow};
use std::sync::Mutex;

enum Reply {
    Rows(Vec<ValueRow>),
    Error(String),
}

/// Answers each query with the reply of the first rule whose pattern the SQL
/// contains; unmatched queries return no rows
#[derive(Default)]
pub(crate) struct MockConnection {
    rules: Vec<(String, Reply)>,
    pub(crate) seen: Mutex<Vec<String>>,
}

impl MockConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(mut self, pattern: &str, rows: Vec<ValueRow>) -> Self {
        self.rules.push((pattern.to_string(), Reply::Rows(rows)));
        self
    }

    pub(crate) fn fail_on(mut self, pattern: &str, message: &str) -> Self {
        self.rules
            .push((pattern.to_string(), Reply::Error(message.to_string())));
        self
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.seen.lock().unwrap().push(sql.to_string());
        match self.rules.iter().find(|(pattern, _)| sql.contains(pattern.as_str())) {
            Some((_, Reply::Rows(rows))) => Ok(QueryResult::from_values(&["v"], rows.clone())),
            Some((_, Reply::Error(message))) => Err(ProbeError::QueryExecution(message.clone())),
            None => Ok(QueryResult::empty()),
        }
    }

    async fn execute(&self, _sql: &str) -> Result<u64> {
        Ok(0)
    }
}

/// `n` single-column integer rows
pub(crate) fn int_rows(n: i64) -> Vec<ValueRow> {
    (0..n).map(|i| vec![pgprobe_core::Value::Int64(i)]).collect()
}
