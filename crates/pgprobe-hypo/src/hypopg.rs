//! hypopg-backed hypothetical indexes

use crate::backend::{HypoIndexBackend, HypoIndexHandle};
use async_trait::async_trait;
use pgprobe_core::{Connection, ProbeError, Result, Value};
use serde::{Deserialize, Serialize};

/// Whether the hypopg extension is usable on a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypoPgStatus {
    pub loaded: bool,
    /// Installed extension version, when loaded
    pub version: Option<String>,
}

impl HypoPgStatus {
    pub fn not_loaded() -> Self {
        Self {
            loaded: false,
            version: None,
        }
    }

    /// Converts an unavailable extension into `DependencyUnavailable`
    pub fn require(&self) -> Result<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(ProbeError::DependencyUnavailable(
                "hypopg extension is not loaded (CREATE EXTENSION hypopg)".into(),
            ))
        }
    }
}

/// Looks up the hypopg extension on `conn`.
///
/// The answer is returned, never cached: extensions can be created or
/// dropped between calls. An empty version string counts as not loaded.
#[tracing::instrument(skip(conn))]
pub async fn detect(conn: &dyn Connection) -> Result<HypoPgStatus> {
    let result = conn
        .query("SELECT extversion FROM pg_extension WHERE extname = 'hypopg'")
        .await?;

    let version = result
        .first_value()
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let status = match version {
        Some(version) => HypoPgStatus {
            loaded: true,
            version: Some(version.to_string()),
        },
        None => HypoPgStatus::not_loaded(),
    };
    tracing::debug!(loaded = status.loaded, version = ?status.version, "hypopg detection");
    Ok(status)
}

/// Adapts any [`Connection`] with hypopg loaded to [`HypoIndexBackend`]
pub struct HypoPg<'a> {
    conn: &'a dyn Connection,
}

impl<'a> HypoPg<'a> {
    pub fn new(conn: &'a dyn Connection) -> Self {
        Self { conn }
    }
}

/// Quotes `text` as a SQL string literal
fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn index_oid(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.to_string().trim().parse().ok())
}

/// hypopg names its indexes `<oid>access_table_columns`
fn oid_from_name(name: &str) -> Option<i64> {
    let rest = name.strip_prefix('<')?;
    let (oid, _) = rest.split_once('>')?;
    oid.parse().ok()
}

#[async_trait]
impl HypoIndexBackend for HypoPg<'_> {
    async fn explain(&self, sql: &str) -> Result<serde_json::Value> {
        self.conn.explain(sql).await
    }

    async fn create_hypothetical_index(&self, ddl: &str) -> Result<HypoIndexHandle> {
        let sql = format!(
            "SELECT indexrelid::bigint, indexname FROM hypopg_create_index({})",
            quote_literal(ddl.trim().trim_end_matches(';'))
        );
        let result = self.conn.query(&sql).await?;

        let row = result.rows.first().ok_or_else(|| {
            ProbeError::QueryExecution("hypopg_create_index returned no rows".into())
        })?;
        let name = row
            .get(1)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let Some(oid) = row.get(0).and_then(index_oid).or_else(|| oid_from_name(&name)) else {
            // The index exists but cannot be dropped by handle
            if let Err(e) = self.conn.query("SELECT hypopg_reset()").await {
                tracing::warn!(error = %e, "failed to reset hypothetical indexes");
            }
            return Err(ProbeError::QueryExecution(
                "hypopg_create_index returned no index oid".into(),
            ));
        };

        tracing::debug!(oid, name = %name, "created hypothetical index");
        Ok(HypoIndexHandle { oid, name })
    }

    async fn drop_hypothetical_index(&self, handle: &HypoIndexHandle) -> Result<()> {
        let result = self
            .conn
            .query(&format!("SELECT hypopg_drop_index({})", handle.oid))
            .await?;

        match result.first_value().and_then(Value::as_bool) {
            Some(false) => Err(ProbeError::QueryExecution(format!(
                "hypothetical index {} no longer exists",
                handle.oid
            ))),
            _ => Ok(()),
        }
    }
}
