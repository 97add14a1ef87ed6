//! PostgreSQL connection implementation

use crate::config::PostgresConfig;
use crate::decode::postgres_to_value;
use crate::tls::make_tls_connector;
use async_trait::async_trait;
use pgprobe_core::{
    ColumnMeta, Connection, ProbeError, QueryResult, Result, Row, sql_preview,
};
use std::time::Instant;
use tokio_postgres::{Client, NoTls};

/// Renders a server error with its SQLSTATE and any detail, hint or column
fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    match error.as_db_error() {
        Some(db_error) => describe_db_error(
            db_error.code().code(),
            db_error.message(),
            db_error.detail(),
            db_error.hint(),
            db_error.column(),
        ),
        None => error.to_string(),
    }
}

fn describe_db_error(
    code: &str,
    message: &str,
    detail: Option<&str>,
    hint: Option<&str>,
    column: Option<&str>,
) -> String {
    let mut text = message.to_string();
    for (label, part) in [("detail", detail), ("hint", hint), ("column", column)] {
        if let Some(part) = part
            && !part.trim().is_empty()
        {
            text.push_str(&format!(" ({}: {})", label, part));
        }
    }
    format!("{} [SQLSTATE {}]", text, code)
}

fn query_error(error: tokio_postgres::Error) -> ProbeError {
    ProbeError::QueryExecution(format_postgres_error(&error))
}

/// A single tokio-postgres session.
///
/// The connection's I/O future runs on a spawned Tokio task for as long as
/// the client is alive; statements are sent sequentially by the callers.
pub struct PostgresConnection {
    client: Client,
    database: String,
}

impl PostgresConnection {
    /// Connects and applies `statement_timeout_ms` when configured
    #[tracing::instrument(skip(config), fields(host = %config.host, port = config.port, database = %config.database, ssl_mode = %config.ssl_mode))]
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        config.validate().map_err(ProbeError::Configuration)?;

        let pg_config = config.to_pg_config();
        let client = if config.ssl_mode.uses_tls() {
            let tls = make_tls_connector(config)?;
            let (client, connection) = pg_config.connect(tls).await.map_err(connect_error)?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });
            client
        } else {
            let (client, connection) = pg_config.connect(NoTls).await.map_err(connect_error)?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });
            client
        };

        let connection = Self {
            client,
            database: config.database.clone(),
        };
        if let Some(ms) = config.statement_timeout_ms {
            connection.set_statement_timeout(ms).await?;
        }

        tracing::info!("PostgreSQL connection established");
        Ok(connection)
    }

    /// Parses `conn_str` (key/value or URL form) and connects
    pub async fn connect_str(conn_str: &str) -> Result<Self> {
        Self::connect(&PostgresConfig::from_connection_string(conn_str)?).await
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Bounds every later statement on this session; 0 disables the limit
    pub async fn set_statement_timeout(&self, ms: u64) -> Result<()> {
        tracing::debug!(statement_timeout_ms = ms, "setting statement timeout");
        self.client
            .batch_execute(&format!("SET statement_timeout = {}", ms))
            .await
            .map_err(query_error)
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql_preview(sql)))]
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let start_time = Instant::now();

        // Prepared first so empty result sets still carry their columns
        let statement = self.client.prepare(sql).await.map_err(query_error)?;
        let pg_rows = self
            .client
            .query(&statement, &[])
            .await
            .map_err(query_error)?;

        let columns: Vec<ColumnMeta> = statement
            .columns()
            .iter()
            .enumerate()
            .map(|(ordinal, col)| ColumnMeta {
                name: col.name().to_string(),
                data_type: col.type_().name().to_string(),
                ordinal,
            })
            .collect();
        let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

        let mut rows = Vec::with_capacity(pg_rows.len());
        for pg_row in &pg_rows {
            let values = (0..columns.len())
                .map(|idx| postgres_to_value(pg_row, idx))
                .collect::<Result<Vec<_>>>()?;
            rows.push(Row::new(column_names.clone(), values));
        }

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(rows = rows.len(), execution_time_ms, "query completed");

        Ok(QueryResult {
            id: uuid::Uuid::new_v4(),
            columns,
            rows,
            execution_time_ms,
        })
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql_preview(sql)))]
    async fn execute(&self, sql: &str) -> Result<u64> {
        let affected = self.client.execute(sql, &[]).await.map_err(query_error)?;
        tracing::debug!(affected_rows = affected, "statement completed");
        Ok(affected)
    }
}

fn connect_error(error: tokio_postgres::Error) -> ProbeError {
    ProbeError::ConnectionFailure(format!(
        "Failed to connect to PostgreSQL: {}",
        format_postgres_error(&error)
    ))
}

#[cfg(test)]
mod tests;
