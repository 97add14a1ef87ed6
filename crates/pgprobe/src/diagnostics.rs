//! All components wired from one configuration

use crate::config::ProbeConfig;
use pgprobe_analyzer::{AnalysisResult, ExplainAnalyzer};
use pgprobe_core::{Connection, ProbeError, Result, sql_preview};
use pgprobe_driver_postgres::PostgresConnection;
use pgprobe_hypo::{HypoIndexProber, HypoIndexResult, HypoPg, detect};
use pgprobe_validation::{SuiteResult, ValidationSuite};

/// How the plan handed to the analyzer is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExplainMode {
    /// `EXPLAIN`: planner estimates only, the query is not run
    #[default]
    Estimate,
    /// `EXPLAIN ANALYZE`: the query runs and actual row counts are reported
    Execute,
}

#[derive(Debug)]
pub struct Diagnostics {
    analyzer: ExplainAnalyzer,
    suite: ValidationSuite,
    prober: HypoIndexProber,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(&ProbeConfig::default())
    }
}

impl Diagnostics {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            analyzer: ExplainAnalyzer::with_thresholds(config.analyzer.clone()),
            suite: ValidationSuite::new(config.comparator.clone()),
            prober: HypoIndexProber::new(config.prober.clone()),
        }
    }

    /// Validates `config` before building the components
    pub fn try_new(config: &ProbeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn analyzer(&self) -> &ExplainAnalyzer {
        &self.analyzer
    }

    pub fn suite(&self) -> &ValidationSuite {
        &self.suite
    }

    pub fn prober(&self) -> &HypoIndexProber {
        &self.prober
    }

    /// Opens the connection described by the `[database]` section
    pub async fn connect(config: &ProbeConfig) -> Result<PostgresConnection> {
        let database = config.database.as_ref().ok_or_else(|| {
            ProbeError::Configuration("no [database] section configured".into())
        })?;
        PostgresConnection::connect(database).await
    }

    /// Explains `sql` on `conn` and analyzes the plan
    #[tracing::instrument(skip(self, sql, conn), fields(sql_preview = %sql_preview(sql)))]
    pub async fn analyze_query(
        &self,
        sql: &str,
        conn: &dyn Connection,
        mode: ExplainMode,
    ) -> Result<AnalysisResult> {
        let document = match mode {
            ExplainMode::Estimate => conn.explain(sql).await?,
            ExplainMode::Execute => conn.explain_analyze(sql).await?,
        };
        self.analyzer.analyze(&document)
    }

    pub async fn validate(&self, sql: &str, conn: &dyn Connection) -> SuiteResult {
        self.suite.validate_all(sql, conn).await
    }

    /// Probes every `CREATE INDEX` the analysis suggested, best first.
    ///
    /// Returns `DependencyUnavailable` when hypopg is not loaded; individual
    /// probe failures are reported in their results.
    #[tracing::instrument(skip(self, sql, conn, analysis), fields(sql_preview = %sql_preview(sql)))]
    pub async fn probe_suggestions(
        &self,
        sql: &str,
        conn: &dyn Connection,
        analysis: &AnalysisResult,
    ) -> Result<Vec<HypoIndexResult>> {
        let mut ddls: Vec<String> = Vec::new();
        for suggestion in analysis.index_suggestions() {
            let ddl = suggestion.trim().to_string();
            if !ddls.contains(&ddl) {
                ddls.push(ddl);
            }
        }
        if ddls.is_empty() {
            return Ok(Vec::new());
        }

        detect(conn).await?.require()?;
        tracing::debug!(candidates = ddls.len(), "probing suggested indexes");
        Ok(self
            .prober
            .test_indexes(sql, &ddls, &HypoPg::new(conn))
            .await)
    }
}

#[cfg(test)]
mod tests;
