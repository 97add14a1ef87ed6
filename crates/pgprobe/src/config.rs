//! TOML configuration for every pgprobe component
//!
//! ```toml
//! [analyzer]
//! seq_scan_min_rows = 50000
//!
//! [comparator]
//! tolerance = 1e-9
//!
//! [prober]
//! min_improvement_pct = 20.0
//!
//! [database]
//! host = "db.internal"
//! database = "shop"
//! ssl_mode = "verify-full"
//! ```
//!
//! Every section and key is optional; unknown keys are rejected.

use pgprobe_analyzer::AnalyzerThresholds;
use pgprobe_core::{ProbeError, Result};
use pgprobe_driver_postgres::PostgresConfig;
use pgprobe_hypo::ProberConfig;
use pgprobe_validation::ComparatorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    pub analyzer: AnalyzerThresholds,
    pub comparator: ComparatorConfig,
    pub prober: ProberConfig,
    /// Connection settings, only needed when pgprobe opens the connection itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PostgresConfig>,
}

impl ProbeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ProbeError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProbeError::Configuration(format!(
                "Failed to read config from {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ProbeError::Configuration(format!("Failed to serialize config: {}", e)))
    }

    pub fn with_analyzer(mut self, analyzer: AnalyzerThresholds) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_comparator(mut self, comparator: ComparatorConfig) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn with_prober(mut self, prober: ProberConfig) -> Self {
        self.prober = prober;
        self
    }

    pub fn with_database(mut self, database: PostgresConfig) -> Self {
        self.database = Some(database);
        self
    }

    /// Checks every section, naming the first one out of range
    pub fn validate(&self) -> Result<()> {
        let sections = [
            ("analyzer", self.analyzer.validate()),
            ("comparator", self.comparator.validate()),
            ("prober", self.prober.validate()),
            (
                "database",
                self.database.as_ref().map_or(Ok(()), PostgresConfig::validate),
            ),
        ];
        for (section, outcome) in sections {
            if let Err(message) = outcome {
                return Err(ProbeError::Configuration(format!("[{}] {}", section, message)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
