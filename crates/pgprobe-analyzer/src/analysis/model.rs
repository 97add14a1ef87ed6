//! Analysis result types
//!
//! Field names are part of the output contract: downstream consumers key off
//! `total_cost`, `bottlenecks[].severity`, `summary` and
//! `optimization_priority` directly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a detected bottleneck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Sort rank, HIGH first
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A performance issue found at one plan node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    /// PostgreSQL spelling of the node type, e.g. `Seq Scan`
    pub node_type: String,
    pub severity: Severity,
    /// What was detected
    pub reason: String,
    /// Remediation, usually `CREATE INDEX` DDL or an `ANALYZE` statement
    pub suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
    /// Share of the total plan cost, 0 - 100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_percentage: Option<f64>,
}

impl Bottleneck {
    pub fn new(
        node_type: impl Into<String>,
        severity: Severity,
        reason: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            severity,
            reason: reason.into(),
            suggestion: suggestion.into(),
            cost: None,
            table: None,
            rows: None,
            cost_percentage: None,
        }
    }

    pub fn with_cost(mut self, cost: Option<f64>) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_table(mut self, table: Option<String>) -> Self {
        self.table = table;
        self
    }

    pub fn with_rows(mut self, rows: Option<u64>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_cost_percentage(mut self, percentage: Option<f64>) -> Self {
        self.cost_percentage = percentage;
        self
    }
}

/// Result of analyzing one EXPLAIN plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Total estimated cost of the plan (the root's total cost)
    pub total_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_time_ms: Option<f64>,
    /// Sorted by severity (HIGH first), then by cost descending
    pub bottlenecks: Vec<Bottleneck>,
    pub summary: String,
    pub optimization_priority: Severity,
}

impl AnalysisResult {
    /// Returns true if any bottleneck was found
    pub fn has_bottlenecks(&self) -> bool {
        !self.bottlenecks.is_empty()
    }

    /// Number of bottlenecks with the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.bottlenecks
            .iter()
            .filter(|b| b.severity == severity)
            .count()
    }

    /// Index DDL statements suggested by the bottlenecks, in bottleneck order
    pub fn index_suggestions(&self) -> Vec<&str> {
        self.bottlenecks
            .iter()
            .flat_map(|b| b.suggestion.lines())
            .filter(|line| line.trim_start().starts_with("CREATE INDEX"))
            .collect()
    }
}

/// Priority of a bottleneck list: the most severe severity present, LOW when empty
pub fn optimization_priority(bottlenecks: &[Bottleneck]) -> Severity {
    if bottlenecks.iter().any(|b| b.severity == Severity::High) {
        Severity::High
    } else if bottlenecks.iter().any(|b| b.severity == Severity::Medium) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Sorts by severity rank, then cost descending; a missing cost counts as zero.
/// The sort is stable, so equal entries keep detection order.
pub fn sort_bottlenecks(bottlenecks: &mut [Bottleneck]) {
    bottlenecks.sort_by(|a, b| {
        a.severity.rank().cmp(&b.severity.rank()).then_with(|| {
            let a_cost = a.cost.unwrap_or(0.0);
            let b_cost = b.cost.unwrap_or(0.0);
            b_cost.total_cmp(&a_cost)
        })
    });
}
