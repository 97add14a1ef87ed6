//! Validation result types

use pgprobe_core::{ProbeError, Value, ValueRow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The metamorphic technique that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationMethod {
    /// Ternary Logic Partitioning
    #[serde(rename = "TLP")]
    Tlp,
    /// Non-optimizing Reference Engine Construction
    #[serde(rename = "NoREC")]
    NoRec,
}

impl ValidationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tlp => "TLP",
            Self::NoRec => "NoREC",
        }
    }
}

impl fmt::Display for ValidationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of problem a validator reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    /// The TRUE partition disagrees with the original query
    PartitionMismatch,
    /// The optimized and non-optimizable forms return different row counts
    OptimizationBug,
    /// The predicate could not be rewritten safely
    PartitionGenerationError,
    /// A generated query failed to execute
    ExecutionError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

/// A single finding with supporting evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub issue_type: IssueType,
    pub description: String,
    pub severity: IssueSeverity,
    /// Row counts, query texts and example rows backing the finding
    #[serde(default)]
    pub evidence: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        issue_type: IssueType,
        severity: IssueSeverity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            issue_type,
            description: description.into(),
            severity,
            evidence: BTreeMap::new(),
            suggested_fix: None,
        }
    }

    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }

    pub fn with_suggested_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }
}

/// Outcome of one validator run.
///
/// A validator that could not test the query (no WHERE clause) passes with
/// low confidence; a validator that failed to run reports `passed = false`
/// with confidence 0.0. Neither case is an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub method: ValidationMethod,
    pub issues: Vec<ValidationIssue>,
    pub execution_time_ms: f64,
    pub queries_executed: usize,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ValidationResult {
    /// A passing result
    pub fn pass(method: ValidationMethod, confidence: f64) -> Self {
        Self {
            passed: true,
            confidence: confidence.clamp(0.0, 1.0),
            method,
            issues: Vec::new(),
            execution_time_ms: 0.0,
            queries_executed: 0,
            metadata: BTreeMap::new(),
        }
    }

    /// A failing result carrying `issue`
    pub fn fail(method: ValidationMethod, confidence: f64, issue: ValidationIssue) -> Self {
        Self {
            passed: false,
            issues: vec![issue],
            ..Self::pass(method, confidence)
        }
    }

    /// The query could not be tested by this method
    pub fn not_applicable(method: ValidationMethod, reason: impl Into<String>) -> Self {
        Self::pass(method, NOT_APPLICABLE_CONFIDENCE)
            .with_metadata("skipped", true)
            .with_metadata("reason", reason.into())
    }

    /// A validator that could not complete. Confidence is 0.0.
    pub fn from_error(method: ValidationMethod, err: &ProbeError) -> Self {
        let issue_type = match err {
            ProbeError::PartitionGeneration(_) => IssueType::PartitionGenerationError,
            _ => IssueType::ExecutionError,
        };
        let issue = ValidationIssue::new(issue_type, IssueSeverity::Error, err.to_string())
            .with_evidence("error_kind", err.kind());
        Self::fail(method, 0.0, issue)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_queries_executed(mut self, count: usize) -> Self {
        self.queries_executed = count;
        self
    }

    pub fn with_execution_time(mut self, ms: f64) -> Self {
        self.execution_time_ms = ms;
        self
    }

    /// Returns true if the validator could not test the query at all
    pub fn is_skipped(&self) -> bool {
        self.metadata
            .get("skipped")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// Confidence reported when a query has nothing to validate
pub const NOT_APPLICABLE_CONFIDENCE: f64 = 0.3;

/// Renders rows for evidence maps: NULL stays `null`, everything else is text
pub fn rows_evidence(rows: &[ValueRow]) -> serde_json::Value {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|value| match value {
                    Value::Null => serde_json::Value::Null,
                    other => serde_json::Value::String(other.to_string()),
                })
                .collect::<serde_json::Value>()
        })
        .collect()
}
