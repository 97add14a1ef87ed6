//! Detection thresholds for the plan analyzer

use serde::{Deserialize, Serialize};

/// Thresholds the detection rules compare plan nodes against.
///
/// Supplied once at analyzer construction and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerThresholds {
    /// Sequential scans reading more rows than this are flagged
    pub seq_scan_min_rows: u64,
    /// Filtered sequential scans costing more than this are flagged
    pub seq_scan_min_cost: f64,
    /// Share of the total plan cost (0.0 - 1.0) above which a node is flagged
    pub cost_significance_ratio: f64,
    /// actual/estimated row ratio above which statistics are considered stale
    pub estimate_error_ratio: f64,
    /// Nested loops producing more rows than this are flagged
    pub nested_loop_max_rows: u64,
    /// Sorts costing more than this get an index suggestion
    pub sort_min_cost: f64,
    /// Sorts costing more than this are HIGH severity
    pub sort_high_cost: f64,
}

impl Default for AnalyzerThresholds {
    fn default() -> Self {
        Self {
            seq_scan_min_rows: 10_000,
            seq_scan_min_cost: 1_000.0,
            cost_significance_ratio: 0.5,
            estimate_error_ratio: 10.0,
            nested_loop_max_rows: 10_000,
            sort_min_cost: 1_000.0,
            sort_high_cost: 100_000.0,
        }
    }
}

impl AnalyzerThresholds {
    /// Creates thresholds with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seq_scan_min_rows(mut self, rows: u64) -> Self {
        self.seq_scan_min_rows = rows;
        self
    }

    pub fn with_seq_scan_min_cost(mut self, cost: f64) -> Self {
        self.seq_scan_min_cost = cost;
        self
    }

    /// Sets the cost significance ratio, clamped to 0.0 - 1.0
    pub fn with_cost_significance_ratio(mut self, ratio: f64) -> Self {
        self.cost_significance_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_estimate_error_ratio(mut self, ratio: f64) -> Self {
        self.estimate_error_ratio = ratio;
        self
    }

    pub fn with_nested_loop_max_rows(mut self, rows: u64) -> Self {
        self.nested_loop_max_rows = rows;
        self
    }

    /// Sets the sort cost thresholds (index suggestion, HIGH severity)
    pub fn with_sort_costs(mut self, min_cost: f64, high_cost: f64) -> Self {
        self.sort_min_cost = min_cost;
        self.sort_high_cost = high_cost;
        self
    }

    /// Checks that every threshold is in range, returning a description of
    /// the first violation
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.cost_significance_ratio) {
            return Err(format!(
                "cost_significance_ratio must be within 0.0..=1.0, got {}",
                self.cost_significance_ratio
            ));
        }
        if self.estimate_error_ratio < 1.0 {
            return Err(format!(
                "estimate_error_ratio must be at least 1.0, got {}",
                self.estimate_error_ratio
            ));
        }
        if self.seq_scan_min_cost < 0.0 || self.sort_min_cost < 0.0 {
            return Err("cost thresholds must not be negative".to_string());
        }
        if self.sort_high_cost < self.sort_min_cost {
            return Err(format!(
                "sort_high_cost ({}) must not be below sort_min_cost ({})",
                self.sort_high_cost, self.sort_min_cost
            ));
        }
        Ok(())
    }
}
