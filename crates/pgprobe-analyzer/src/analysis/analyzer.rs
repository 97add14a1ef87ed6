//! Explain Analyzer - bottleneck detection over a parsed plan tree

use super::config::AnalyzerThresholds;
use super::model::{
    AnalysisResult, Bottleneck, Severity, optimization_priority, sort_bottlenecks,
};
use super::rules::{DetectionRule, RuleContext, default_rules};
use crate::explain::{PlanNode, QueryPlan, parse_explain_json, parse_explain_value};
use pgprobe_core::Result;
use std::fmt;

/// Detects bottlenecks in PostgreSQL EXPLAIN plans.
///
/// Holds no per-call state: analyzing the same plan twice yields the same result.
pub struct ExplainAnalyzer {
    thresholds: AnalyzerThresholds,
    rules: Vec<Box<dyn DetectionRule>>,
}

impl fmt::Debug for ExplainAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplainAnalyzer")
            .field("thresholds", &self.thresholds)
            .field(
                "rules",
                &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for ExplainAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ExplainAnalyzer {
    /// Creates an analyzer with default thresholds and the built-in rules
    pub fn new() -> Self {
        Self::with_thresholds(AnalyzerThresholds::default())
    }

    pub fn with_thresholds(thresholds: AnalyzerThresholds) -> Self {
        Self {
            thresholds,
            rules: default_rules(),
        }
    }

    /// Adds a rule applied after the built-in ones
    pub fn with_rule(mut self, rule: impl DetectionRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn thresholds(&self) -> &AnalyzerThresholds {
        &self.thresholds
    }

    /// Analyzes a decoded EXPLAIN (FORMAT JSON) document, either the
    /// one-element array or the bare object.
    ///
    /// Fails with `MalformedPlanInput` if there is no `Plan` object.
    pub fn analyze(&self, explain: &serde_json::Value) -> Result<AnalysisResult> {
        let plan = parse_explain_value(explain)?;
        Ok(self.analyze_plan(&plan))
    }

    /// Analyzes EXPLAIN JSON text
    pub fn analyze_str(&self, explain: &str) -> Result<AnalysisResult> {
        let plan = parse_explain_json(explain)?;
        Ok(self.analyze_plan(&plan))
    }

    /// Analyzes an already-parsed plan
    pub fn analyze_plan(&self, plan: &QueryPlan) -> AnalysisResult {
        let total_cost = plan.total_cost();
        let mut bottlenecks = Vec::new();
        self.visit(&plan.root, total_cost, true, &mut bottlenecks);

        sort_bottlenecks(&mut bottlenecks);
        let priority = optimization_priority(&bottlenecks);
        let summary = generate_summary(total_cost, &bottlenecks);

        tracing::debug!(
            total_cost,
            bottlenecks = bottlenecks.len(),
            priority = %priority,
            "plan analysis complete"
        );

        AnalysisResult {
            total_cost,
            execution_time_ms: plan.execution_time_ms,
            planning_time_ms: plan.planning_time_ms,
            bottlenecks,
            summary,
            optimization_priority: priority,
        }
    }

    fn visit(&self, node: &PlanNode, total_cost: f64, is_root: bool, out: &mut Vec<Bottleneck>) {
        // Gather nodes repeat their workers' cost; only their children are inspected
        if !node.node_type.is_gather() {
            let ctx = RuleContext {
                thresholds: &self.thresholds,
                total_cost,
                is_root,
            };
            for rule in &self.rules {
                match rule.check(node, &ctx) {
                    Ok(Some(bottleneck)) => out.push(bottleneck),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            rule = rule.name(),
                            node_type = %node.node_type,
                            error = %e,
                            "detection rule failed, skipping"
                        );
                    }
                }
            }
        }

        for child in &node.children {
            self.visit(child, total_cost, false, out);
        }
    }
}

fn generate_summary(total_cost: f64, bottlenecks: &[Bottleneck]) -> String {
    if bottlenecks.is_empty() {
        return format!(
            "No significant bottlenecks detected (total cost {:.2}).",
            total_cost
        );
    }

    let count = |severity: Severity| bottlenecks.iter().filter(|b| b.severity == severity).count();
    let mut summary = format!(
        "Found {} bottleneck(s): {} high, {} medium, {} low (total cost {:.2}).",
        bottlenecks.len(),
        count(Severity::High),
        count(Severity::Medium),
        count(Severity::Low),
        total_cost
    );
    if let Some(top) = bottlenecks.first() {
        summary.push_str(&format!(" Top issue: {}.", top.reason));
    }
    summary
}

#[cfg(test)]
mod tests;
