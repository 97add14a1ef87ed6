//! Detection rules
//!
//! Each rule looks at a single plan node and reports at most one bottleneck.
//! Rules never see each other's output.

use super::config::AnalyzerThresholds;
use super::model::{Bottleneck, Severity};
use crate::explain::{NodeType, PlanNode};
use crate::filter::{self, FilterParseError};
use pgprobe_core::{ProbeError, Result};

impl From<FilterParseError> for ProbeError {
    fn from(err: FilterParseError) -> Self {
        ProbeError::MalformedPlanInput(format!("unparseable plan expression: {}", err))
    }
}

/// Per-node context handed to every rule
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub thresholds: &'a AnalyzerThresholds,
    /// Total cost of the whole plan
    pub total_cost: f64,
    /// True when the node is the plan root
    pub is_root: bool,
}

impl RuleContext<'_> {
    /// Share of the total plan cost taken by `cost`, as a percentage
    fn cost_percentage(&self, cost: Option<f64>) -> Option<f64> {
        let cost = cost?;
        (self.total_cost > 0.0).then(|| cost / self.total_cost * 100.0)
    }
}

/// A bottleneck detector applied to every non-Gather node of a plan
pub trait DetectionRule: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Inspects one node. `Ok(None)` means nothing to report.
    fn check(&self, node: &PlanNode, ctx: &RuleContext<'_>) -> Result<Option<Bottleneck>>;
}

/// The built-in rules in the order they are applied
pub fn default_rules() -> Vec<Box<dyn DetectionRule>> {
    vec![
        Box::new(SeqScanRule),
        Box::new(HighCostRule),
        Box::new(EstimateErrorRule),
        Box::new(NestedLoopRule),
        Box::new(SortRule),
        Box::new(JoinIndexRule),
    ]
}

fn table_label(table: Option<&str>) -> &str {
    table.unwrap_or("unknown")
}

/// Large or expensive filtered sequential scans
pub struct SeqScanRule;

impl DetectionRule for SeqScanRule {
    fn name(&self) -> &'static str {
        "seq_scan"
    }

    fn check(&self, node: &PlanNode, ctx: &RuleContext<'_>) -> Result<Option<Bottleneck>> {
        if node.node_type != NodeType::SeqScan {
            return Ok(None);
        }

        let rows = node.effective_rows();
        let cost = node.total_cost;
        let many_rows = rows.is_some_and(|r| r > ctx.thresholds.seq_scan_min_rows);
        let costly_filter =
            node.filter.is_some() && cost.is_some_and(|c| c > ctx.thresholds.seq_scan_min_cost);
        if !many_rows && !costly_filter {
            return Ok(None);
        }

        let table = node.qualified_relation();
        let label = table_label(table.as_deref());

        let ddl = match (&node.filter, &table) {
            (Some(text), Some(table)) => match filter::analyze_filter(text) {
                Ok(shape) => filter::suggest_filter_indexes(table, &shape),
                Err(err) => {
                    tracing::debug!(error = %err, filter = %text, "filter not parseable, using generic suggestion");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };
        let suggestion = if ddl.is_empty() {
            format!(
                "Consider adding an index on {} for the columns used in WHERE and JOIN clauses",
                label
            )
        } else {
            ddl.join("\n")
        };

        let reason = match rows {
            Some(rows) => format!("Sequential scan on {} reading {} rows", label, rows),
            None => format!("Sequential scan on {}", label),
        };

        Ok(Some(
            Bottleneck::new(node.node_type.as_str(), Severity::High, reason, suggestion)
                .with_cost(cost)
                .with_table(table)
                .with_rows(rows)
                .with_cost_percentage(ctx.cost_percentage(cost)),
        ))
    }
}

/// Nodes taking a large share of the total plan cost. The root is exempt.
pub struct HighCostRule;

impl DetectionRule for HighCostRule {
    fn name(&self) -> &'static str {
        "high_cost"
    }

    fn check(&self, node: &PlanNode, ctx: &RuleContext<'_>) -> Result<Option<Bottleneck>> {
        if ctx.is_root || ctx.total_cost <= 0.0 {
            return Ok(None);
        }
        let Some(cost) = node.total_cost else {
            return Ok(None);
        };

        let ratio = cost / ctx.total_cost;
        if ratio <= ctx.thresholds.cost_significance_ratio {
            return Ok(None);
        }

        let percentage = ratio * 100.0;
        let table = node.qualified_relation();
        Ok(Some(
            Bottleneck::new(
                node.node_type.as_str(),
                Severity::Medium,
                format!(
                    "{} accounts for {:.1}% of the total query cost",
                    node.node_type, percentage
                ),
                format!("Focus optimization on this {} node", node.node_type),
            )
            .with_cost(Some(cost))
            .with_table(table)
            .with_rows(node.effective_rows())
            .with_cost_percentage(Some(percentage)),
        ))
    }
}

/// Row estimates far below the actual row count, a sign of stale statistics
pub struct EstimateErrorRule;

impl DetectionRule for EstimateErrorRule {
    fn name(&self) -> &'static str {
        "estimate_error"
    }

    fn check(&self, node: &PlanNode, ctx: &RuleContext<'_>) -> Result<Option<Bottleneck>> {
        let (Some(actual), Some(estimated)) = (node.actual_rows, node.plan_rows) else {
            return Ok(None);
        };
        if actual == 0 || estimated == 0 {
            return Ok(None);
        }

        let ratio = actual as f64 / estimated as f64;
        if ratio <= ctx.thresholds.estimate_error_ratio {
            return Ok(None);
        }

        let table = node
            .find_base_relation()
            .and_then(PlanNode::qualified_relation);
        let suggestion = match &table {
            Some(table) => format!("ANALYZE {};", table),
            None => "ANALYZE;".to_string(),
        };

        Ok(Some(
            Bottleneck::new(
                node.node_type.as_str(),
                Severity::Low,
                format!(
                    "Row estimate off by {:.1}x (estimated {}, actual {})",
                    ratio, estimated, actual
                ),
                suggestion,
            )
            .with_cost(node.total_cost)
            .with_table(table)
            .with_rows(Some(actual))
            .with_cost_percentage(ctx.cost_percentage(node.total_cost)),
        ))
    }
}

/// Nested loops producing many rows; needs `EXPLAIN ANALYZE` actual counts
pub struct NestedLoopRule;

impl DetectionRule for NestedLoopRule {
    fn name(&self) -> &'static str {
        "nested_loop"
    }

    fn check(&self, node: &PlanNode, ctx: &RuleContext<'_>) -> Result<Option<Bottleneck>> {
        if node.node_type != NodeType::NestedLoop {
            return Ok(None);
        }
        let Some(rows) = node.actual_rows else {
            return Ok(None);
        };
        if rows <= ctx.thresholds.nested_loop_max_rows {
            return Ok(None);
        }

        Ok(Some(
            Bottleneck::new(
                node.node_type.as_str(),
                Severity::Medium,
                format!("Nested loop join producing {} rows", rows),
                "Index the inner side's join columns, or raise work_mem so the planner can pick a hash join",
            )
            .with_cost(node.total_cost)
            .with_rows(Some(rows))
            .with_cost_percentage(ctx.cost_percentage(node.total_cost)),
        ))
    }
}

/// Sorts that spill to disk or are expensive enough to be replaced by an index
pub struct SortRule;

impl DetectionRule for SortRule {
    fn name(&self) -> &'static str {
        "sort"
    }

    fn check(&self, node: &PlanNode, ctx: &RuleContext<'_>) -> Result<Option<Bottleneck>> {
        if !node.node_type.is_sort() {
            return Ok(None);
        }

        let cost = node.total_cost;
        let base = node.children.iter().find_map(PlanNode::find_base_relation);
        let table = base.and_then(PlanNode::qualified_relation);

        if let Some(method) = &node.sort_method {
            let lowered = method.to_lowercase();
            if lowered.contains("external") || lowered.contains("disk") {
                return Ok(Some(
                    Bottleneck::new(
                        node.node_type.as_str(),
                        Severity::High,
                        format!("Sort spilled to disk ({})", method),
                        "Increase work_mem or add an index matching the sort order",
                    )
                    .with_cost(cost)
                    .with_table(table)
                    .with_rows(node.effective_rows())
                    .with_cost_percentage(ctx.cost_percentage(cost)),
                ));
            }
        }

        let Some(sort_cost) = cost else {
            return Ok(None);
        };
        if node.sort_key.is_empty() || sort_cost <= ctx.thresholds.sort_min_cost {
            return Ok(None);
        }

        let severity = if sort_cost > ctx.thresholds.sort_high_cost {
            Severity::High
        } else {
            Severity::Medium
        };

        let mut columns = Vec::with_capacity(node.sort_key.len());
        for key in &node.sort_key {
            match filter::parse_sort_key(key)? {
                Some(column) => columns.push(column.index_expr()),
                None => {
                    columns.clear();
                    break;
                }
            }
        }

        let suggestion = match &table {
            Some(table) if !columns.is_empty() => filter::suggest_column_index(table, &columns),
            _ => "Consider an index matching the ORDER BY columns".to_string(),
        };

        Ok(Some(
            Bottleneck::new(
                node.node_type.as_str(),
                severity,
                format!(
                    "Sort on {} (cost {:.2}) by {}",
                    table_label(table.as_deref()),
                    sort_cost,
                    node.sort_key.join(", ")
                ),
                suggestion,
            )
            .with_cost(cost)
            .with_table(table)
            .with_rows(node.effective_rows())
            .with_cost_percentage(ctx.cost_percentage(cost)),
        ))
    }
}

/// Joins whose inner side is read without an index on the join columns
pub struct JoinIndexRule;

impl DetectionRule for JoinIndexRule {
    fn name(&self) -> &'static str {
        "join_index"
    }

    fn check(&self, node: &PlanNode, ctx: &RuleContext<'_>) -> Result<Option<Bottleneck>> {
        if !node.node_type.is_join() {
            return Ok(None);
        }
        let Some(condition) = node.join_condition() else {
            return Ok(None);
        };
        let Some(inner) = node.inner_child() else {
            return Ok(None);
        };
        if inner.uses_index_scan() {
            return Ok(None);
        }
        let Some(base) = inner.find_base_relation() else {
            return Ok(None);
        };
        let (Some(table), Some(alias)) = (
            base.qualified_relation(),
            base.alias.as_deref().or(base.relation_name.as_deref()),
        ) else {
            return Ok(None);
        };

        let columns = filter::columns_for_alias(condition, alias)?;
        if columns.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            Bottleneck::new(
                node.node_type.as_str(),
                Severity::Medium,
                format!(
                    "{} reads {} without an index on {}",
                    node.node_type,
                    table,
                    columns.join(", ")
                ),
                filter::suggest_column_index(&table, &columns),
            )
            .with_cost(node.total_cost)
            .with_table(Some(table))
            .with_rows(node.effective_rows())
            .with_cost_percentage(ctx.cost_percentage(node.total_cost)),
        ))
    }
}
