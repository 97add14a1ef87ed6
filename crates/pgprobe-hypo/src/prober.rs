//! Hypothetical Index Prober

use crate::backend::{HypoIndexBackend, HypoIndexHandle};
use crate::hypopg::{HypoPg, detect};
use pgprobe_analyzer::explain::{PlanNode, QueryPlan, parse_explain_value};
use pgprobe_core::{Connection, ProbeError, Result, sql_preview};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Longest plan snippet kept in a result
const MAX_SNIPPET_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProberConfig {
    /// Minimum cost reduction, in percent, for an index to be worthwhile
    pub min_improvement_pct: f64,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            min_improvement_pct: 10.0,
        }
    }
}

impl ProberConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_improvement_pct(mut self, pct: f64) -> Self {
        self.min_improvement_pct = pct;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.min_improvement_pct.is_finite() || !(0.0..=100.0).contains(&self.min_improvement_pct)
        {
            return Err(format!(
                "min_improvement_pct must be within 0.0..=100.0, got {}",
                self.min_improvement_pct
            ));
        }
        Ok(())
    }
}

/// Before/after verdict for one candidate index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypoIndexResult {
    pub index_def: String,
    /// The re-planned query reads through the hypothetical index
    pub would_be_used: bool,
    pub cost_before: f64,
    pub cost_after: f64,
    /// (before - after) / before * 100; negative means the plan got worse
    pub improvement_pct: f64,
    /// Indented outline of the plan with the hypothetical index
    pub plan_snippet: String,
    /// Set when the probe failed; all costs are zero then
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HypoIndexResult {
    fn failed(index_def: &str, err: &ProbeError) -> Self {
        Self {
            index_def: index_def.to_string(),
            would_be_used: false,
            cost_before: 0.0,
            cost_after: 0.0,
            improvement_pct: 0.0,
            plan_snippet: String::new(),
            error: Some(err.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Estimates the benefit of candidate indexes
#[derive(Debug, Clone, Default)]
pub struct HypoIndexProber {
    config: ProberConfig,
}

impl HypoIndexProber {
    pub fn new(config: ProberConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProberConfig {
        &self.config
    }

    /// Probes one candidate index. Never fails: errors are reported in the
    /// result, and the hypothetical index is dropped on every path once it
    /// has been created.
    #[tracing::instrument(skip(self, sql, ddl, backend), fields(sql_preview = %sql_preview(sql), ddl = %ddl))]
    pub async fn test_index(
        &self,
        sql: &str,
        ddl: &str,
        backend: &dyn HypoIndexBackend,
    ) -> HypoIndexResult {
        match self.run(sql, ddl, backend).await {
            Ok(result) => {
                tracing::info!(
                    would_be_used = result.would_be_used,
                    improvement_pct = result.improvement_pct,
                    "hypothetical index probed"
                );
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "hypothetical index probe failed");
                HypoIndexResult::failed(ddl, &e)
            }
        }
    }

    /// Probes several candidates one after another, best improvement first.
    /// Failed probes sort last.
    pub async fn test_indexes(
        &self,
        sql: &str,
        ddls: &[String],
        backend: &dyn HypoIndexBackend,
    ) -> Vec<HypoIndexResult> {
        let mut results = Vec::with_capacity(ddls.len());
        for ddl in ddls {
            results.push(self.test_index(sql, ddl, backend).await);
        }
        results.sort_by(|a, b| {
            a.is_error()
                .cmp(&b.is_error())
                .then_with(|| b.improvement_pct.total_cmp(&a.improvement_pct))
        });
        results
    }

    /// Probes `ddl` through hypopg on `conn`, reporting an unloaded
    /// extension as the result's error
    pub async fn probe(&self, sql: &str, ddl: &str, conn: &dyn Connection) -> HypoIndexResult {
        let available = match detect(conn).await {
            Ok(status) => status.require(),
            Err(e) => Err(e),
        };
        if let Err(e) = available {
            tracing::warn!(error = %e, "hypopg unavailable");
            return HypoIndexResult::failed(ddl, &e);
        }
        self.test_index(sql, ddl, &HypoPg::new(conn)).await
    }

    /// `would_be_used` and at least the configured improvement, with no error
    pub fn is_worthwhile(&self, result: &HypoIndexResult) -> bool {
        result.would_be_used
            && result.improvement_pct >= self.config.min_improvement_pct
            && result.error.is_none()
    }

    async fn run(
        &self,
        sql: &str,
        ddl: &str,
        backend: &dyn HypoIndexBackend,
    ) -> Result<HypoIndexResult> {
        check_index_ddl(ddl)?;

        let before = parse_explain_value(&backend.explain(sql).await?)?;
        let cost_before = before.total_cost();

        let handle = backend.create_hypothetical_index(ddl).await?;
        let after = backend.explain(sql).await;
        if let Err(e) = backend.drop_hypothetical_index(&handle).await {
            tracing::warn!(error = %e, oid = handle.oid, "failed to drop hypothetical index");
        }
        let after = parse_explain_value(&after?)?;
        let cost_after = after.total_cost();

        let improvement_pct = if cost_before > 0.0 {
            (cost_before - cost_after) * 100.0 / cost_before
        } else {
            0.0
        };

        Ok(HypoIndexResult {
            index_def: ddl.to_string(),
            would_be_used: uses_index(&after, &handle),
            cost_before,
            cost_after,
            improvement_pct,
            plan_snippet: plan_snippet(&after),
            error: None,
        })
    }
}

fn check_index_ddl(ddl: &str) -> Result<()> {
    let words: Vec<String> = ddl
        .split_whitespace()
        .take(3)
        .map(str::to_uppercase)
        .collect();
    let is_create_index = words.first().is_some_and(|w| w == "CREATE")
        && words.iter().skip(1).any(|w| w == "INDEX");
    if is_create_index {
        Ok(())
    } else {
        Err(ProbeError::Validation(format!(
            "not a CREATE INDEX statement: {}",
            ddl
        )))
    }
}

fn uses_index(plan: &QueryPlan, handle: &HypoIndexHandle) -> bool {
    plan.iter_nodes().any(|node| {
        node.index_name
            .as_deref()
            .is_some_and(|name| handle.is_named_by(name))
    })
}

fn plan_snippet(plan: &QueryPlan) -> String {
    let mut out = String::new();
    write_node(&plan.root, 0, &mut out);
    if out.chars().count() > MAX_SNIPPET_CHARS {
        out = out.chars().take(MAX_SNIPPET_CHARS).collect();
        out.push_str("...");
    }
    out
}

fn write_node(node: &PlanNode, depth: usize, out: &mut String) {
    if depth > 0 {
        out.push('\n');
    }
    let _ = write!(out, "{}{}", "  ".repeat(depth), node.node_type);
    if let Some(index) = &node.index_name {
        let _ = write!(out, " using {}", index);
    }
    if let Some(relation) = &node.relation_name {
        let _ = write!(out, " on {}", relation);
    }
    if let Some(cost) = node.total_cost {
        let _ = write!(out, " (cost={:.2})", cost);
    }
    for child in &node.children {
        write_node(child, depth + 1, out);
    }
}
