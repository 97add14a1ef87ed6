//! Non-optimizing Reference Engine Construction
//!
//! Runs the query as written and again with its predicate hidden in a scalar
//! subquery the planner cannot push down. An optimizer must not change which
//! rows satisfy a predicate, so both forms must return the same number of
//! rows. Only counts are compared.

use crate::predicate::extract_predicate;
use crate::result::{
    IssueSeverity, IssueType, ValidationIssue, ValidationMethod, ValidationResult,
};
use pgprobe_core::{Connection, Result, sql_preview};
use std::time::Instant;

const CONFIDENCE: f64 = 0.9;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecValidator;

impl NoRecValidator {
    pub fn new() -> Self {
        Self
    }

    /// Compares the row counts of the optimized and unoptimized forms of `sql`
    #[tracing::instrument(skip(self, sql, conn), fields(sql_preview = %sql_preview(sql)))]
    pub async fn validate(&self, sql: &str, conn: &dyn Connection) -> ValidationResult {
        let started = Instant::now();
        let mut executed = 0;

        let result = match self.run(sql, conn, &mut executed).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "NoREC validation could not complete");
                ValidationResult::from_error(ValidationMethod::NoRec, &e)
            }
        };

        let result = result
            .with_queries_executed(executed)
            .with_execution_time(started.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            passed = result.passed,
            confidence = result.confidence,
            queries = executed,
            "NoREC validation finished"
        );
        result
    }

    async fn run(
        &self,
        sql: &str,
        conn: &dyn Connection,
        executed: &mut usize,
    ) -> Result<ValidationResult> {
        let Some(split) = extract_predicate(sql)? else {
            tracing::debug!("no WHERE clause, nothing to rewrite");
            return Ok(ValidationResult::not_applicable(
                ValidationMethod::NoRec,
                "query has no WHERE clause",
            ));
        };
        let unoptimized = split.unoptimized();

        *executed += 1;
        let optimized_count = conn.query(sql).await?.row_count();
        *executed += 1;
        let unoptimized_count = conn.query(&unoptimized).await?.row_count();

        tracing::debug!(optimized_count, unoptimized_count, "row counts");

        if optimized_count == unoptimized_count {
            return Ok(ValidationResult::pass(ValidationMethod::NoRec, CONFIDENCE)
                .with_metadata("predicate", split.predicate.as_str())
                .with_metadata("row_count", optimized_count));
        }

        let issue = ValidationIssue::new(
            IssueType::OptimizationBug,
            IssueSeverity::Error,
            format!(
                "Optimized query returned {} rows, unoptimized form returned {}",
                optimized_count, unoptimized_count
            ),
        )
        .with_evidence("optimized_count", optimized_count)
        .with_evidence("unoptimized_count", unoptimized_count)
        .with_evidence("optimized_query", sql)
        .with_evidence("unoptimized_query", unoptimized.as_str())
        .with_suggested_fix(
            "The planner changes the predicate's result; compare the EXPLAIN output of both forms",
        );

        Ok(ValidationResult::fail(ValidationMethod::NoRec, CONFIDENCE, issue)
            .with_metadata("predicate", split.predicate.as_str()))
    }
}

#[cfg(test)]
mod tests;
