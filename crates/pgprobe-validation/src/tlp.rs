//! Ternary Logic Partitioning
//!
//! For a predicate `p`, the rows of `Q` are the disjoint union of the rows
//! where `p` is TRUE, FALSE and NULL. This validator checks the narrower
//! invariant `RS(Q) == RS(Q WHERE (p) IS TRUE)`; the FALSE and NULL
//! partitions are executed for evidence only.

use crate::comparator::ResultComparator;
use crate::predicate::{Partition, extract_predicate};
use crate::result::{
    IssueSeverity, IssueType, ValidationIssue, ValidationMethod, ValidationResult, rows_evidence,
};
use pgprobe_core::{Connection, Result, ValueRow, sql_preview};
use serde_json::json;
use std::time::Instant;

const CONFIDENCE: f64 = 1.0;

#[derive(Debug, Clone, Default)]
pub struct TlpValidator {
    comparator: ResultComparator,
}

impl TlpValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comparator(comparator: ResultComparator) -> Self {
        Self { comparator }
    }

    /// Validates `sql` against its TRUE partition. Never fails: execution
    /// and rewrite errors are reported in the result.
    #[tracing::instrument(skip(self, sql, conn), fields(sql_preview = %sql_preview(sql)))]
    pub async fn validate(&self, sql: &str, conn: &dyn Connection) -> ValidationResult {
        let started = Instant::now();
        let mut executed = 0;

        let result = match self.run(sql, conn, &mut executed).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "TLP validation could not complete");
                ValidationResult::from_error(ValidationMethod::Tlp, &e)
            }
        };

        let result = result
            .with_queries_executed(executed)
            .with_execution_time(started.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            passed = result.passed,
            confidence = result.confidence,
            queries = executed,
            "TLP validation finished"
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
            tracing::debug!("no WHERE clause, nothing to partition");
            return Ok(ValidationResult::not_applicable(
                ValidationMethod::Tlp,
                "query has no WHERE clause",
            ));
        };

        let original = fetch(conn, sql, executed).await?;
        let true_rows = fetch(conn, &split.partition(Partition::True), executed).await?;
        let false_rows = fetch(conn, &split.partition(Partition::False), executed).await?;
        let null_rows = fetch(conn, &split.partition(Partition::Null), executed).await?;

        let partition_counts = json!({
            "true": true_rows.len(),
            "false": false_rows.len(),
            "null": null_rows.len(),
        });

        if self.comparator.equals(&original, &true_rows) {
            return Ok(ValidationResult::pass(ValidationMethod::Tlp, CONFIDENCE)
                .with_metadata("predicate", split.predicate.as_str())
                .with_metadata("original_rows", original.len())
                .with_metadata("partition_rows", partition_counts));
        }

        let mismatched = self.comparator.mismatches(&original, &true_rows);
        let issue = ValidationIssue::new(
            IssueType::PartitionMismatch,
            IssueSeverity::Error,
            format!(
                "Query returned {} rows but its TRUE partition returned {}",
                original.len(),
                true_rows.len()
            ),
        )
        .with_evidence("predicate", split.predicate.as_str())
        .with_evidence("original_rows", original.len())
        .with_evidence("partition_rows", partition_counts)
        .with_evidence("only_in_original", rows_evidence(&mismatched.only_in_first))
        .with_evidence("only_in_true_partition", rows_evidence(&mismatched.only_in_second))
        .with_suggested_fix(
            "Check the predicate's NULL handling and three-valued logic; the database may evaluate it inconsistently",
        );

        Ok(ValidationResult::fail(ValidationMethod::Tlp, CONFIDENCE, issue)
            .with_metadata("predicate", split.predicate.as_str()))
    }
}

async fn fetch(conn: &dyn Connection, sql: &str, executed: &mut usize) -> Result<Vec<ValueRow>> {
    *executed += 1;
    tracing::debug!(sql_preview = %sql_preview(sql), "executing variant");
    Ok(conn.query(sql).await?.into_value_rows())
}
