//! Tests for the NoREC validator

use super::*;
use crate::mock::{MockConnection, int_rows};
use pretty_assertions::assert_eq;
use serde_json::json;

const SQL: &str = "SELECT * FROM t WHERE x > 10";
const UNOPTIMIZED: &str = "SELECT * FROM t WHERE (SELECT x > 10) = TRUE";

#[tokio::test]
async fn test_equal_counts_pass() {
    let conn = MockConnection::new()
        .on(UNOPTIMIZED, int_rows(500))
        .on(SQL, int_rows(500));

    let result = NoRecValidator::new().validate(SQL, &conn).await;

    assert!(result.passed);
    assert_eq!(result.confidence, 0.9);
    assert_eq!(result.method, ValidationMethod::NoRec);
    assert!(result.issues.is_empty());
    assert_eq!(result.queries_executed, 2);
    assert_eq!(conn.queries(), vec![SQL, UNOPTIMIZED]);
}

#[tokio::test]
async fn test_count_mismatch_is_an_optimization_bug() {
    let conn = MockConnection::new()
        .on(UNOPTIMIZED, int_rows(500))
        .on(SQL, int_rows(480));

    let result = NoRecValidator::new().validate(SQL, &conn).await;

    assert!(!result.passed);
    assert_eq!(result.confidence, 0.9);
    assert_eq!(result.issues.len(), 1);

    let issue = &result.issues[0];
    assert_eq!(issue.issue_type, IssueType::OptimizationBug);
    assert_eq!(issue.evidence["optimized_count"], json!(480));
    assert_eq!(issue.evidence["unoptimized_count"], json!(500));
    assert_eq!(issue.evidence["optimized_query"], json!(SQL));
    assert_eq!(issue.evidence["unoptimized_query"], json!(UNOPTIMIZED));
}

#[tokio::test]
async fn test_only_counts_are_compared() {
    let conn = MockConnection::new()
        .on(
            UNOPTIMIZED,
            vec![vec![pgprobe_core::Value::Int32(7)]],
        )
        .on(SQL, vec![vec![pgprobe_core::Value::Int32(8)]]);

    assert!(NoRecValidator::new().validate(SQL, &conn).await.passed);
}

#[tokio::test]
async fn test_query_without_predicate_is_not_applicable() {
    let conn = MockConnection::new();
    let result = NoRecValidator::new()
        .validate("SELECT * FROM t LIMIT 10", &conn)
        .await;

    assert!(result.passed);
    assert_eq!(result.confidence, 0.3);
    assert!(result.is_skipped());
    assert!(conn.queries().is_empty());
}

#[tokio::test]
async fn test_execution_error_is_captured() {
    let conn = MockConnection::new().fail_on(UNOPTIMIZED, "canceling statement due to statement timeout");

    let result = NoRecValidator::new().validate(SQL, &conn).await;

    assert!(!result.passed);
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.queries_executed, 2);
    assert_eq!(result.issues[0].issue_type, IssueType::ExecutionError);
    assert!(result.issues[0].description.contains("statement timeout"));
}

#[test]
fn test_result_serializes_method_and_issue_names() {
    let result = ValidationResult::fail(
        ValidationMethod::NoRec,
        0.9,
        ValidationIssue::new(IssueType::OptimizationBug, IssueSeverity::Error, "x"),
    );
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["method"], json!("NoREC"));
    assert_eq!(value["issues"][0]["issue_type"], json!("OPTIMIZATION_BUG"));
    assert_eq!(value["issues"][0]["severity"], json!("ERROR"));
    assert!(value["issues"][0].get("suggested_fix").is_none());
}
