//! Tests for predicate extraction

use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_simple_predicate() {
    let split = extract_predicate("SELECT * FROM t WHERE x > 10").unwrap().unwrap();
    assert_eq!(split.prefix, "SELECT * FROM t ");
    assert_eq!(split.predicate, "x > 10");
    assert_eq!(split.suffix, "");
}

#[test]
fn test_predicate_stops_at_trailing_clauses() {
    let cases = [
        ("SELECT a FROM t WHERE a = 1 GROUP BY a", "a = 1", "GROUP BY a"),
        ("SELECT a FROM t WHERE a = 1 ORDER BY a DESC", "a = 1", "ORDER BY a DESC"),
        ("SELECT a FROM t WHERE a = 1 LIMIT 5", "a = 1", "LIMIT 5"),
        ("SELECT a FROM t WHERE a = 1 OFFSET 5", "a = 1", "OFFSET 5"),
        ("SELECT a FROM t WHERE a = 1;", "a = 1", ";"),
    ];
    for (sql, predicate, suffix) in cases {
        let split = extract_predicate(sql).unwrap().unwrap();
        assert_eq!(split.predicate, predicate, "{}", sql);
        assert_eq!(split.suffix.trim(), suffix, "{}", sql);
    }
}

#[test]
fn test_keywords_are_case_insensitive_and_multiline() {
    let sql = "select *\nfrom orders\nwhere status = 'F'\n  and total > 5\norder by id";
    let split = extract_predicate(sql).unwrap().unwrap();
    assert_eq!(split.predicate, "status = 'F'\n  and total > 5");
}

#[test]
fn test_no_where_clause() {
    assert_eq!(extract_predicate("SELECT * FROM t ORDER BY 1").unwrap(), None);
}

#[test]
fn test_identifier_containing_where_is_not_a_clause() {
    assert_eq!(
        extract_predicate("SELECT somewhere FROM t").unwrap(),
        None
    );
}

#[test]
fn test_unbalanced_predicates_are_rejected() {
    for sql in [
        "SELECT * FROM t WHERE (a = 1",
        "SELECT * FROM t WHERE a = 1)",
        "SELECT * FROM t WHERE name = 'abc",
        "SELECT * FROM t WHERE LIMIT 5",
    ] {
        let err = extract_predicate(sql).unwrap_err();
        assert_eq!(err.kind(), "PartitionGenerationError", "{}", sql);
    }
}

#[test]
fn test_quoted_parentheses_are_ignored() {
    let split = extract_predicate("SELECT * FROM t WHERE note = ':)' AND n = 'O''Hara'")
        .unwrap()
        .unwrap();
    assert_eq!(split.predicate, "note = ':)' AND n = 'O''Hara'");
}

#[test]
fn test_partition_rewrites() {
    let split = extract_predicate("SELECT * FROM t WHERE x > 10 ORDER BY x")
        .unwrap()
        .unwrap();

    assert_eq!(
        split.partition(Partition::True),
        "SELECT * FROM t WHERE (x > 10) IS TRUE ORDER BY x"
    );
    assert_eq!(
        split.partition(Partition::False),
        "SELECT * FROM t WHERE (x > 10) IS FALSE ORDER BY x"
    );
    assert_eq!(
        split.partition(Partition::Null),
        "SELECT * FROM t WHERE (x > 10) IS NULL ORDER BY x"
    );
}

#[test]
fn test_unoptimized_rewrite() {
    let split = extract_predicate("SELECT * FROM t WHERE x > 10").unwrap().unwrap();
    assert_eq!(
        split.unoptimized(),
        "SELECT * FROM t WHERE (SELECT x > 10) = TRUE"
    );
}
