//! pgprobe Validation - metamorphic correctness checks for SQL queries
//!
//! This crate provides:
//! - A multiset result-set comparator with NULL and float tolerance
//! - WHERE-predicate extraction and partition rewriting
//! - Ternary Logic Partitioning (TLP) and NoREC validators
//! - A runner executing both validators concurrently
//!
//! Validators never return errors: every failure becomes a
//! [`ValidationResult`] with `passed = false`, and queries without a
//! predicate pass with low confidence.

pub mod comparator;
pub mod norec;
pub mod predicate;
pub mod result;
pub mod suite;
pub mod tlp;

#[cfg(test)]
mod mock;

pub use comparator::{
    ComparatorConfig, MismatchedRows, ResultComparator, compare_result_sets, find_mismatched_rows,
    multiset_union,
};
pub use norec::NoRecValidator;
pub use predicate::{Partition, SplitQuery, extract_predicate};
pub use result::{
    IssueSeverity, IssueType, NOT_APPLICABLE_CONFIDENCE, ValidationIssue, ValidationMethod,
    ValidationResult,
};
pub use suite::{SuiteResult, ValidationSuite, validate_all};
pub use tlp::TlpValidator;
