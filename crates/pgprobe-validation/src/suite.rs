//! Runs TLP and NoREC against the same query concurrently

use crate::comparator::{ComparatorConfig, ResultComparator};
use crate::norec::NoRecValidator;
use crate::result::{ValidationIssue, ValidationResult};
use crate::tlp::TlpValidator;
use pgprobe_core::Connection;

/// Results of both validators for one query
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteResult {
    pub tlp: ValidationResult,
    pub norec: ValidationResult,
}

impl SuiteResult {
    /// True only if both validators passed
    pub fn passed(&self) -> bool {
        self.tlp.passed && self.norec.passed
    }

    pub fn results(&self) -> [&ValidationResult; 2] {
        [&self.tlp, &self.norec]
    }

    /// Issues of both validators, TLP first
    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.tlp.issues.iter().chain(&self.norec.issues)
    }
}

/// Both validators sharing one comparator configuration
#[derive(Debug, Clone, Default)]
pub struct ValidationSuite {
    tlp: TlpValidator,
    norec: NoRecValidator,
}

impl ValidationSuite {
    pub fn new(comparator: ComparatorConfig) -> Self {
        Self {
            tlp: TlpValidator::with_comparator(ResultComparator::new(comparator)),
            norec: NoRecValidator::new(),
        }
    }

    /// Runs both validators on the caller's task and waits for both
    pub async fn validate_all(&self, sql: &str, conn: &dyn Connection) -> SuiteResult {
        let (tlp, norec) = futures::join!(
            self.tlp.validate(sql, conn),
            self.norec.validate(sql, conn)
        );
        SuiteResult { tlp, norec }
    }
}

/// Runs TLP and NoREC with default settings
pub async fn validate_all(sql: &str, conn: &dyn Connection) -> SuiteResult {
    ValidationSuite::default().validate_all(sql, conn).await
}
