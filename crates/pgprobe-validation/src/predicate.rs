//! WHERE-clause extraction and rewriting
//!
//! Only the first WHERE clause of a statement is considered. It ends at the
//! first GROUP BY, ORDER BY, LIMIT, OFFSET, semicolon or the end of the text.

use pgprobe_core::{ProbeError, Result};
use regex::Regex;
use std::sync::LazyLock;

static WHERE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\bWHERE\b(.*?)(?:\bGROUP\s+BY\b|\bORDER\s+BY\b|\bLIMIT\b|\bOFFSET\b|;|$)")
        .expect("valid regex")
});

/// A statement split around its WHERE predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitQuery {
    /// Everything before the `WHERE` keyword
    pub prefix: String,
    /// The predicate text, trimmed
    pub predicate: String,
    /// Everything after the predicate (GROUP BY, ORDER BY, ...)
    pub suffix: String,
}

impl SplitQuery {
    /// Rebuilds the statement with `condition` as its WHERE clause
    pub fn with_condition(&self, condition: &str) -> String {
        let suffix = self.suffix.trim();
        if suffix.is_empty() {
            format!("{} WHERE {}", self.prefix.trim_end(), condition)
        } else {
            format!("{} WHERE {} {}", self.prefix.trim_end(), condition, suffix)
        }
    }

    /// `WHERE (<predicate>) IS TRUE`, `IS FALSE` or `IS NULL`
    pub fn partition(&self, partition: Partition) -> String {
        self.with_condition(&format!("({}) {}", self.predicate, partition.test()))
    }

    /// `WHERE (SELECT <predicate>) = TRUE`, which keeps the planner from
    /// using the predicate for index or partition pruning
    pub fn unoptimized(&self) -> String {
        self.with_condition(&format!("(SELECT {}) = TRUE", self.predicate))
    }
}

/// One of the three truth values a predicate can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    True,
    False,
    Null,
}

impl Partition {
    fn test(&self) -> &'static str {
        match self {
            Self::True => "IS TRUE",
            Self::False => "IS FALSE",
            Self::Null => "IS NULL",
        }
    }
}

/// Splits `sql` around its first WHERE predicate.
///
/// Returns `Ok(None)` when there is no WHERE clause, and
/// `PartitionGeneration` when the predicate is empty or has unbalanced
/// parentheses or quotes, since rewriting it would produce a different query.
pub fn extract_predicate(sql: &str) -> Result<Option<SplitQuery>> {
    let Some(captures) = WHERE_CLAUSE.captures(sql) else {
        return Ok(None);
    };
    let (Some(whole), Some(body)) = (captures.get(0), captures.get(1)) else {
        return Ok(None);
    };

    let predicate = body.as_str().trim();
    if predicate.is_empty() {
        return Err(ProbeError::PartitionGeneration(
            "WHERE clause has an empty predicate".into(),
        ));
    }
    check_balanced(predicate)?;

    Ok(Some(SplitQuery {
        prefix: sql[..whole.start()].to_string(),
        predicate: predicate.to_string(),
        suffix: sql[body.end()..].to_string(),
    }))
}

/// Rejects predicates whose parentheses or quotes do not pair up
fn check_balanced(predicate: &str) -> Result<()> {
    let mut depth: i64 = 0;
    let mut quote: Option<char> = None;

    for c in predicate.chars() {
        match quote {
            // A doubled quote closes and reopens, which nets out
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(ProbeError::PartitionGeneration(format!(
                            "unbalanced ')' in predicate: {}",
                            predicate
                        )));
                    }
                }
                _ => {}
            },
        }
    }

    if quote.is_some() {
        return Err(ProbeError::PartitionGeneration(format!(
            "unterminated quote in predicate: {}",
            predicate
        )));
    }
    if depth != 0 {
        return Err(ProbeError::PartitionGeneration(format!(
            "unbalanced '(' in predicate: {}",
            predicate
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
