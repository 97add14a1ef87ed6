//! Result-set comparison
//!
//! Result sets are compared as multisets: row order is ignored (unless asked
//! otherwise) but duplicate counts matter, i.e. `UNION ALL` semantics.
//! Before comparison every value is normalized:
//!
//! - NULL equals NULL
//! - integers, floats and numerics compare numerically, within `tolerance`
//! - strings are compared with surrounding whitespace trimmed
//! - everything else compares by its text rendering

use pgprobe_core::{Value, ValueRow};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComparatorConfig {
    /// Absolute tolerance for numeric values
    pub tolerance: f64,
    /// Compare rows positionally instead of as multisets
    pub order_sensitive: bool,
    /// Maximum example rows reported per side on a mismatch
    pub max_examples: usize,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.0,
            order_sensitive: false,
            max_examples: 3,
        }
    }
}

impl ComparatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the numeric tolerance; negative values are treated as zero
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.max(0.0);
        self
    }

    pub fn with_order_sensitive(mut self, order_sensitive: bool) -> Self {
        self.order_sensitive = order_sensitive;
        self
    }

    pub fn with_max_examples(mut self, max_examples: usize) -> Self {
        self.max_examples = max_examples;
        self
    }

    /// Checks that the settings are usable
    pub fn validate(&self) -> Result<(), String> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(format!(
                "tolerance must be a non-negative finite number, got {}",
                self.tolerance
            ));
        }
        Ok(())
    }
}

/// Rows found on only one side of a comparison
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MismatchedRows {
    pub only_in_first: Vec<ValueRow>,
    pub only_in_second: Vec<ValueRow>,
}

impl MismatchedRows {
    pub fn is_empty(&self) -> bool {
        self.only_in_first.is_empty() && self.only_in_second.is_empty()
    }
}

/// Compares result sets with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct ResultComparator {
    config: ComparatorConfig,
}

impl ResultComparator {
    pub fn new(config: ComparatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Returns true if both result sets hold the same rows
    pub fn equals(&self, first: &[ValueRow], second: &[ValueRow]) -> bool {
        compare_result_sets(
            first,
            second,
            self.config.order_sensitive,
            self.config.tolerance,
        )
    }

    /// Up to `max_examples` rows unique to each side
    pub fn mismatches(&self, first: &[ValueRow], second: &[ValueRow]) -> MismatchedRows {
        mismatched_rows(first, second, self.config.max_examples, self.config.tolerance)
    }
}

/// Returns true if `first` and `second` contain the same rows.
///
/// Row sets of different length are never equal. Unless `order_sensitive`,
/// rows are compared as multisets.
pub fn compare_result_sets(
    first: &[ValueRow],
    second: &[ValueRow],
    order_sensitive: bool,
    tolerance: f64,
) -> bool {
    if first.len() != second.len() {
        return false;
    }

    let mut left = normalize_rows(first);
    let mut right = normalize_rows(second);
    if order_sensitive {
        return left
            .iter()
            .zip(&right)
            .all(|(a, b)| rows_match(&a.1, &b.1, tolerance));
    }

    sort_for_pairing(&mut left);
    sort_for_pairing(&mut right);
    if left
        .iter()
        .zip(&right)
        .all(|(a, b)| rows_match(&a.1, &b.1, tolerance))
    {
        return true;
    }
    if tolerance == 0.0 {
        return false;
    }

    // Floats within the tolerance may sort in a different order on each side
    let (paired_left, _) = pair_rows(&left, &right, tolerance);
    paired_left.iter().all(|paired| *paired)
}

/// Concatenates result sets, keeping duplicates
pub fn multiset_union(sets: &[Vec<ValueRow>]) -> Vec<ValueRow> {
    sets.iter().flatten().cloned().collect()
}

/// Returns up to `max_examples` rows per side that have no exact counterpart
/// on the other side, counting duplicates
pub fn find_mismatched_rows(
    first: &[ValueRow],
    second: &[ValueRow],
    max_examples: usize,
) -> MismatchedRows {
    mismatched_rows(first, second, max_examples, 0.0)
}

fn mismatched_rows(
    first: &[ValueRow],
    second: &[ValueRow],
    max_examples: usize,
    tolerance: f64,
) -> MismatchedRows {
    let mut left = normalize_rows(first);
    let mut right = normalize_rows(second);
    sort_for_pairing(&mut left);
    sort_for_pairing(&mut right);

    let (paired_left, paired_right) = if tolerance == 0.0 {
        merge_exact(&left, &right)
    } else {
        pair_rows(&left, &right, tolerance)
    };
    let unpaired = |rows: &[(usize, Vec<Normalized>)], paired: &[bool], source: &[ValueRow]| {
        rows.iter()
            .zip(paired)
            .filter(|(_, paired)| !**paired)
            .take(max_examples)
            .map(|((idx, _), _)| source[*idx].clone())
            .collect()
    };

    MismatchedRows {
        only_in_first: unpaired(&left, &paired_left, first),
        only_in_second: unpaired(&right, &paired_right, second),
    }
}

/// Single merge pass over two sorted sides, pairing exactly equal rows
fn merge_exact(
    left: &[(usize, Vec<Normalized>)],
    right: &[(usize, Vec<Normalized>)],
) -> (Vec<bool>, Vec<bool>) {
    let mut paired_left = vec![false; left.len()];
    let mut paired_right = vec![false; right.len()];
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if rows_match(&left[i].1, &right[j].1, 0.0) {
            paired_left[i] = true;
            paired_right[j] = true;
            i += 1;
            j += 1;
        } else if cmp_for_pairing(&left[i].1, &right[j].1) == Ordering::Less {
            i += 1;
        } else {
            j += 1;
        }
    }
    (paired_left, paired_right)
}

/// A value reduced to what matters for equality
#[derive(Debug, Clone, PartialEq)]
enum Normalized {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Normalized {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(v) => Self::Bool(*v),
            Value::Int16(v) => Self::Int(i64::from(*v)),
            Value::Int32(v) => Self::Int(i64::from(*v)),
            Value::Int64(v) => Self::Int(*v),
            Value::Float32(v) => Self::Float(f64::from(*v)),
            Value::Float64(v) => Self::Float(*v),
            Value::Decimal(s) => match s.trim().parse::<f64>() {
                Ok(v) => Self::Float(v),
                Err(_) => Self::Text(s.trim().to_string()),
            },
            Value::String(s) => Self::Text(s.trim().to_string()),
            Value::Bytes(b) => Self::Bytes(b.clone()),
            other => Self::Text(other.to_string().trim().to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::Text(_) => 3,
            Self::Bytes(_) => 4,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Strict total order, used for sorting
    fn total_order(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Bytes(a), Self::Bytes(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }

    fn matches_within(&self, other: &Self, tolerance: f64) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) if x.is_nan() || y.is_nan() => x.is_nan() && y.is_nan(),
                (Some(x), Some(y)) => x == y || (x - y).abs() <= tolerance,
                _ => a == b,
            },
        }
    }
}

fn normalize_rows(rows: &[ValueRow]) -> Vec<(usize, Vec<Normalized>)> {
    rows.iter()
        .enumerate()
        .map(|(idx, row)| (idx, row.iter().map(Normalized::from_value).collect()))
        .collect()
}

fn cmp_rows(a: &[Normalized], b: &[Normalized]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_order(y))
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

fn rows_match(a: &[Normalized], b: &[Normalized], tolerance: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches_within(y, tolerance))
}

/// Orders rows by the columns that must match exactly, numeric columns
/// counting as one class
fn cmp_exact_columns(a: &[Normalized], b: &[Normalized]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x.as_f64(), y.as_f64()) {
            (Some(_), Some(_)) => Ordering::Equal,
            _ => x.total_order(y),
        })
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

fn cmp_for_pairing(a: &[Normalized], b: &[Normalized]) -> Ordering {
    cmp_exact_columns(a, b).then_with(|| cmp_rows(a, b))
}

fn sort_for_pairing(rows: &mut [(usize, Vec<Normalized>)]) {
    rows.sort_by(|a, b| cmp_for_pairing(&a.1, &b.1));
}

/// Pairs rows of two sorted sides that match within `tolerance`.
///
/// Rows only pair inside a bucket sharing their non-numeric columns; each
/// bucket is solved as a maximum bipartite matching. Returns, per side and in
/// sorted order, whether each row found a partner.
fn pair_rows(
    left: &[(usize, Vec<Normalized>)],
    right: &[(usize, Vec<Normalized>)],
    tolerance: f64,
) -> (Vec<bool>, Vec<bool>) {
    let mut paired_left = vec![false; left.len()];
    let mut paired_right = vec![false; right.len()];
    let bucket_end = |rows: &[(usize, Vec<Normalized>)], start: usize| {
        (start + 1..rows.len())
            .find(|&k| cmp_exact_columns(&rows[k].1, &rows[start].1).is_ne())
            .unwrap_or(rows.len())
    };

    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match cmp_exact_columns(&left[i].1, &right[j].1) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                let (i_end, j_end) = (bucket_end(left, i), bucket_end(right, j));
                let owners = match_bucket(&left[i..i_end], &right[j..j_end], tolerance);
                for (r, owner) in owners.into_iter().enumerate() {
                    if let Some(l) = owner {
                        paired_left[i + l] = true;
                        paired_right[j + r] = true;
                    }
                }
                i = i_end;
                j = j_end;
            }
        }
    }

    (paired_left, paired_right)
}

/// Maximum bipartite matching (augmenting paths); returns the left partner of
/// every right row
fn match_bucket(
    left: &[(usize, Vec<Normalized>)],
    right: &[(usize, Vec<Normalized>)],
    tolerance: f64,
) -> Vec<Option<usize>> {
    let edges: Vec<Vec<usize>> = left
        .iter()
        .map(|(_, l)| {
            right
                .iter()
                .enumerate()
                .filter(|(_, (_, r))| rows_match(l, r, tolerance))
                .map(|(k, _)| k)
                .collect()
        })
        .collect();

    let mut owners = vec![None; right.len()];
    for l in 0..left.len() {
        let mut visited = vec![false; right.len()];
        augment(l, &edges, &mut owners, &mut visited);
    }
    owners
}

fn augment(
    l: usize,
    edges: &[Vec<usize>],
    owners: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for &r in &edges[l] {
        if visited[r] {
            continue;
        }
        visited[r] = true;
        let free = match owners[r] {
            None => true,
            Some(other) => augment(other, edges, owners, visited),
        };
        if free {
            owners[r] = Some(l);
            return true;
        }
    }
    false
}
