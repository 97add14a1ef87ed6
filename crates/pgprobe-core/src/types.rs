//! Core value and result-set types

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One cell of a result set.
///
/// Validators only need equality and numeric/text views of a cell, so the
/// variants mirror the PostgreSQL types a driver can decode without loss.
/// NUMERIC stays textual in `Decimal` to keep its exact digits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Decimal(String),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    Json(serde_json::Value),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text of a `String` cell; other variants are not coerced
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view; integral text such as a `bigint` cast to text also parses
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::Decimal(s) | Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Decimal(v) | Value::String(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{v}"),
            Value::DateTime(v) => write!(f, "{v}"),
            Value::DateTimeUtc(v) => write!(f, "{v}"),
            Value::Json(v) => write!(f, "{v}"),
            // PostgreSQL array literal layout
            Value::Array(items) => {
                f.write_str("{")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

macro_rules! value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(v: $source) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f64 => Float64,
    bool => Bool,
    String => String,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A plain row of values, with no column metadata attached
pub type ValueRow = Vec<Value>;

/// A result row: values paired with the column names they came from
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
    columns: Vec<String>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// First column called `name`; duplicate names shadow later ones
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ColumnMeta {
    pub name: String,
    /// Driver type name, e.g. `int8` or `numeric`; empty when unknown
    pub data_type: String,
    /// 0-based position in the select list
    pub ordinal: usize,
}

/// Everything one statement returned
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub id: Uuid,
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
    /// Wall-clock time measured by the driver
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            columns: Vec::new(),
            rows: Vec::new(),
            execution_time_ms: 0,
        }
    }

    /// Builds a result with untyped columns, as mock connections return
    pub fn from_values(column_names: &[&str], rows: Vec<ValueRow>) -> Self {
        let names: Vec<String> = column_names.iter().map(|c| c.to_string()).collect();
        let columns = names
            .iter()
            .enumerate()
            .map(|(ordinal, name)| ColumnMeta {
                name: name.clone(),
                data_type: String::new(),
                ordinal,
            })
            .collect();
        let rows = rows
            .into_iter()
            .map(|values| Row::new(names.clone(), values))
            .collect();

        Self {
            id: Uuid::new_v4(),
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the first value of the first row, if any
    pub fn first_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.get(0))
    }

    /// Projects the rows to plain value tuples, dropping column metadata
    pub fn value_rows(&self) -> Vec<ValueRow> {
        self.rows.iter().map(|row| row.values.clone()).collect()
    }

    /// Consumes the result and returns the rows as plain value tuples
    pub fn into_value_rows(self) -> Vec<ValueRow> {
        self.rows.into_iter().map(|row| row.values).collect()
    }
}
