//! PostgreSQL wire values to `pgprobe_core::Value`

use pgprobe_core::{ProbeError, Result, Value};
use tokio_postgres::Row as PgRow;
use tokio_postgres::types::{FromSql, Type};

type DecodeError = Box<dyn std::error::Error + Sync + Send>;

/// NUMERIC rendered as exact decimal text
#[derive(Debug)]
pub(crate) struct PgNumericString(pub(crate) String);

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

impl PgNumericString {
    /// Decodes the binary NUMERIC layout: ndigits, weight, sign, dscale, then
    /// base-10000 digit groups
    pub(crate) fn parse(raw: &[u8]) -> std::result::Result<String, DecodeError> {
        if raw.len() < 8 {
            return Err("invalid NUMERIC payload: too short".into());
        }

        let ndigits = i16::from_be_bytes([raw[0], raw[1]]).max(0) as usize;
        let weight = i16::from_be_bytes([raw[2], raw[3]]);
        let sign = u16::from_be_bytes([raw[4], raw[5]]);
        let dscale = i16::from_be_bytes([raw[6], raw[7]]).max(0) as usize;

        if raw.len() < 8 + ndigits * 2 {
            return Err("invalid NUMERIC payload: truncated digits".into());
        }
        match sign {
            NUMERIC_NAN => return Ok("NaN".to_string()),
            NUMERIC_PINF => return Ok("Infinity".to_string()),
            NUMERIC_NINF => return Ok("-Infinity".to_string()),
            NUMERIC_POS | NUMERIC_NEG => {}
            other => return Err(format!("unsupported NUMERIC sign {:#06x}", other).into()),
        }

        let mut digits = Vec::with_capacity(ndigits);
        for chunk in raw[8..8 + ndigits * 2].chunks_exact(2) {
            let group = u16::from_be_bytes([chunk[0], chunk[1]]);
            if group > 9999 {
                return Err("invalid NUMERIC payload: group out of range".into());
            }
            digits.push(group);
        }

        let integer_groups = if weight >= 0 { weight as usize + 1 } else { 0 };

        let mut integer_text = String::new();
        for index in 0..integer_groups {
            let group = digits.get(index).copied().unwrap_or(0);
            if integer_text.is_empty() {
                if group != 0 {
                    integer_text.push_str(&group.to_string());
                }
            } else {
                integer_text.push_str(&format!("{group:04}"));
            }
        }
        if integer_text.is_empty() {
            integer_text.push('0');
        }

        let mut fraction_text = String::new();
        if dscale > 0 {
            // Groups between the decimal point and the first stored fractional group
            let leading_zero_groups = if weight < -1 {
                (-(weight as i32) - 1) as usize
            } else {
                0
            };
            fraction_text.push_str(&"0000".repeat(leading_zero_groups));
            for group in digits.iter().skip(integer_groups.min(digits.len())) {
                fraction_text.push_str(&format!("{group:04}"));
            }
            if fraction_text.len() < dscale {
                fraction_text.push_str(&"0".repeat(dscale - fraction_text.len()));
            } else {
                fraction_text.truncate(dscale);
            }
        }

        let is_zero = integer_text == "0" && fraction_text.chars().all(|c| c == '0');

        let mut output = String::new();
        if sign == NUMERIC_NEG && !is_zero {
            output.push('-');
        }
        output.push_str(&integer_text);
        if !fraction_text.is_empty() {
            output.push('.');
            output.push_str(&fraction_text);
        }
        Ok(output)
    }
}

impl<'a> FromSql<'a> for PgNumericString {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, DecodeError> {
        Ok(Self(Self::parse(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Any type without a dedicated mapping (enums, domains, extension types)
#[derive(Debug)]
pub(crate) struct PgRawValue(pub(crate) Vec<u8>);

impl PgRawValue {
    /// Text-like payloads become strings, everything else stays binary
    pub(crate) fn into_value(self) -> Value {
        match String::from_utf8(self.0) {
            Ok(text) => Value::String(text),
            Err(e) => Value::Bytes(e.into_bytes()),
        }
    }
}

impl<'a> FromSql<'a> for PgRawValue {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, DecodeError> {
        Ok(Self(raw.to_vec()))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Result<Option<T>> {
    row.try_get::<_, Option<T>>(idx).map_err(|e| {
        let column = row.columns().get(idx).map(|c| c.name()).unwrap_or("?");
        ProbeError::QueryExecution(format!("Failed to decode column {}: {}", column, e))
    })
}

fn array<'a, T: FromSql<'a>>(
    row: &'a PgRow,
    idx: usize,
    convert: impl Fn(T) -> Value,
) -> Result<Option<Value>> {
    Ok(get::<Vec<T>>(row, idx)?.map(|items| Value::Array(items.into_iter().map(convert).collect())))
}

/// Converts column `idx` of `row` by its PostgreSQL type name
pub(crate) fn postgres_to_value(row: &PgRow, idx: usize) -> Result<Value> {
    let type_name = row
        .columns()
        .get(idx)
        .map(|c| c.type_().name())
        .ok_or_else(|| ProbeError::QueryExecution(format!("Column index {} out of range", idx)))?;

    let value = match type_name {
        "bool" => get::<bool>(row, idx)?.map(Value::Bool),
        "char" => get::<i8>(row, idx)?.map(|c| Value::String(char::from(c as u8).to_string())),
        "int2" => get::<i16>(row, idx)?.map(Value::Int16),
        "int4" => get::<i32>(row, idx)?.map(Value::Int32),
        "int8" => get::<i64>(row, idx)?.map(Value::Int64),
        "oid" => get::<u32>(row, idx)?.map(|oid| Value::Int64(i64::from(oid))),
        "float4" => get::<f32>(row, idx)?.map(Value::Float32),
        "float8" => get::<f64>(row, idx)?.map(Value::Float64),
        "numeric" => get::<PgNumericString>(row, idx)?.map(|n| Value::Decimal(n.0)),
        "text" | "varchar" | "bpchar" | "name" | "unknown" => {
            get::<String>(row, idx)?.map(Value::String)
        }
        "bytea" => get::<Vec<u8>>(row, idx)?.map(Value::Bytes),
        "uuid" => get::<uuid::Uuid>(row, idx)?.map(Value::Uuid),
        "json" | "jsonb" => get::<serde_json::Value>(row, idx)?.map(Value::Json),
        "date" => get::<chrono::NaiveDate>(row, idx)?.map(Value::Date),
        "time" => get::<chrono::NaiveTime>(row, idx)?.map(Value::Time),
        "timestamp" => get::<chrono::NaiveDateTime>(row, idx)?.map(Value::DateTime),
        "timestamptz" => {
            get::<chrono::DateTime<chrono::Utc>>(row, idx)?.map(Value::DateTimeUtc)
        }
        // Array types are the element type name with a leading underscore
        "_text" | "_varchar" | "_bpchar" | "_name" => array(row, idx, Value::String)?,
        "_bool" => array(row, idx, Value::Bool)?,
        "_int2" => array(row, idx, Value::Int16)?,
        "_int4" => array(row, idx, Value::Int32)?,
        "_int8" => array(row, idx, Value::Int64)?,
        "_float8" => array(row, idx, Value::Float64)?,
        "_numeric" => array(row, idx, |n: PgNumericString| Value::Decimal(n.0))?,
        _ => get::<PgRawValue>(row, idx)?.map(PgRawValue::into_value),
    };

    Ok(value.unwrap_or(Value::Null))
}
