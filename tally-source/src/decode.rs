//! Row decoding
//!
//! Maps MySQL column types onto [`Value`]. Temporal types become text in a
//! fixed ISO layout so artifacts are deterministic. DECIMAL, JSON, and SET
//! arrive from the server as text and are kept verbatim.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{Row, TypeInfo, ValueRef};
use tally_core::{PipelineError, Result, Value};

/// Decoding strategy for a database type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Signed,
    Unsigned,
    Float,
    Double,
    Text,
    /// Server-rendered text the driver does not type-check as a string
    Verbatim,
    Bit,
    Binary,
    Date,
    DateTime,
    Timestamp,
    Time,
    Null,
}

/// Classifies a MySQL type name as reported by the driver
pub(crate) fn classify(type_name: &str) -> Option<ColumnKind> {
    let upper = type_name.to_ascii_uppercase();
    let (base, unsigned) = match upper.strip_suffix(" UNSIGNED") {
        Some(base) => (base, true),
        None => (upper.as_str(), false),
    };

    let kind = match base {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "YEAR" => {
            if unsigned {
                ColumnKind::Unsigned
            } else {
                ColumnKind::Signed
            }
        }
        // TINYINT(1) holds any tinyint value, not just 0 and 1
        "BOOLEAN" => ColumnKind::Signed,
        "FLOAT" => ColumnKind::Float,
        "DOUBLE" => ColumnKind::Double,
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" => {
            ColumnKind::Text
        }
        "DECIMAL" | "JSON" | "SET" => ColumnKind::Verbatim,
        "BIT" => ColumnKind::Bit,
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            ColumnKind::Binary
        }
        "DATE" => ColumnKind::Date,
        "DATETIME" => ColumnKind::DateTime,
        "TIMESTAMP" => ColumnKind::Timestamp,
        "TIME" => ColumnKind::Time,
        "NULL" => ColumnKind::Null,
        _ => return None,
    };

    Some(kind)
}

/// Decodes every column of a row in projection order
pub(crate) fn decode_row(row: &MySqlRow, width: usize) -> Result<Vec<Value>> {
    (0..width).map(|idx| decode_value(row, idx)).collect()
}

fn decode_value(row: &MySqlRow, idx: usize) -> Result<Value> {
    let raw = row.try_get_raw(idx).map_err(|e| decode_error(idx, e))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let type_name = raw.type_info().name().to_string();
    let kind = classify(&type_name).ok_or_else(|| {
        PipelineError::query_failed(format!(
            "column {} has unsupported type {}",
            idx, type_name
        ))
    })?;

    let value = match kind {
        ColumnKind::Signed => Value::Integer(get::<i64>(row, idx)?),
        ColumnKind::Unsigned => Value::Unsigned(get::<u64>(row, idx)?),
        ColumnKind::Float => Value::Float(widen_f32(get::<f32>(row, idx)?)),
        ColumnKind::Double => Value::Float(get::<f64>(row, idx)?),
        ColumnKind::Text => Value::Text(get::<String>(row, idx)?),
        ColumnKind::Verbatim => Value::Text(get_unchecked::<String>(row, idx)?),
        ColumnKind::Bit => Value::Unsigned(bits_to_u64(&get_unchecked::<Vec<u8>>(row, idx)?)),
        ColumnKind::Binary => Value::Text(binary_text(get_unchecked::<Vec<u8>>(row, idx)?)),
        ColumnKind::Date => Value::Text(get::<NaiveDate>(row, idx)?.format("%Y-%m-%d").to_string()),
        ColumnKind::DateTime => Value::Text(
            get::<NaiveDateTime>(row, idx)?
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        ),
        ColumnKind::Timestamp => Value::Text(
            get::<DateTime<Utc>>(row, idx)?
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        ),
        ColumnKind::Time => Value::Text(get::<NaiveTime>(row, idx)?.format("%H:%M:%S").to_string()),
        ColumnKind::Null => Value::Null,
    };

    Ok(value)
}

fn get<'r, T>(row: &'r MySqlRow, idx: usize) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    row.try_get::<T, _>(idx).map_err(|e| decode_error(idx, e))
}

/// Decodes without the driver's type compatibility check
fn get_unchecked<'r, T>(row: &'r MySqlRow, idx: usize) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::MySql>,
{
    row.try_get_unchecked::<T, _>(idx)
        .map_err(|e| decode_error(idx, e))
}

/// Widens a FLOAT so it renders as the value MySQL stored, not its binary
/// expansion (0.1, not 0.10000000149011612)
fn widen_f32(value: f32) -> f64 {
    value
        .to_string()
        .parse()
        .unwrap_or_else(|_| f64::from(value))
}

/// BIT(n) arrives big-endian in at most 8 bytes
fn bits_to_u64(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

/// Binary content as text when it is UTF-8, otherwise as 0x-prefixed hex
fn binary_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            let hex: String = e
                .as_bytes()
                .iter()
                .map(|byte| format!("{:02x}", byte))
                .collect();
            format!("0x{}", hex)
        }
    }
}

fn decode_error(idx: usize, e: sqlx::Error) -> PipelineError {
    PipelineError::query_failed(format!("failed to decode column {}: {}", idx, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_integers() {
        assert_eq!(classify("BIGINT"), Some(ColumnKind::Signed));
        assert_eq!(classify("INT UNSIGNED"), Some(ColumnKind::Unsigned));
        assert_eq!(classify("bigint unsigned"), Some(ColumnKind::Unsigned));
        assert_eq!(classify("BOOLEAN"), Some(ColumnKind::Signed));
    }

    #[test]
    fn test_classify_other_types() {
        assert_eq!(classify("VARCHAR"), Some(ColumnKind::Text));
        assert_eq!(classify("DOUBLE"), Some(ColumnKind::Double));
        assert_eq!(classify("DATETIME"), Some(ColumnKind::DateTime));
        assert_eq!(classify("TIMESTAMP"), Some(ColumnKind::Timestamp));
        assert_eq!(classify("GEOMETRY"), None);
    }

    #[test]
    fn test_classify_server_text_and_binary() {
        assert_eq!(classify("DECIMAL"), Some(ColumnKind::Verbatim));
        assert_eq!(classify("JSON"), Some(ColumnKind::Verbatim));
        assert_eq!(classify("SET"), Some(ColumnKind::Verbatim));
        assert_eq!(classify("BIT"), Some(ColumnKind::Bit));
        assert_eq!(classify("VARBINARY"), Some(ColumnKind::Binary));
        assert_eq!(classify("BLOB"), Some(ColumnKind::Binary));
    }

    #[test]
    fn test_float_renders_stored_value() {
        assert_eq!(Value::Float(widen_f32(0.1)).render().as_deref(), Some("0.1"));
        assert_eq!(Value::Float(widen_f32(-2.5)).render().as_deref(), Some("-2.5"));
        assert_eq!(Value::Float(widen_f32(3.0e7)).render().as_deref(), Some("30000000"));
    }

    #[test]
    fn test_bits_are_big_endian() {
        assert_eq!(bits_to_u64(&[]), 0);
        assert_eq!(bits_to_u64(&[0x05]), 5);
        assert_eq!(bits_to_u64(&[0x01, 0x00]), 256);
    }

    #[test]
    fn test_binary_text() {
        assert_eq!(binary_text(b"abc".to_vec()), "abc");
        assert_eq!(binary_text(vec![0xff, 0x00, 0x10]), "0xff0010");
    }
}
