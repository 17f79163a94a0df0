//! SQL value types for dynamically shaped change rows.
//!
//! Change rows carry whatever columns the replicated table declares, so values
//! are decoded positionally into this owned enum and bound back as parameters
//! when the DML is replayed on a destination.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tiberius::{ColumnData, Row, ToSql};
use uuid::Uuid;

/// Type hint for NULL values so parameter binding emits the right wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CtNullType {
    Bool,
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    Decimal,
    DateTime,
    DateTimeOffset,
    Date,
    Time,
}

/// A single column value read from a change row.
#[derive(Debug, Clone, PartialEq)]
pub enum CtValue {
    /// NULL with a type hint for correct parameter encoding.
    Null(CtNullType),

    /// Boolean (bit).
    Bool(bool),

    /// 8-bit unsigned integer (tinyint).
    U8(u8),

    /// 16-bit signed integer (smallint).
    I16(i16),

    /// 32-bit signed integer (int).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// 32-bit floating point (real).
    F32(f32),

    /// 64-bit floating point (float).
    F64(f64),

    /// Text data (char/varchar/nchar/nvarchar/text/ntext).
    Text(String),

    /// Binary data (binary/varbinary/image).
    Bytes(Vec<u8>),

    /// UUID (uniqueidentifier).
    Uuid(Uuid),

    /// Decimal (decimal/numeric/money/smallmoney).
    Decimal(Decimal),

    /// Timestamp without timezone (datetime/datetime2/smalldatetime).
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset (datetimeoffset).
    DateTimeOffset(DateTime<FixedOffset>),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),
}

impl ToSql for CtValue {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            CtValue::Null(t) => t.null_data(),
            CtValue::Bool(v) => ColumnData::Bit(Some(*v)),
            CtValue::U8(v) => ColumnData::U8(Some(*v)),
            CtValue::I16(v) => ColumnData::I16(Some(*v)),
            CtValue::I32(v) => ColumnData::I32(Some(*v)),
            CtValue::I64(v) => ColumnData::I64(Some(*v)),
            CtValue::F32(v) => ColumnData::F32(Some(*v)),
            CtValue::F64(v) => ColumnData::F64(Some(*v)),
            CtValue::Text(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
            CtValue::Bytes(b) => ColumnData::Binary(Some(Cow::Borrowed(b.as_slice()))),
            CtValue::Uuid(v) => ColumnData::Guid(Some(*v)),
            CtValue::Decimal(v) => v.to_sql(),
            CtValue::DateTime(v) => v.to_sql(),
            CtValue::DateTimeOffset(v) => v.to_sql(),
            CtValue::Date(v) => v.to_sql(),
            CtValue::Time(v) => v.to_sql(),
        }
    }
}

impl CtNullType {
    fn null_data(self) -> ColumnData<'static> {
        match self {
            CtNullType::Bool => Option::<bool>::None.to_sql(),
            CtNullType::U8 => Option::<u8>::None.to_sql(),
            CtNullType::I16 => Option::<i16>::None.to_sql(),
            CtNullType::I32 => Option::<i32>::None.to_sql(),
            CtNullType::I64 => Option::<i64>::None.to_sql(),
            CtNullType::F32 => Option::<f32>::None.to_sql(),
            CtNullType::F64 => Option::<f64>::None.to_sql(),
            CtNullType::String => ColumnData::String(None),
            CtNullType::Bytes => ColumnData::Binary(None),
            CtNullType::Uuid => Option::<Uuid>::None.to_sql(),
            CtNullType::Decimal => Option::<Decimal>::None.to_sql(),
            CtNullType::DateTime => Option::<NaiveDateTime>::None.to_sql(),
            CtNullType::DateTimeOffset => Option::<DateTime<FixedOffset>>::None.to_sql(),
            CtNullType::Date => Option::<NaiveDate>::None.to_sql(),
            CtNullType::Time => Option::<NaiveTime>::None.to_sql(),
        }
    }
}

impl fmt::Display for CtValue {
    /// SQL-literal-ish rendering, used by the dry-run plan output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtValue::Null(_) => write!(f, "NULL"),
            CtValue::Bool(v) => write!(f, "{}", if *v { 1 } else { 0 }),
            CtValue::U8(v) => write!(f, "{}", v),
            CtValue::I16(v) => write!(f, "{}", v),
            CtValue::I32(v) => write!(f, "{}", v),
            CtValue::I64(v) => write!(f, "{}", v),
            CtValue::F32(v) => write!(f, "{}", v),
            CtValue::F64(v) => write!(f, "{}", v),
            CtValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            CtValue::Bytes(b) => {
                write!(f, "0x")?;
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
            CtValue::Uuid(v) => write!(f, "'{}'", v),
            CtValue::Decimal(v) => write!(f, "{}", v),
            CtValue::DateTime(v) => write!(f, "'{}'", v),
            CtValue::DateTimeOffset(v) => write!(f, "'{}'", v),
            CtValue::Date(v) => write!(f, "'{}'", v),
            CtValue::Time(v) => write!(f, "'{}'", v),
        }
    }
}

/// Decode one column of a result row into a [`CtValue`] keyed on the declared
/// SQL type name from the catalog.
pub fn decode_column(row: &Row, idx: usize, data_type: &str) -> CtValue {
    let dt = data_type.to_lowercase();

    match dt.as_str() {
        "bit" => row
            .get::<bool, _>(idx)
            .map(CtValue::Bool)
            .unwrap_or(CtValue::Null(CtNullType::Bool)),
        "tinyint" => row
            .get::<u8, _>(idx)
            .map(CtValue::U8)
            .unwrap_or(CtValue::Null(CtNullType::U8)),
        "smallint" => row
            .get::<i16, _>(idx)
            .map(CtValue::I16)
            .unwrap_or(CtValue::Null(CtNullType::I16)),
        "int" => row
            .get::<i32, _>(idx)
            .map(CtValue::I32)
            .unwrap_or(CtValue::Null(CtNullType::I32)),
        "bigint" => row
            .get::<i64, _>(idx)
            .map(CtValue::I64)
            .unwrap_or(CtValue::Null(CtNullType::I64)),
        "real" => row
            .get::<f32, _>(idx)
            .map(CtValue::F32)
            .unwrap_or(CtValue::Null(CtNullType::F32)),
        "float" => row
            .get::<f64, _>(idx)
            .map(CtValue::F64)
            .unwrap_or(CtValue::Null(CtNullType::F64)),
        "uniqueidentifier" => row
            .get::<Uuid, _>(idx)
            .map(CtValue::Uuid)
            .unwrap_or(CtValue::Null(CtNullType::Uuid)),
        "decimal" | "numeric" | "money" | "smallmoney" => row
            .get::<Decimal, _>(idx)
            .map(CtValue::Decimal)
            .unwrap_or(CtValue::Null(CtNullType::Decimal)),
        "datetime" | "datetime2" | "smalldatetime" => row
            .get::<NaiveDateTime, _>(idx)
            .map(CtValue::DateTime)
            .unwrap_or(CtValue::Null(CtNullType::DateTime)),
        "datetimeoffset" => row
            .get::<DateTime<FixedOffset>, _>(idx)
            .map(CtValue::DateTimeOffset)
            .unwrap_or(CtValue::Null(CtNullType::DateTimeOffset)),
        "date" => row
            .get::<NaiveDate, _>(idx)
            .map(CtValue::Date)
            .unwrap_or(CtValue::Null(CtNullType::Date)),
        "time" => row
            .get::<NaiveTime, _>(idx)
            .map(CtValue::Time)
            .unwrap_or(CtValue::Null(CtNullType::Time)),
        "binary" | "varbinary" | "image" => row
            .get::<&[u8], _>(idx)
            .map(|v| CtValue::Bytes(v.to_vec()))
            .unwrap_or(CtValue::Null(CtNullType::Bytes)),
        _ => row
            .get::<&str, _>(idx)
            .map(|s| CtValue::Text(s.to_string()))
            .unwrap_or(CtValue::Null(CtNullType::String)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_sql_literals() {
        assert_eq!(CtValue::I32(42).to_string(), "42");
        assert_eq!(CtValue::Text("x".into()).to_string(), "'x'");
        assert_eq!(CtValue::Text("o'brien".into()).to_string(), "'o''brien'");
        assert_eq!(CtValue::Null(CtNullType::String).to_string(), "NULL");
        assert_eq!(CtValue::Bool(true).to_string(), "1");
        assert_eq!(CtValue::Bytes(vec![0xde, 0xad]).to_string(), "0xDEAD");
    }

    #[test]
    fn test_null_binds_with_type_hint() {
        match CtValue::Null(CtNullType::I64).to_sql() {
            ColumnData::I64(None) => {}
            other => panic!("expected typed null, got {:?}", other),
        }
    }

    #[test]
    fn test_text_binds_borrowed() {
        let v = CtValue::Text("hello".into());
        match v.to_sql() {
            ColumnData::String(Some(s)) => assert_eq!(s, "hello"),
            other => panic!("unexpected column data {:?}", other),
        }
    }
}
