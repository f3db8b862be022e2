//! Dynamically typed rows
//!
//! MAC tables are read with `SELECT *`, so their shape is only known at
//! runtime. Each row is decoded column by column from the Postgres type name.

use crate::{StorageError, StorageResult};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::fmt;

/// A single decoded column value
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Real(f32),
    Double(f64),
    Numeric(BigDecimal),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    BoolArray(Vec<bool>),
    IntArray(Vec<i64>),
    RealArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    TextArray(Vec<String>),
    /// Column type without a decoder; holds the Postgres type name
    Unsupported(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view of scalar values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::Real(v) => Some(f64::from(*v)),
            CellValue::Double(v) => Some(*v),
            CellValue::Numeric(v) => v.to_f64(),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(v) => Some(*v),
            CellValue::Numeric(v) => v.to_i64(),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Numeric view of array values
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            CellValue::RealArray(v) => Some(v.iter().map(|x| f64::from(*x)).collect()),
            CellValue::DoubleArray(v) => Some(v.clone()),
            CellValue::IntArray(v) => Some(v.iter().map(|x| *x as f64).collect()),
            _ => None,
        }
    }

    /// Text rendering, `None` for NULL
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::Timestamp(ts) => Some(ts.date()),
            CellValue::TimestampTz(ts) => Some(ts.date_naive()),
            CellValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            CellValue::Time(t) => Some(*t),
            CellValue::Timestamp(ts) => Some(ts.time()),
            CellValue::Text(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f").ok(),
            _ => None,
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "]")
}

fn write_float_list<T: fmt::Debug>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{:?}", item)?;
    }
    write!(f, "]")
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Bool(v) => write!(f, "{}", v),
            CellValue::Int(v) => write!(f, "{}", v),
            // Debug keeps the decimal point on whole numbers
            CellValue::Real(v) => write!(f, "{:?}", v),
            CellValue::Double(v) => write!(f, "{:?}", v),
            CellValue::Numeric(v) => write!(f, "{}", v),
            CellValue::Text(v) => write!(f, "{}", v),
            CellValue::Date(v) => write!(f, "{}", v),
            CellValue::Time(v) => write!(f, "{}", v),
            CellValue::Timestamp(v) => write!(f, "{}", v),
            CellValue::TimestampTz(v) => write!(f, "{}", v),
            CellValue::Uuid(v) => write!(f, "{}", v),
            CellValue::Json(v) => write!(f, "{}", v),
            CellValue::BoolArray(v) => write_list(f, v),
            CellValue::IntArray(v) => write_list(f, v),
            CellValue::RealArray(v) => write_float_list(f, v),
            CellValue::DoubleArray(v) => write_float_list(f, v),
            CellValue::TextArray(v) => write_list(f, v),
            CellValue::Unsupported(type_name) => write!(f, "<{}>", type_name),
        }
    }
}

/// A row as ordered `(column, value)` pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, CellValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: CellValue) {
        self.columns.push((column.into(), value));
    }

    /// Decode every column of a Postgres row
    pub fn from_row(row: &PgRow) -> StorageResult<Self> {
        let mut record = Record::new();
        for column in row.columns() {
            let value = decode_column(row, column.ordinal(), column.type_info().name())
                .map_err(|e| StorageError::Decode {
                    column: column.name().to_string(),
                    message: e.to_string(),
                })?;
            record.push(column.name(), value);
        }
        Ok(record)
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(CellValue::as_text)
    }

    pub fn i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(CellValue::as_i64)
    }

    pub fn f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(CellValue::as_f64)
    }

    pub fn f64_vec(&self, column: &str) -> Option<Vec<f64>> {
        self.get(column).and_then(CellValue::as_f64_vec)
    }

    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        self.get(column).and_then(CellValue::as_date)
    }

    pub fn time(&self, column: &str) -> Option<NaiveTime> {
        self.get(column).and_then(CellValue::as_time)
    }
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Result<CellValue, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(CellValue::Null);
    }

    let value = match type_name {
        "BOOL" => CellValue::Bool(row.try_get(idx)?),
        "INT2" => CellValue::Int(i64::from(row.try_get::<i16, _>(idx)?)),
        "INT4" => CellValue::Int(i64::from(row.try_get::<i32, _>(idx)?)),
        "INT8" => CellValue::Int(row.try_get(idx)?),
        "FLOAT4" => CellValue::Real(row.try_get(idx)?),
        "FLOAT8" => CellValue::Double(row.try_get(idx)?),
        "NUMERIC" => CellValue::Numeric(row.try_get(idx)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => CellValue::Text(row.try_get(idx)?),
        "DATE" => CellValue::Date(row.try_get(idx)?),
        "TIME" => CellValue::Time(row.try_get(idx)?),
        "TIMESTAMP" => CellValue::Timestamp(row.try_get(idx)?),
        "TIMESTAMPTZ" => CellValue::TimestampTz(row.try_get(idx)?),
        "UUID" => CellValue::Uuid(row.try_get(idx)?),
        "JSON" | "JSONB" => CellValue::Json(row.try_get(idx)?),
        "BOOL[]" => CellValue::BoolArray(row.try_get(idx)?),
        "INT2[]" => CellValue::IntArray(
            row.try_get::<Vec<i16>, _>(idx)?
                .into_iter()
                .map(i64::from)
                .collect(),
        ),
        "INT4[]" => CellValue::IntArray(
            row.try_get::<Vec<i32>, _>(idx)?
                .into_iter()
                .map(i64::from)
                .collect(),
        ),
        "INT8[]" => CellValue::IntArray(row.try_get(idx)?),
        "FLOAT4[]" => CellValue::RealArray(row.try_get(idx)?),
        "FLOAT8[]" => CellValue::DoubleArray(row.try_get(idx)?),
        "TEXT[]" | "VARCHAR[]" => CellValue::TextArray(row.try_get(idx)?),
        other => CellValue::Unsupported(other.to_string()),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut record = Record::new();
        record.push("module_name", CellValue::Text("320-ML-F3TC-CM-0102".into()));
        record.push("mod_ivtest_no", CellValue::Int(7));
        record.push("rel_hum", CellValue::Text("41.5".into()));
        record.push("temp_c", CellValue::Null);
        record.push("meas_v", CellValue::RealArray(vec![0.0, 10.0, 20.5]));
        record.push(
            "date_test",
            CellValue::Date(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()),
        );
        record
    }

    #[test]
    fn test_lookup_by_column() {
        let record = sample();
        assert_eq!(record.len(), 6);
        assert_eq!(record.text("module_name").as_deref(), Some("320-ML-F3TC-CM-0102"));
        assert_eq!(record.i64("mod_ivtest_no"), Some(7));
        assert_eq!(record.f64("rel_hum"), Some(41.5));
        assert_eq!(record.text("temp_c"), None);
        assert_eq!(record.get("missing"), None);
        assert_eq!(
            record.date("date_test"),
            NaiveDate::from_ymd_opt(2025, 7, 1)
        );
    }

    #[test]
    fn test_text_dates_and_times() {
        assert_eq!(
            CellValue::Text("2025-07-01".into()).as_date(),
            NaiveDate::from_ymd_opt(2025, 7, 1)
        );
        assert_eq!(
            CellValue::Text("13:22:04".into()).as_time(),
            NaiveTime::from_hms_opt(13, 22, 4)
        );
        assert_eq!(CellValue::Text("noon".into()).as_time(), None);
    }

    #[test]
    fn test_array_accessor() {
        let record = sample();
        assert_eq!(record.f64_vec("meas_v"), Some(vec![0.0, 10.0, 20.5]));
        assert_eq!(record.f64_vec("module_name"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(CellValue::RealArray(vec![1.0, 2.5]).to_string(), "[1.0, 2.5]");
        assert_eq!(CellValue::IntArray(vec![1, 2]).to_string(), "[1, 2]");
        assert_eq!(CellValue::Double(3.0).to_string(), "3.0");
        assert_eq!(CellValue::Null.to_string(), "NULL");
        assert_eq!(CellValue::Unsupported("INTERVAL".into()).to_string(), "<INTERVAL>");
    }

    #[test]
    fn test_column_order_preserved() {
        let names: Vec<_> = sample().column_names().map(str::to_string).collect();
        assert_eq!(names[0], "module_name");
        assert_eq!(names[5], "date_test");
    }
}
