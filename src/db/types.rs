//! Row decoding into driver-neutral records.
//!
//! Each driver row is turned into a `Record`, an ordered map from column name to
//! JSON value. SQL NULL is represented by the column being absent from the map.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Driver-specific decoders handle the actual value extraction
//!
//! Queries are sent without bind parameters, so MySQL and PostgreSQL answer in
//! their text formats. Anything the typed decoders cannot handle falls back to
//! the raw text, then to the raw bytes.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

/// One decoded row. NULL columns are absent.
pub type Record = serde_json::Map<String, JsonValue>;

/// Decoded result of one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column names in result order; empty when no rows came back.
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    /// Build a row set from driver rows.
    pub fn from_rows<R: RowToRecord>(rows: &[R]) -> Self {
        let columns = rows.first().map(|r| r.column_names()).unwrap_or_default();
        let records = rows.iter().map(|r| r.to_record()).collect();
        Self { columns, records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }
}

// =============================================================================
// Record Access
// =============================================================================

/// Lenient typed access to record fields.
///
/// Catalog queries return flags and counts in whatever shape the driver
/// produces (bit, tinyint, bigint, numeric text), so accessors accept any
/// reasonable encoding.
pub trait RecordExt {
    fn field(&self, key: &str) -> Option<&JsonValue>;

    fn text(&self, key: &str) -> Option<String> {
        self.field(key).map(display_value)
    }

    fn int(&self, key: &str) -> Option<i64> {
        match self.field(key)? {
            JsonValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_u64().map(|v| v.min(i64::MAX as u64) as i64))
                .or_else(|| n.as_f64().map(|v| v as i64)),
            JsonValue::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|v| v as i64))
            }
            JsonValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    fn flag(&self, key: &str) -> bool {
        match self.field(key) {
            Some(JsonValue::Bool(b)) => *b,
            Some(JsonValue::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(JsonValue::String(s)) => matches!(
                s.trim().to_lowercase().as_str(),
                "1" | "true" | "t" | "yes" | "y"
            ),
            _ => false,
        }
    }
}

impl RecordExt for Record {
    /// Exact match first, then case-insensitive (PostgreSQL folds unquoted aliases).
    fn field(&self, key: &str) -> Option<&JsonValue> {
        self.get(key).or_else(|| {
            self.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }
}

/// Render a value for display: strings as-is, everything else as JSON text.
pub fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Temporal,
    Unknown,
}

/// Classify a driver-reported type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Arrays arrive as text literals
    if lower.ends_with("[]") || lower.starts_with('_') {
        return TypeCategory::Unknown;
    }

    let base = lower
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();

    match base {
        "decimal" | "numeric" | "money" => TypeCategory::Decimal,
        "bool" | "boolean" => TypeCategory::Boolean,
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2" | "int4"
        | "int8" | "year" => TypeCategory::Integer,
        "float" | "double" | "real" | "float4" | "float8" => TypeCategory::Float,
        "json" | "jsonb" => TypeCategory::Json,
        "date" | "time" | "datetime" | "timestamp" | "timestamptz" => TypeCategory::Temporal,
        "char" | "varchar" | "bpchar" | "text" | "tinytext" | "mediumtext" | "longtext"
        | "name" | "enum" | "set" | "uuid" => TypeCategory::Text,
        b if b.contains("blob") || b.contains("binary") || b == "bytea" => TypeCategory::Binary,
        _ => TypeCategory::Unknown,
    }
}

// =============================================================================
// Raw Text and Bytes
// =============================================================================

/// Column value as the server's own text rendering, regardless of declared type.
#[derive(Debug)]
pub struct RawText(pub String);

/// Column value as raw bytes, regardless of declared type.
#[derive(Debug)]
pub struct RawBytes(pub Vec<u8>);

impl Type<sqlx::MySql> for RawText {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(_ty: &MySqlTypeInfo) -> bool {
        true
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawText {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawText(s.to_string()))
    }
}

impl Type<sqlx::MySql> for RawBytes {
    fn type_info() -> MySqlTypeInfo {
        <Vec<u8> as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(_ty: &MySqlTypeInfo) -> bool {
        true
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawBytes {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let b = <&[u8] as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawBytes(b.to_vec()))
    }
}

impl Type<sqlx::Postgres> for RawText {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawText {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawText(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawBytes {
    fn type_info() -> PgTypeInfo {
        <Vec<u8> as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawBytes {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let b = <&[u8] as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawBytes(b.to_vec()))
    }
}

// =============================================================================
// Value Encoding
// =============================================================================

/// Binary data as UTF-8 text when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn iso_datetime(dt: &chrono::NaiveDateTime) -> JsonValue {
    JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

/// Render a scaled integer (SQL Server NUMERIC/DECIMAL) exactly.
pub fn format_scaled(value: i128, scale: u8) -> String {
    if scale == 0 {
        return value.to_string();
    }
    let scale = scale as usize;
    let digits = value.unsigned_abs().to_string();
    let digits = if digits.len() <= scale {
        format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
    } else {
        digits
    };
    let (int_part, frac_part) = digits.split_at(digits.len() - scale);
    let sign = if value < 0 { "-" } else { "" };
    format!("{}{}.{}", sign, int_part, frac_part)
}

// =============================================================================
// Row to Record Trait
// =============================================================================

/// Trait for converting driver rows to records.
pub trait RowToRecord {
    fn column_names(&self) -> Vec<String>;
    fn to_record(&self) -> Record;
}

impl RowToRecord for MySqlRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_record(&self) -> Record {
        self.columns()
            .iter()
            .enumerate()
            .filter_map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name);
                mysql::decode_column(self, idx, type_name, category)
                    .map(|value| (col.name().to_string(), value))
            })
            .collect()
    }
}

impl RowToRecord for PgRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_record(&self) -> Record {
        self.columns()
            .iter()
            .enumerate()
            .filter_map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name);
                postgres::decode_column(self, idx, type_name, category)
                    .map(|value| (col.name().to_string(), value))
            })
            .collect()
    }
}

impl RowToRecord for tiberius::Row {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_record(&self) -> Record {
        self.cells()
            .enumerate()
            .filter_map(|(idx, (col, data))| {
                mssql::decode_cell(self, idx, data).map(|value| (col.name().to_string(), value))
            })
            .collect()
    }
}

// =============================================================================
// Driver-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    /// `None` means SQL NULL.
    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> Option<JsonValue> {
        match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return None,
            Err(_) => return None,
            Ok(_) => {}
        }
        let typed = match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx, type_name),
            TypeCategory::Binary => decode_bytes(row, idx),
            TypeCategory::Decimal | TypeCategory::Text | TypeCategory::Unknown => None,
        };
        typed.or_else(|| decode_fallback(row, idx))
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<u64, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        None
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Some(float_value(v));
        }
        row.try_get::<f32, _>(idx)
            .ok()
            .map(|v| float_value(f64::from(v)))
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<bool, _>(idx) {
            return Some(JsonValue::Bool(v));
        }
        row.try_get::<i8, _>(idx).ok().map(|v| JsonValue::Bool(v != 0))
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<JsonValue, _>(idx) {
            return Some(v);
        }
        let text = row.try_get::<RawText, _>(idx).ok()?;
        serde_json::from_str(&text.0).ok()
    }

    fn decode_temporal(row: &MySqlRow, idx: usize, type_name: &str) -> Option<JsonValue> {
        match type_name.to_lowercase().as_str() {
            "date" => row
                .try_get::<chrono::NaiveDate, _>(idx)
                .ok()
                .map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string())),
            "time" => row
                .try_get::<chrono::NaiveTime, _>(idx)
                .ok()
                .map(|t| JsonValue::String(t.format("%H:%M:%S%.f").to_string())),
            "timestamp" => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
                .ok()
                .map(|dt| JsonValue::String(dt.to_rfc3339())),
            _ => row
                .try_get::<chrono::NaiveDateTime, _>(idx)
                .ok()
                .map(|dt| iso_datetime(&dt)),
        }
    }

    fn decode_bytes(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        row.try_get::<RawBytes, _>(idx)
            .ok()
            .map(|b| decode_binary_value(&b.0))
    }

    fn decode_fallback(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        if let Ok(text) = row.try_get::<RawText, _>(idx) {
            return Some(JsonValue::String(text.0));
        }
        match decode_bytes(row, idx) {
            Some(v) => Some(v),
            None => {
                tracing::warn!(column = idx, "Failed to decode MySQL column");
                Some(JsonValue::Null)
            }
        }
    }
}

mod postgres {
    use super::*;

    /// `None` means SQL NULL.
    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> Option<JsonValue> {
        match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return None,
            Err(_) => return None,
            Ok(_) => {}
        }
        let typed = match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Boolean => row.try_get::<bool, _>(idx).ok().map(JsonValue::Bool),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx, type_name),
            TypeCategory::Binary => row
                .try_get::<Vec<u8>, _>(idx)
                .ok()
                .map(|b| decode_binary_value(&b)),
            TypeCategory::Decimal | TypeCategory::Text | TypeCategory::Unknown => None,
        };
        typed.or_else(|| decode_fallback(row, idx))
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        row.try_get::<i64, _>(idx)
            .ok()
            .map(|v| JsonValue::Number(v.into()))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Some(float_value(v));
        }
        row.try_get::<f32, _>(idx)
            .ok()
            .map(|v| float_value(f64::from(v)))
    }

    fn decode_json(row: &PgRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<JsonValue, _>(idx) {
            return Some(v);
        }
        let text = row.try_get::<RawText, _>(idx).ok()?;
        serde_json::from_str(&text.0).ok()
    }

    fn decode_temporal(row: &PgRow, idx: usize, type_name: &str) -> Option<JsonValue> {
        match type_name.to_lowercase().as_str() {
            "date" => row
                .try_get::<chrono::NaiveDate, _>(idx)
                .ok()
                .map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string())),
            "time" => row
                .try_get::<chrono::NaiveTime, _>(idx)
                .ok()
                .map(|t| JsonValue::String(t.format("%H:%M:%S%.f").to_string())),
            "timestamptz" => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
                .ok()
                .map(|dt| JsonValue::String(dt.to_rfc3339())),
            _ => row
                .try_get::<chrono::NaiveDateTime, _>(idx)
                .ok()
                .map(|dt| iso_datetime(&dt)),
        }
    }

    fn decode_fallback(row: &PgRow, idx: usize) -> Option<JsonValue> {
        if let Ok(text) = row.try_get::<RawText, _>(idx) {
            return Some(JsonValue::String(text.0));
        }
        match row.try_get::<RawBytes, _>(idx) {
            Ok(bytes) => Some(decode_binary_value(&bytes.0)),
            Err(e) => {
                tracing::warn!(column = idx, error = %e, "Failed to decode PostgreSQL column");
                Some(JsonValue::Null)
            }
        }
    }
}

mod mssql {
    use super::*;
    use tiberius::ColumnData;

    /// `None` means SQL NULL.
    pub fn decode_cell(row: &tiberius::Row, idx: usize, data: &ColumnData<'_>) -> Option<JsonValue> {
        let value = match data {
            ColumnData::Bit(Some(b)) => JsonValue::Bool(*b),
            ColumnData::U8(Some(v)) => JsonValue::Number((*v).into()),
            ColumnData::I16(Some(v)) => JsonValue::Number((*v).into()),
            ColumnData::I32(Some(v)) => JsonValue::Number((*v).into()),
            ColumnData::I64(Some(v)) => JsonValue::Number((*v).into()),
            ColumnData::F32(Some(v)) => float_value(f64::from(*v)),
            ColumnData::F64(Some(v)) => float_value(*v),
            ColumnData::Numeric(Some(n)) => JsonValue::String(format_scaled(n.value(), n.scale())),
            ColumnData::String(Some(s)) => JsonValue::String(s.to_string()),
            ColumnData::Guid(Some(g)) => JsonValue::String(g.to_string()),
            ColumnData::Binary(Some(b)) => decode_binary_value(b),
            ColumnData::Xml(Some(xml)) => JsonValue::String(xml.to_string()),
            ColumnData::DateTime(Some(_))
            | ColumnData::SmallDateTime(Some(_))
            | ColumnData::DateTime2(Some(_)) => row
                .try_get::<chrono::NaiveDateTime, _>(idx)
                .ok()
                .flatten()
                .map(|dt| iso_datetime(&dt))
                .unwrap_or(JsonValue::Null),
            ColumnData::DateTimeOffset(Some(_)) => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
                .ok()
                .flatten()
                .map(|dt| JsonValue::String(dt.to_rfc3339()))
                .unwrap_or(JsonValue::Null),
            ColumnData::Date(Some(_)) => row
                .try_get::<chrono::NaiveDate, _>(idx)
                .ok()
                .flatten()
                .map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(JsonValue::Null),
            ColumnData::Time(Some(_)) => row
                .try_get::<chrono::NaiveTime, _>(idx)
                .ok()
                .flatten()
                .map(|t| JsonValue::String(t.format("%H:%M:%S%.f").to_string()))
                .unwrap_or(JsonValue::Null),
            // All None variants
            _ => return None,
        };
        Some(value)
    }
}
