//! Value, record and schema types for rivven-extract
//!
//! - `Value`: dynamically-typed column value as decoded by a driver
//! - `Record`: one materialized result row, ordered by column position
//! - `SqlTypeCode`: portable native column type code reported by drivers
//! - `TypeTag` / `ColumnSchema`: canonical, driver-independent column typing

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// SQL value type that can hold any database value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean value
    Bool(bool),
    /// 8-bit signed integer (TINYINT)
    Int8(i8),
    /// 16-bit signed integer (SMALLINT)
    Int16(i16),
    /// 32-bit signed integer (INTEGER)
    Int32(i32),
    /// 64-bit signed integer (BIGINT)
    Int64(i64),
    /// 32-bit floating point (REAL)
    Float32(f32),
    /// 64-bit floating point (DOUBLE PRECISION)
    Float64(f64),
    /// Arbitrary precision decimal (NUMERIC, DECIMAL)
    Decimal(Decimal),
    /// Text string (VARCHAR, TEXT, CHAR)
    String(String),
    /// Binary data (BYTEA, BLOB, VARBINARY)
    Bytes(Vec<u8>),
    /// Date without time (DATE)
    Date(NaiveDate),
    /// Time without date (TIME)
    Time(NaiveTime),
    /// Timestamp without timezone (TIMESTAMP)
    DateTime(NaiveDateTime),
    /// Timestamp with timezone (TIMESTAMPTZ)
    DateTimeTz(DateTime<Utc>),
    /// UUID
    Uuid(Uuid),
    /// JSON value
    Json(serde_json::Value),
}

impl Value {
    /// Check if value is NULL
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to convert to bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int8(n) => Some(*n != 0),
            Self::Int16(n) => Some(*n != 0),
            Self::Int32(n) => Some(*n != 0),
            Self::Int64(n) => Some(*n != 0),
            _ => None,
        }
    }

    /// Try to convert to i64
    ///
    /// Only exact integers convert: decimals must have no fractional part and
    /// floating point values never convert.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int8(n) => Some(i64::from(*n)),
            Self::Int16(n) => Some(i64::from(*n)),
            Self::Int32(n) => Some(i64::from(*n)),
            Self::Int64(n) => Some(*n),
            Self::Decimal(d) if d.fract().is_zero() => i64::try_from(*d).ok(),
            _ => None,
        }
    }

    /// Try to convert to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int8(n) => Some(f64::from(*n)),
            Self::Int16(n) => Some(f64::from(*n)),
            Self::Int32(n) => Some(f64::from(*n)),
            Self::Int64(n) => Some(*n as f64),
            Self::Float32(n) => Some(f64::from(*n)),
            Self::Float64(n) => Some(*n),
            Self::Decimal(d) => d.to_string().parse().ok(),
            _ => None,
        }
    }

    /// Try to borrow as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Try to borrow as bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Convert to a JSON value for downstream document builders
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int8(n) => Json::from(*n),
            Self::Int16(n) => Json::from(*n),
            Self::Int32(n) => Json::from(*n),
            Self::Int64(n) => Json::from(*n),
            Self::Float32(n) => Json::from(f64::from(*n)),
            Self::Float64(n) => Json::from(*n),
            Self::Decimal(d) => Json::String(d.to_string()),
            Self::String(s) => Json::String(s.clone()),
            Self::Bytes(b) => Json::Array(b.iter().map(|x| Json::from(*x)).collect()),
            Self::Date(d) => Json::String(d.to_string()),
            Self::Time(t) => Json::String(t.to_string()),
            Self::DateTime(dt) => Json::String(dt.to_string()),
            Self::DateTimeTz(dt) => Json::String(dt.to_rfc3339()),
            Self::Uuid(u) => Json::String(u.to_string()),
            Self::Json(j) => j.clone(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Self::Int8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTimeTz(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Self::Null,
        }
    }
}

/// One extracted record: column names paired with values, in result order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Column names
    columns: Vec<String>,
    /// Column values (same order as columns)
    values: Vec<Value>,
}

impl Record {
    /// Create a new record
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Get column count
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if record has no fields
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get column names
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get all values
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Get value by 0-based position
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Get value by column name (case-insensitive)
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    /// Iterate over `(name, value)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Convert record to HashMap
    pub fn into_map(self) -> HashMap<String, Value> {
        self.columns.into_iter().zip(self.values).collect()
    }

    /// Convert record to a JSON object preserving column order
    pub fn to_json(&self) -> serde_json::Value {
        let object: serde_json::Map<String, serde_json::Value> = self
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_json()))
            .collect();
        serde_json::Value::Object(object)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Portable native column type code reported by drivers.
///
/// The numeric values are the X/Open SQL CLI codes shared by ODBC and JDBC, so
/// drivers for any database can report them without inventing a private numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SqlTypeCode(pub i32);

#[allow(missing_docs)]
impl SqlTypeCode {
    pub const BIT: Self = Self(-7);
    pub const TINYINT: Self = Self(-6);
    pub const SMALLINT: Self = Self(5);
    pub const INTEGER: Self = Self(4);
    pub const BIGINT: Self = Self(-5);
    pub const FLOAT: Self = Self(6);
    pub const REAL: Self = Self(7);
    pub const DOUBLE: Self = Self(8);
    pub const NUMERIC: Self = Self(2);
    pub const DECIMAL: Self = Self(3);
    pub const CHAR: Self = Self(1);
    pub const VARCHAR: Self = Self(12);
    pub const LONGVARCHAR: Self = Self(-1);
    pub const NCHAR: Self = Self(-15);
    pub const NVARCHAR: Self = Self(-9);
    pub const LONGNVARCHAR: Self = Self(-16);
    pub const DATE: Self = Self(91);
    pub const TIME: Self = Self(92);
    pub const TIMESTAMP: Self = Self(93);
    pub const TIME_WITH_TIMEZONE: Self = Self(2013);
    pub const TIMESTAMP_WITH_TIMEZONE: Self = Self(2014);
    pub const BINARY: Self = Self(-2);
    pub const VARBINARY: Self = Self(-3);
    pub const LONGVARBINARY: Self = Self(-4);
    pub const NULL: Self = Self(0);
    pub const OTHER: Self = Self(1111);
    pub const JAVA_OBJECT: Self = Self(2000);
    pub const DISTINCT: Self = Self(2001);
    pub const STRUCT: Self = Self(2002);
    pub const ARRAY: Self = Self(2003);
    pub const BLOB: Self = Self(2004);
    pub const CLOB: Self = Self(2005);
    pub const REF: Self = Self(2006);
    pub const BOOLEAN: Self = Self(16);
    pub const ROWID: Self = Self(-8);
    pub const NCLOB: Self = Self(2011);
    pub const SQLXML: Self = Self(2009);
}

impl fmt::Display for SqlTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical pipeline type used to annotate extracted columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TypeTag {
    /// true/false
    Boolean,
    /// Single byte
    Byte,
    /// 16-bit integer
    Short,
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    Long,
    /// 32-bit floating point
    Float,
    /// 64-bit floating point
    Double,
    /// Fixed-point decimal
    Decimal,
    /// Calendar date
    Date,
    /// Date and time
    Datetime,
    /// Text
    String,
    /// Raw bytes
    Binary,
    /// Unmapped source type; values pass through uninterpreted
    Any,
}

impl TypeTag {
    /// Upper-case name of the tag
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Byte => "BYTE",
            Self::Short => "SHORT",
            Self::Integer => "INTEGER",
            Self::Long => "LONG",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Decimal => "DECIMAL",
            Self::Date => "DATE",
            Self::Datetime => "DATETIME",
            Self::String => "STRING",
            Self::Binary => "BINARY",
            Self::Any => "ANY",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result column metadata as reported by a driver cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column label
    pub name: String,
    /// Portable native type code
    pub type_code: SqlTypeCode,
    /// Vendor type name (e.g. `int4`, `varchar`)
    pub type_name: String,
}

impl ColumnDescriptor {
    /// Create a column descriptor
    pub fn new(
        name: impl Into<String>,
        type_code: SqlTypeCode,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_code,
            type_name: type_name.into(),
        }
    }
}

/// One column of a [`ColumnSchema`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaColumn {
    /// Column name
    pub name: String,
    /// Canonical type
    pub type_tag: TypeTag,
    /// Native type code the tag was derived from
    pub type_code: SqlTypeCode,
    /// Vendor type name
    pub type_name: String,
}

/// Ordered, immutable column layout of one extraction
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ColumnSchema {
    columns: Vec<SchemaColumn>,
}

impl ColumnSchema {
    /// Build a schema from cursor metadata using the canonical type mapping
    pub fn from_descriptors(descriptors: &[ColumnDescriptor]) -> Self {
        let columns = descriptors
            .iter()
            .map(|d| SchemaColumn {
                name: d.name.clone(),
                type_tag: crate::mapping::map_type(d.type_code),
                type_code: d.type_code,
                type_name: d.type_name.clone(),
            })
            .collect();
        Self { columns }
    }

    /// Number of columns
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns in result order
    #[inline]
    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    /// Column at a 0-based position
    #[inline]
    pub fn column(&self, idx: usize) -> Option<&SchemaColumn> {
        self.columns.get(idx)
    }

    /// Column names in result order
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Canonical type of a named column (case-insensitive)
    pub fn type_of(&self, name: &str) -> Option<TypeTag> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.type_tag)
    }
}
