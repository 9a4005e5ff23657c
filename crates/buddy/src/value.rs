//! Bind/row values and the column type model.

use crate::error::{BuddyError, BuddyResult};
use crate::mapper;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use uuid::Uuid;

/// A single bind parameter or decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
}

/// Declared type of a mapped column.
///
/// Dialects use it to pick placeholders, the row mapper uses it as the
/// coercion target when building entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    SmallInt,
    Int,
    BigInt,
    Real,
    Double,
    Text,
    Bytes,
    Json,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    /// Accepts any value unchanged.
    Any,
}

impl DataType {
    /// SQL spelling of the type, usable in casts.
    pub fn sql_name(self) -> &'static str {
        match self {
            DataType::Bool => "boolean",
            DataType::SmallInt => "smallint",
            DataType::Int => "integer",
            DataType::BigInt => "bigint",
            DataType::Real => "real",
            DataType::Double => "double precision",
            DataType::Text => "text",
            DataType::Bytes => "bytea",
            DataType::Json => "jsonb",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::Timestamp => "timestamp",
            DataType::TimestampTz => "timestamptz",
            DataType::Uuid => "uuid",
            DataType::Any => "any",
        }
    }

    /// Whether values of this type are numbers.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            DataType::SmallInt | DataType::Int | DataType::BigInt | DataType::Real | DataType::Double
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

impl Value {
    /// Serialize any `serde` value into a JSON document value.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> BuddyResult<Self> {
        Ok(Value::Json(serde_json::to_value(value)?))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The natural [`DataType`] of this value (`Any` for NULL).
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Any,
            Value::Bool(_) => DataType::Bool,
            Value::SmallInt(_) => DataType::SmallInt,
            Value::Int(_) => DataType::Int,
            Value::BigInt(_) => DataType::BigInt,
            Value::Real(_) => DataType::Real,
            Value::Double(_) => DataType::Double,
            Value::Text(_) => DataType::Text,
            Value::Bytes(_) => DataType::Bytes,
            Value::Json(_) => DataType::Json,
            Value::Date(_) => DataType::Date,
            Value::Time(_) => DataType::Time,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::TimestampTz(_) => DataType::TimestampTz,
            Value::Uuid(_) => DataType::Uuid,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of any integral value.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::SmallInt(v) => Some(i64::from(v)),
            Value::Int(v) => Some(i64::from(v)),
            Value::BigInt(v) => Some(v),
            _ => None,
        }
    }

    /// Deserialize a JSON document value into `T`.
    pub fn decode_json<T: DeserializeOwned>(self, column: &str) -> BuddyResult<T> {
        let doc = <serde_json::Value as FromValue>::from_value(column, self)?;
        Ok(serde_json::from_value(doc)?)
    }
}

/// Textual form, as written into CSV copy streams. NULL is empty.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{v}"),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Bytes(bytes) => {
                f.write_str("\\x")?;
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Value::Json(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::TimestampTz(v) => f.write_str(&v.to_rfc3339()),
            Value::Uuid(v) => write!(f, "{v}"),
        }
    }
}

/// Maps a Rust type to the [`DataType`] of the column holding it.
///
/// This is used by the derive macro to describe entity fields.
pub trait SqlType {
    fn data_type() -> DataType;
}

/// Builds a Rust value out of a decoded [`Value`], coercing through the
/// adapter list when the stored type differs from the requested one.
pub trait FromValue: Sized {
    fn from_value(column: &str, value: Value) -> BuddyResult<Self>;
}

macro_rules! scalar_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl SqlType for $ty {
            fn data_type() -> DataType {
                DataType::$variant
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }

        impl FromValue for $ty {
            fn from_value(column: &str, value: Value) -> BuddyResult<Self> {
                match mapper::coerce(column, value, DataType::$variant)? {
                    Value::$variant(v) => Ok(v),
                    Value::Null => Err(BuddyError::decode(column, "unexpected NULL")),
                    other => Err(BuddyError::decode(
                        column,
                        format!("expected {}, got {}", DataType::$variant, other.data_type()),
                    )),
                }
            }
        }
    )*};
}

scalar_value! {
    bool => Bool,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    f32 => Real,
    f64 => Double,
    String => Text,
    Vec<u8> => Bytes,
    serde_json::Value => Json,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    Uuid => Uuid,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: SqlType> SqlType for Option<T> {
    fn data_type() -> DataType {
        T::data_type()
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(column: &str, value: Value) -> BuddyResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(column, value).map(Some)
        }
    }
}

impl FromValue for Value {
    fn from_value(_column: &str, value: Value) -> BuddyResult<Self> {
        Ok(value)
    }
}
