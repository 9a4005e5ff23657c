//! Value coercion and entity construction from records.
//!
//! Coercion walks an ordered adapter list; the first adapter whose
//! [`Adapter::can_adapt`] accepts the `(source, target)` pair performs the
//! conversion. Entities are built through their [`Constructor`].

use crate::error::{BuddyError, BuddyResult};
use crate::metadata::{Constructor, Entity, TableDetails};
use crate::record::Record;
use crate::value::{DataType, Value};
use chrono::NaiveTime;

/// One conversion strategy between value types.
pub trait Adapter: Send + Sync {
    fn can_adapt(&self, source: DataType, target: DataType) -> bool;

    fn adapt(&self, value: Value, target: DataType) -> Result<Value, String>;
}

struct Identity;

impl Adapter for Identity {
    fn can_adapt(&self, source: DataType, target: DataType) -> bool {
        source == target || target == DataType::Any
    }

    fn adapt(&self, value: Value, _target: DataType) -> Result<Value, String> {
        Ok(value)
    }
}

/// Numeric widening and narrowing. Narrowing integers is range checked,
/// floats are truncated towards zero.
struct NumberToNumber;

impl Adapter for NumberToNumber {
    fn can_adapt(&self, source: DataType, target: DataType) -> bool {
        source.is_numeric() && target.is_numeric()
    }

    fn adapt(&self, value: Value, target: DataType) -> Result<Value, String> {
        match value {
            Value::Real(v) => float_to(f64::from(v), target),
            Value::Double(v) => float_to(v, target),
            other => match other.as_i64() {
                Some(v) => int_to(v, target),
                None => Err(format!("{} is not a number", other.data_type())),
            },
        }
    }
}

fn int_to(v: i64, target: DataType) -> Result<Value, String> {
    let out_of_range = |_| format!("{v} is out of range for {target}");
    Ok(match target {
        DataType::SmallInt => Value::SmallInt(i16::try_from(v).map_err(out_of_range)?),
        DataType::Int => Value::Int(i32::try_from(v).map_err(out_of_range)?),
        DataType::BigInt => Value::BigInt(v),
        DataType::Real => Value::Real(v as f32),
        DataType::Double => Value::Double(v as f64),
        other => return Err(format!("{other} is not numeric")),
    })
}

fn float_to(v: f64, target: DataType) -> Result<Value, String> {
    match target {
        DataType::Real => Ok(Value::Real(v as f32)),
        DataType::Double => Ok(Value::Double(v)),
        _ if !v.is_finite() => Err(format!("{v} cannot be stored as {target}")),
        _ => int_to(v.trunc() as i64, target),
    }
}

struct TextToNumber;

impl Adapter for TextToNumber {
    fn can_adapt(&self, source: DataType, target: DataType) -> bool {
        source == DataType::Text && target.is_numeric()
    }

    fn adapt(&self, value: Value, target: DataType) -> Result<Value, String> {
        let Value::Text(text) = value else {
            return Err("expected text".to_string());
        };
        let text = text.trim();
        let fail = || format!("cannot parse '{text}' as {target}");
        match target {
            DataType::Real | DataType::Double => {
                let v: f64 = text.parse().map_err(|_| fail())?;
                float_to(v, target)
            }
            _ => {
                let v: i64 = text.parse().map_err(|_| fail())?;
                int_to(v, target)
            }
        }
    }
}

/// Conversions between dates, timestamps and times of day.
struct Temporal;

impl Adapter for Temporal {
    fn can_adapt(&self, source: DataType, target: DataType) -> bool {
        use DataType::*;
        matches!(
            (source, target),
            (TimestampTz, Timestamp | Date | Time)
                | (Timestamp, TimestampTz | Date | Time)
                | (Date, Timestamp | TimestampTz)
        )
    }

    fn adapt(&self, value: Value, target: DataType) -> Result<Value, String> {
        let naive = match value {
            Value::TimestampTz(v) => v.naive_utc(),
            Value::Timestamp(v) => v,
            Value::Date(v) => v.and_time(NaiveTime::MIN),
            other => return Err(format!("{} is not a date or timestamp", other.data_type())),
        };
        match target {
            DataType::Timestamp => Ok(Value::Timestamp(naive)),
            DataType::TimestampTz => Ok(Value::TimestampTz(naive.and_utc())),
            DataType::Date => Ok(Value::Date(naive.date())),
            DataType::Time => Ok(Value::Time(naive.time())),
            other => Err(format!("cannot convert a timestamp into {other}")),
        }
    }
}

struct TextToJson;

impl Adapter for TextToJson {
    fn can_adapt(&self, source: DataType, target: DataType) -> bool {
        source == DataType::Text && target == DataType::Json
    }

    fn adapt(&self, value: Value, _target: DataType) -> Result<Value, String> {
        match value {
            Value::Text(text) => serde_json::from_str(&text)
                .map(Value::Json)
                .map_err(|e| e.to_string()),
            other => Err(format!("expected text, got {}", other.data_type())),
        }
    }
}

struct BytesToJson;

impl Adapter for BytesToJson {
    fn can_adapt(&self, source: DataType, target: DataType) -> bool {
        source == DataType::Bytes && target == DataType::Json
    }

    fn adapt(&self, value: Value, _target: DataType) -> Result<Value, String> {
        match value {
            Value::Bytes(bytes) => serde_json::from_slice(&bytes)
                .map(Value::Json)
                .map_err(|e| e.to_string()),
            other => Err(format!("expected bytes, got {}", other.data_type())),
        }
    }
}

/// JSON strings become their content; every other document is serialized.
struct JsonToText;

impl Adapter for JsonToText {
    fn can_adapt(&self, source: DataType, target: DataType) -> bool {
        source == DataType::Json && target == DataType::Text
    }

    fn adapt(&self, value: Value, _target: DataType) -> Result<Value, String> {
        match value {
            Value::Json(serde_json::Value::String(s)) => Ok(Value::Text(s)),
            Value::Json(doc) => Ok(Value::Text(doc.to_string())),
            other => Err(format!("expected json, got {}", other.data_type())),
        }
    }
}

struct AnyToJson;

impl Adapter for AnyToJson {
    fn can_adapt(&self, _source: DataType, target: DataType) -> bool {
        target == DataType::Json
    }

    fn adapt(&self, value: Value, _target: DataType) -> Result<Value, String> {
        use serde_json::Value as Json;
        Ok(Value::Json(match value {
            Value::Null => Json::Null,
            Value::Bool(v) => Json::Bool(v),
            Value::SmallInt(v) => Json::from(v),
            Value::Int(v) => Json::from(v),
            Value::BigInt(v) => Json::from(v),
            Value::Real(v) => Json::from(f64::from(v)),
            Value::Double(v) => Json::from(v),
            Value::Json(doc) => doc,
            other => Json::String(other.to_string()),
        }))
    }
}

struct AnyToText;

impl Adapter for AnyToText {
    fn can_adapt(&self, _source: DataType, target: DataType) -> bool {
        target == DataType::Text
    }

    fn adapt(&self, value: Value, _target: DataType) -> Result<Value, String> {
        Ok(Value::Text(value.to_string()))
    }
}

static ADAPTERS: &[&dyn Adapter] = &[
    &Identity,
    &NumberToNumber,
    &TextToNumber,
    &Temporal,
    &TextToJson,
    &BytesToJson,
    &JsonToText,
    &AnyToJson,
    &AnyToText,
];

/// The adapter list in lookup order.
pub fn adapters() -> &'static [&'static dyn Adapter] {
    ADAPTERS
}

/// Coerce `value` into `target`. NULL passes through unchanged.
pub fn coerce(column: &str, value: Value, target: DataType) -> BuddyResult<Value> {
    if value.is_null() {
        return Ok(value);
    }
    let source = value.data_type();
    let adapter = ADAPTERS
        .iter()
        .find(|a| a.can_adapt(source, target))
        .ok_or_else(|| {
            BuddyError::decode(column, format!("no conversion from {source} to {target}"))
        })?;
    adapter
        .adapt(value, target)
        .map_err(|message| BuddyError::decode(column, message))
}

/// Build an entity from a record using the entity's constructor strategy.
pub(crate) fn map_entity<E: Entity>(details: &TableDetails, record: &Record) -> BuddyResult<E> {
    match E::constructor() {
        Constructor::AllArgs(build) => {
            let values = details
                .columns()
                .iter()
                .map(|c| {
                    let value = record.get(&c.name).cloned().unwrap_or(Value::Null);
                    coerce(&c.name, value, c.data_type)
                })
                .collect::<BuddyResult<Vec<_>>>()?;
            build(values)
        }
        Constructor::FieldAssign { new, assign } => {
            let mut entity = new();
            for column in details.columns() {
                // absent or NULL columns keep the default
                if let Some(value) = record.get(&column.name) {
                    let value = coerce(&column.name, value.clone(), column.data_type)?;
                    assign(&mut entity, column.field, value)?;
                }
            }
            Ok(entity)
        }
        Constructor::Missing => Err(BuddyError::Mapping(format!(
            "No constructor for entity: {}",
            details.type_name()
        ))),
    }
}
