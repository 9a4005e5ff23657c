//! Generic rows and their conversion into typed values.

use crate::dialect::Dialect;
use crate::error::{BuddyError, BuddyResult};
use crate::executor::{ColumnType, RawRow};
use crate::mapper;
use crate::metadata::{Entity, Introspector};
use crate::value::{FromValue, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Case-insensitive, ordered column name to value mapping.
///
/// Names are stored lower-cased and NULL columns are left out, so a missing
/// key and a NULL value read the same.
#[derive(Clone)]
pub struct Record {
    columns: Vec<(String, Value)>,
    registry: Arc<Introspector>,
}

impl Record {
    pub fn new<K, I>(columns: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::with_registry(columns, Arc::new(Introspector::new()))
    }

    /// Record whose entity conversions share `registry`'s metadata cache.
    pub fn with_registry<K, I>(columns: I, registry: Arc<Introspector>) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let columns = columns
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| (name.into().to_lowercase(), value))
            .collect();
        Self { columns, registry }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let name = name.to_lowercase();
        self.columns
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Typed column read. Absent columns read as NULL.
    pub fn get_as<T: FromValue>(&self, name: &str) -> BuddyResult<T> {
        let value = self.get(name).cloned().unwrap_or(Value::Null);
        T::from_value(name, value)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// First column, if any.
    pub fn first(&self) -> Option<(&str, &Value)> {
        self.iter().next()
    }

    /// Convert into an entity, a scalar (first value) or the record itself.
    pub fn into<T: FromRecord>(self) -> BuddyResult<T> {
        T::from_record(self)
    }

    /// Build the entity `E` out of this record.
    pub fn to_entity<E: Entity>(&self) -> BuddyResult<E> {
        let details = self.registry.analyze::<E>();
        mapper::map_entity(&details, self)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.columns.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

/// Conversion out of a [`Record`].
///
/// `#[derive(Entity)]` implements this for entity types.
pub trait FromRecord: Sized {
    fn from_record(record: Record) -> BuddyResult<Self>;
}

impl FromRecord for Record {
    fn from_record(record: Record) -> BuddyResult<Self> {
        Ok(record)
    }
}

fn first_value<T: FromValue>(record: Record) -> BuddyResult<T> {
    match record.columns.into_iter().next() {
        Some((name, value)) => T::from_value(&name, value),
        None => T::from_value("?column?", Value::Null),
    }
}

impl<T: FromValue> FromRecord for Option<T> {
    fn from_record(record: Record) -> BuddyResult<Self> {
        first_value(record)
    }
}

macro_rules! scalar_record {
    ($($ty:ty),* $(,)?) => {$(
        impl FromRecord for $ty {
            fn from_record(record: Record) -> BuddyResult<Self> {
                first_value(record)
            }
        }
    )*};
}

scalar_record!(
    bool,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    Vec<u8>,
    serde_json::Value,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    DateTime<Utc>,
    Uuid,
    Value,
);

/// Turns raw executor rows into records for one result set.
///
/// Column names and types are read from the first row and reused.
pub(crate) struct RecordMapper {
    dialect: Arc<dyn Dialect>,
    registry: Arc<Introspector>,
    columns: Option<Vec<(String, ColumnType)>>,
}

impl RecordMapper {
    pub(crate) fn new(dialect: Arc<dyn Dialect>, registry: Arc<Introspector>) -> Self {
        Self {
            dialect,
            registry,
            columns: None,
        }
    }

    pub(crate) fn map<R: RawRow>(&mut self, row: &R) -> BuddyResult<Record> {
        let columns = self.columns.get_or_insert_with(|| {
            (0..row.len())
                .map(|i| (row.column_name(i).to_lowercase(), row.column_type(i)))
                .collect()
        });
        if columns.len() != row.len() {
            return Err(BuddyError::Mapping(format!(
                "row has {} columns, result set has {}",
                row.len(),
                columns.len()
            )));
        }
        let mut values = Vec::with_capacity(columns.len());
        for (index, (name, column_type)) in columns.iter().enumerate() {
            let value = self.dialect.read_column(*column_type, row, index)?;
            values.push((name.clone(), value));
        }
        Ok(Record::with_registry(values, Arc::clone(&self.registry)))
    }
}
