//! In-memory executor shared by integration tests.

#![allow(dead_code)]

use buddy::{BuddyResult, ColumnType, NoCopy, RawRow, SqlExecutor, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct FakeRow(pub Vec<(String, ColumnType, Value)>);

impl FakeRow {
    pub fn new<I, K>(columns: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self(
            columns
                .into_iter()
                .map(|(name, value)| {
                    let ty = column_type_of(&value);
                    (name.into(), ty, value)
                })
                .collect(),
        )
    }
}

fn column_type_of(value: &Value) -> ColumnType {
    match value {
        Value::Bool(_) => ColumnType::Bool,
        Value::SmallInt(_) => ColumnType::SmallInt,
        Value::Int(_) => ColumnType::Int,
        Value::BigInt(_) => ColumnType::BigInt,
        Value::Real(_) => ColumnType::Real,
        Value::Double(_) => ColumnType::Double,
        Value::Text(_) => ColumnType::Text,
        Value::Bytes(_) => ColumnType::Bytes,
        Value::Json(_) => ColumnType::Json,
        Value::Date(_) => ColumnType::Date,
        Value::Time(_) => ColumnType::Time,
        Value::Timestamp(_) => ColumnType::Timestamp,
        Value::TimestampTz(_) => ColumnType::TimestampTz,
        Value::Uuid(_) => ColumnType::Uuid,
        Value::Null => ColumnType::Other,
    }
}

impl RawRow for FakeRow {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn column_name(&self, index: usize) -> &str {
        &self.0[index].0
    }

    fn column_type(&self, index: usize) -> ColumnType {
        self.0[index].1
    }

    fn value(&self, index: usize) -> BuddyResult<Value> {
        Ok(self.0[index].2.clone())
    }
}

/// Scripted executor: every query pops the next queued result set
/// (empty when the script is exhausted); every call is recorded.
pub struct FakeDb {
    product: &'static str,
    results: Mutex<VecDeque<Vec<FakeRow>>>,
    pub statements: Mutex<Vec<(String, Vec<Value>)>>,
}

impl FakeDb {
    pub fn new(product: &'static str) -> Self {
        Self {
            product,
            results: Mutex::new(VecDeque::new()),
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn push_result(&self, rows: Vec<FakeRow>) {
        self.results.lock().unwrap().push_back(rows);
    }

    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.statements.lock().unwrap().clone()
    }

    pub fn last_sql(&self) -> String {
        self.statements().last().map(|(sql, _)| sql.clone()).unwrap_or_default()
    }

    fn record(&self, sql: &str, params: &[Value]) -> Vec<FakeRow> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        self.results.lock().unwrap().pop_front().unwrap_or_default()
    }
}

impl SqlExecutor for FakeDb {
    type Row = FakeRow;
    type Sink = NoCopy;

    fn product_name(&self) -> &str {
        self.product
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> BuddyResult<u64> {
        Ok(self.record(sql, params).len() as u64)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> BuddyResult<Vec<FakeRow>> {
        Ok(self.record(sql, params))
    }

    async fn execute_returning_keys(
        &self,
        sql: &str,
        params: &[Value],
        _columns: &[String],
    ) -> BuddyResult<Vec<FakeRow>> {
        Ok(self.record(sql, params))
    }
}
