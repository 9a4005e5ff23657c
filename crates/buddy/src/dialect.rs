//! Vendor rendering and decoding rules.

use crate::error::BuddyResult;
use crate::executor::{ColumnType, RawRow};
use crate::expr::{Expr, QueryPart};
use crate::value::{DataType, Value};
use std::fmt::Debug;
use std::sync::Arc;

/// Vendor-specific SQL rendering and column decoding.
pub trait Dialect: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `INSERT ... RETURNING` is available.
    fn supports_returning(&self) -> bool {
        false
    }

    /// Bind placeholder for a column of the given type.
    fn placeholder_for(&self, data_type: DataType) -> &'static str {
        let _ = data_type;
        "?"
    }

    /// Append the "ignore on conflict" clause of an insert.
    fn render_conflict_ignore(&self, sql: &mut String) {
        sql.push_str(" ON CONFLICT DO NOTHING");
    }

    /// Append the "ignore duplicate key" clause of an insert.
    fn render_duplicate_ignore(&self, sql: &mut String) {
        sql.push_str(" ON CONFLICT DO NOTHING");
    }

    /// Append a RETURNING clause. Dialects without support render nothing.
    fn render_returning(&self, sql: &mut String, fields: &[Expr]) {
        let _ = (sql, fields);
    }

    /// Decode column `index` of `row`.
    fn read_column(
        &self,
        column_type: ColumnType,
        row: &dyn RawRow,
        index: usize,
    ) -> BuddyResult<Value> {
        let _ = column_type;
        row.value(index)
    }
}

fn decode_document(value: Value) -> BuddyResult<Value> {
    Ok(match value {
        Value::Text(text) => Value::Json(serde_json::from_str(&text)?),
        Value::Bytes(bytes) => Value::Json(serde_json::from_slice(&bytes)?),
        other => other,
    })
}

/// Conservative rules: no RETURNING, plain placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDialect;

impl Dialect for DefaultDialect {
    fn name(&self) -> &'static str {
        "default"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn placeholder_for(&self, data_type: DataType) -> &'static str {
        match data_type {
            DataType::Json => "?::jsonb",
            _ => "?",
        }
    }

    fn render_returning(&self, sql: &mut String, fields: &[Expr]) {
        if fields.is_empty() {
            return;
        }
        sql.push_str(" RETURNING ");
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            field.write_sql(sql, false);
        }
    }

    fn read_column(
        &self,
        column_type: ColumnType,
        row: &dyn RawRow,
        index: usize,
    ) -> BuddyResult<Value> {
        let value = row.value(index)?;
        match column_type {
            ColumnType::Json => decode_document(value),
            _ => Ok(value),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct H2Dialect;

impl Dialect for H2Dialect {
    fn name(&self) -> &'static str {
        "H2"
    }

    fn placeholder_for(&self, data_type: DataType) -> &'static str {
        match data_type {
            DataType::Json => "? FORMAT JSON",
            _ => "?",
        }
    }

    fn read_column(
        &self,
        column_type: ColumnType,
        row: &dyn RawRow,
        index: usize,
    ) -> BuddyResult<Value> {
        match (column_type, row.value(index)?) {
            (ColumnType::Other, Value::Bytes(bytes)) => {
                Ok(Value::Json(serde_json::from_slice(&bytes)?))
            }
            (_, value) => Ok(value),
        }
    }
}

/// Dialect for a database product name; unknown products get [`DefaultDialect`].
pub fn of(product_name: &str) -> Arc<dyn Dialect> {
    match product_name {
        "PostgreSQL" => Arc::new(PostgresDialect),
        "H2" => Arc::new(H2Dialect),
        _ => Arc::new(DefaultDialect),
    }
}
