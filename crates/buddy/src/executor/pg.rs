//! `tokio-postgres` executor.

use super::{ColumnType, CopySink, RawRow, RowStream, SqlExecutor};
use crate::error::{BuddyError, BuddyResult};
use crate::value::Value;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::{SinkExt, TryStreamExt};
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::error::Error;
use std::pin::Pin;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};
use tokio_postgres::{CopyInSink, Row};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

fn int_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => v.to_string().to_sql(ty, out),
        _ => v.to_sql(ty, out),
    }
}

fn float_to_sql(v: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => v.to_string().to_sql(ty, out),
        _ => v.to_sql(ty, out),
    }
}

/// Values adapt to the parameter type the server inferred, so an `i32` binds
/// to a `bigint` column and JSON text binds to `jsonb`.
impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::SmallInt(v) => int_to_sql(i64::from(*v), ty, out),
            Value::Int(v) => int_to_sql(i64::from(*v), ty, out),
            Value::BigInt(v) => int_to_sql(*v, ty, out),
            Value::Real(v) => float_to_sql(f64::from(*v), ty, out),
            Value::Double(v) => float_to_sql(*v, ty, out),
            Value::Text(v) => match *ty {
                Type::JSON | Type::JSONB => {
                    serde_json::from_str::<serde_json::Value>(v)?.to_sql(ty, out)
                }
                Type::UUID => Uuid::parse_str(v)?.to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Bytes(v) => v.to_sql(ty, out),
            Value::Json(v) => match *ty {
                Type::JSON | Type::JSONB => v.to_sql(ty, out),
                _ => v.to_string().to_sql(ty, out),
            },
            Value::Date(v) => v.to_sql(ty, out),
            Value::Time(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql(ty, out),
            Value::TimestampTz(v) => v.to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Undecoded column payload, for types without a native mapping.
struct RawBytes(Vec<u8>);

impl<'a> FromSql<'a> for RawBytes {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(RawBytes(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn column_type_of(ty: &Type) -> ColumnType {
    match *ty {
        Type::BOOL => ColumnType::Bool,
        Type::INT2 => ColumnType::SmallInt,
        Type::INT4 => ColumnType::Int,
        Type::INT8 => ColumnType::BigInt,
        Type::FLOAT4 => ColumnType::Real,
        Type::FLOAT8 => ColumnType::Double,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            ColumnType::Text
        }
        Type::BYTEA => ColumnType::Bytes,
        Type::JSON | Type::JSONB => ColumnType::Json,
        Type::DATE => ColumnType::Date,
        Type::TIME => ColumnType::Time,
        Type::TIMESTAMP => ColumnType::Timestamp,
        Type::TIMESTAMPTZ => ColumnType::TimestampTz,
        Type::UUID => ColumnType::Uuid,
        Type::NUMERIC => ColumnType::Numeric,
        _ => match ty.kind() {
            Kind::Enum(_) => ColumnType::Text,
            _ => ColumnType::Other,
        },
    }
}

fn get<'a, T, F>(row: &'a Row, index: usize, wrap: F) -> BuddyResult<Value>
where
    T: FromSql<'a>,
    F: FnOnce(T) -> Value,
{
    let value: Option<T> = row
        .try_get(index)
        .map_err(|e| BuddyError::decode(row.columns()[index].name(), e.to_string()))?;
    Ok(value.map_or(Value::Null, wrap))
}

impl RawRow for Row {
    fn len(&self) -> usize {
        Row::len(self)
    }

    fn column_name(&self, index: usize) -> &str {
        self.columns()[index].name()
    }

    fn column_type(&self, index: usize) -> ColumnType {
        column_type_of(self.columns()[index].type_())
    }

    fn value(&self, index: usize) -> BuddyResult<Value> {
        match self.column_type(index) {
            ColumnType::Bool => get::<bool, _>(self, index, Value::Bool),
            ColumnType::SmallInt => get::<i16, _>(self, index, Value::SmallInt),
            ColumnType::Int => get::<i32, _>(self, index, Value::Int),
            ColumnType::BigInt => get::<i64, _>(self, index, Value::BigInt),
            ColumnType::Real => get::<f32, _>(self, index, Value::Real),
            ColumnType::Double => get::<f64, _>(self, index, Value::Double),
            ColumnType::Text if matches!(self.columns()[index].type_().kind(), Kind::Enum(_)) => {
                get::<RawBytes, _>(self, index, |raw| {
                    Value::Text(String::from_utf8_lossy(&raw.0).into_owned())
                })
            }
            ColumnType::Text => get::<String, _>(self, index, Value::Text),
            ColumnType::Bytes => get::<Vec<u8>, _>(self, index, Value::Bytes),
            ColumnType::Json => get::<serde_json::Value, _>(self, index, Value::Json),
            ColumnType::Date => get::<NaiveDate, _>(self, index, Value::Date),
            ColumnType::Time => get::<NaiveTime, _>(self, index, Value::Time),
            ColumnType::Timestamp => get::<NaiveDateTime, _>(self, index, Value::Timestamp),
            ColumnType::TimestampTz => get::<DateTime<Utc>, _>(self, index, Value::TimestampTz),
            ColumnType::Uuid => get::<Uuid, _>(self, index, Value::Uuid),
            ColumnType::Numeric => get::<Decimal, _>(self, index, decimal_value),
            ColumnType::Other => get::<RawBytes, _>(self, index, |raw| Value::Bytes(raw.0)),
        }
    }
}

/// `numeric` keeps its exact digits as text; the number adapters parse it
/// into whatever numeric field it is mapped to.
fn decimal_value(decimal: Decimal) -> Value {
    Value::Text(decimal.to_string())
}

/// Rewrite `?` placeholders as `$1, $2, ...`.
///
/// Quoted text, dollar-quoted bodies and comments are copied unchanged.
pub(crate) fn number_placeholders(sql: &str) -> Cow<'_, str> {
    if !sql.contains('?') {
        return Cow::Borrowed(sql);
    }
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0;
    let mut rest = sql;
    while let Some(c) = rest.chars().next() {
        let skip = match c {
            '\'' | '"' => rest[1..].find(c).map_or(rest.len(), |i| i + 2),
            '-' if rest.starts_with("--") => rest.find('\n').map_or(rest.len(), |i| i + 1),
            '/' if rest.starts_with("/*") => rest[2..].find("*/").map_or(rest.len(), |i| i + 4),
            '$' => dollar_quoted_len(rest).unwrap_or(1),
            '?' => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
                1
            }
            _ => c.len_utf8(),
        };
        if c != '?' {
            out.push_str(&rest[..skip]);
        }
        rest = &rest[skip..];
    }
    Cow::Owned(out)
}

/// Length of a `$tag$ ... $tag$` body at the start of `sql`, if one starts there.
fn dollar_quoted_len(sql: &str) -> Option<usize> {
    let close = sql[1..].find('$')? + 2;
    let tag = &sql[..close];
    let name = &tag[1..close - 1];
    let valid = name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if !valid {
        return None;
    }
    Some(sql[close..].find(tag).map_or(sql.len(), |i| close + i + tag.len()))
}

fn bind(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

/// `COPY ... FROM STDIN` sink over a Postgres connection.
pub struct PgCopySink {
    inner: Pin<Box<CopyInSink<Bytes>>>,
}

impl CopySink for PgCopySink {
    async fn write(&mut self, data: Bytes) -> BuddyResult<()> {
        self.inner.feed(data).await?;
        Ok(())
    }

    async fn flush(&mut self) -> BuddyResult<()> {
        SinkExt::flush(&mut self.inner).await?;
        Ok(())
    }

    async fn close(mut self) -> BuddyResult<u64> {
        Ok(self.inner.as_mut().finish().await?)
    }
}

macro_rules! pg_executor {
    ($($client:ty),* $(,)?) => {$(
        impl SqlExecutor for $client {
            type Row = Row;
            type Sink = PgCopySink;

            fn product_name(&self) -> &str {
                "PostgreSQL"
            }

            async fn execute(&self, sql: &str, params: &[Value]) -> BuddyResult<u64> {
                let sql = number_placeholders(sql);
                let params = bind(params);
                Ok(<$client>::execute(self, &*sql, &params).await?)
            }

            async fn query(&self, sql: &str, params: &[Value]) -> BuddyResult<Vec<Row>> {
                let sql = number_placeholders(sql);
                let params = bind(params);
                Ok(<$client>::query(self, &*sql, &params).await?)
            }

            async fn query_stream(&self, sql: &str, params: &[Value]) -> BuddyResult<RowStream<Row>> {
                let sql = number_placeholders(sql);
                let params = bind(params);
                let stream = <$client>::query_raw(self, &*sql, params.iter().copied()).await?;
                Ok(RowStream::new(stream.map_err(BuddyError::from)))
            }

            async fn execute_returning_keys(
                &self,
                sql: &str,
                params: &[Value],
                columns: &[String],
            ) -> BuddyResult<Vec<Row>> {
                let sql = format!("{} RETURNING {}", number_placeholders(sql), columns.join(", "));
                let params = bind(params);
                Ok(<$client>::query(self, sql.as_str(), &params).await?)
            }

            async fn copy_in(&self, statement: &str) -> BuddyResult<PgCopySink> {
                let sink = <$client>::copy_in::<_, Bytes>(self, statement).await?;
                Ok(PgCopySink { inner: Box::pin(sink) })
            }
        }
    )*};
}

pg_executor!(tokio_postgres::Client, tokio_postgres::Transaction<'_>);

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl SqlExecutor for deadpool_postgres::Client {
    type Row = Row;
    type Sink = PgCopySink;

    fn product_name(&self) -> &str {
        "PostgreSQL"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> BuddyResult<u64> {
        let client: &tokio_postgres::Client = self;
        SqlExecutor::execute(client, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> BuddyResult<Vec<Row>> {
        let client: &tokio_postgres::Client = self;
        SqlExecutor::query(client, sql, params).await
    }

    async fn query_stream(&self, sql: &str, params: &[Value]) -> BuddyResult<RowStream<Row>> {
        let client: &tokio_postgres::Client = self;
        SqlExecutor::query_stream(client, sql, params).await
    }

    async fn execute_returning_keys(
        &self,
        sql: &str,
        params: &[Value],
        columns: &[String],
    ) -> BuddyResult<Vec<Row>> {
        let client: &tokio_postgres::Client = self;
        SqlExecutor::execute_returning_keys(client, sql, params, columns).await
    }

    async fn copy_in(&self, statement: &str) -> BuddyResult<PgCopySink> {
        let client: &tokio_postgres::Client = self;
        SqlExecutor::copy_in(client, statement).await
    }
}
