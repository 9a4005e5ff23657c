//! Executor boundary: the database client abstraction statements run against.
//!
//! Statements render SQL with `?` placeholders and hand it to a
//! [`SqlExecutor`] together with the bind values in placeholder order.
//! Implementations exist for `tokio_postgres::Client` and `Transaction`
//! (and pooled clients behind the `pool` feature).

mod pg;

pub use pg::PgCopySink;

use crate::error::{BuddyError, BuddyResult};
use crate::value::Value;
use bytes::Bytes;
use futures_core::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Type family of a result column, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
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
    /// Arbitrary-precision decimal (`numeric`).
    Numeric,
    /// Anything the driver has no native mapping for.
    Other,
}

/// Positional access to one result row.
pub trait RawRow: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn column_name(&self, index: usize) -> &str;

    fn column_type(&self, index: usize) -> ColumnType;

    fn value(&self, index: usize) -> BuddyResult<Value>;
}

/// A stream of raw rows.
#[must_use]
pub struct RowStream<R> {
    inner: Pin<Box<dyn Stream<Item = BuddyResult<R>> + Send>>,
}

impl<R> RowStream<R> {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = BuddyResult<R>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Stream over rows that are already in memory.
    pub fn buffered(rows: Vec<R>) -> Self
    where
        R: Send + 'static,
    {
        Self::new(futures_util::stream::iter(rows.into_iter().map(Ok)))
    }
}

impl<R> Stream for RowStream<R> {
    type Item = BuddyResult<R>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Receiving end of a bulk `COPY ... FROM STDIN`.
pub trait CopySink: Send {
    fn write(&mut self, data: Bytes) -> impl Future<Output = BuddyResult<()>> + Send;

    fn flush(&mut self) -> impl Future<Output = BuddyResult<()>> + Send;

    /// Finish the copy and return the number of rows the server accepted.
    fn close(self) -> impl Future<Output = BuddyResult<u64>> + Send;
}

/// Sink type for executors without bulk copy support.
#[derive(Debug)]
pub enum NoCopy {}

impl CopySink for NoCopy {
    async fn write(&mut self, _data: Bytes) -> BuddyResult<()> {
        match *self {}
    }

    async fn flush(&mut self) -> BuddyResult<()> {
        match *self {}
    }

    async fn close(self) -> BuddyResult<u64> {
        match self {}
    }
}

/// A database client statements can run against.
///
/// SQL handed to an executor uses `?` placeholders; `params` holds one value
/// per placeholder in textual order.
pub trait SqlExecutor: Send + Sync {
    type Row: RawRow + 'static;
    type Sink: CopySink;

    /// Product name used to pick a dialect (`"PostgreSQL"`, `"H2"`, ...).
    fn product_name(&self) -> &str;

    /// Run a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = BuddyResult<u64>> + Send;

    /// Run a query and return every row.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = BuddyResult<Vec<Self::Row>>> + Send;

    /// Run a query and stream its rows.
    ///
    /// The default implementation buffers the result of [`SqlExecutor::query`].
    fn query_stream(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = BuddyResult<RowStream<Self::Row>>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            Ok(RowStream::buffered(rows))
        }
    }

    /// Run an insert and return the generated values of `columns`, one row per
    /// inserted record.
    fn execute_returning_keys(
        &self,
        sql: &str,
        params: &[Value],
        columns: &[String],
    ) -> impl Future<Output = BuddyResult<Vec<Self::Row>>> + Send {
        let _ = (sql, params, columns);
        async {
            Err(BuddyError::unsupported(
                "generated keys are not supported by this executor",
            ))
        }
    }

    /// Open a bulk copy for `statement` (`COPY ... FROM STDIN ...`).
    fn copy_in(&self, statement: &str) -> impl Future<Output = BuddyResult<Self::Sink>> + Send {
        let _ = statement;
        async { Err(BuddyError::unsupported("COPY is not supported by this executor")) }
    }
}

impl<X: SqlExecutor> SqlExecutor for &X {
    type Row = X::Row;
    type Sink = X::Sink;

    fn product_name(&self) -> &str {
        (*self).product_name()
    }

    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = BuddyResult<u64>> + Send {
        (*self).execute(sql, params)
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = BuddyResult<Vec<Self::Row>>> + Send {
        (*self).query(sql, params)
    }

    fn query_stream(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = BuddyResult<RowStream<Self::Row>>> + Send {
        (*self).query_stream(sql, params)
    }

    fn execute_returning_keys(
        &self,
        sql: &str,
        params: &[Value],
        columns: &[String],
    ) -> impl Future<Output = BuddyResult<Vec<Self::Row>>> + Send {
        (*self).execute_returning_keys(sql, params, columns)
    }

    fn copy_in(&self, statement: &str) -> impl Future<Output = BuddyResult<Self::Sink>> + Send {
        (*self).copy_in(statement)
    }
}

/// Statement kind, used as a logging field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
    Copy,
    Raw,
}

/// Cut `sql` to at most `max_bytes`, on a char boundary.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Emit the statement about to run on the `buddy.sql` target.
pub(crate) fn log_sql(kind: QueryKind, sql: &str, param_count: usize, max_len: Option<usize>) {
    match max_len {
        Some(max) if sql.len() > max => {
            let sql = format!("{}...", truncate_sql_bytes(sql, max));
            tracing::debug!(target: "buddy.sql", kind = ?kind, param_count, sql = %sql);
        }
        _ => tracing::debug!(target: "buddy.sql", kind = ?kind, param_count, sql = %sql),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("SELECT 1", 6), "SELECT");
        // 'é' is two bytes; cutting in the middle backs off
        assert_eq!(truncate_sql_bytes("ééé", 3), "é");
    }
}
