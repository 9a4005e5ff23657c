//! Statement builders.
//!
//! Each builder is a single-use value that accumulates clauses in a fixed
//! phase order and fails immediately with [`BuddyError::Builder`] on an
//! illegal transition. Rendering produces SQL with `?` placeholders (or the
//! dialect's typed placeholders for inserts) plus the bind values in the same
//! order.
//!
//! ```ignore
//! let person = db.table::<Person>();
//! let name = person.column("name")?;
//!
//! let adults = db
//!     .select_from(&person)
//!     .where_(person.column("age")?.greater_or_equal(18))?
//!     .order_by(name.asc())?
//!     .fetch_into(&db)
//!     .await?
//!     .to_list()
//!     .await?;
//! ```

mod delete;
mod insert;
mod select;
mod update;

pub use delete::Delete;
pub use insert::Insert;
pub use select::{JoinKind, Select};
pub use update::Update;

use crate::config::{DatabaseConfig, FetchMode};
use crate::dialect::Dialect;
use crate::error::{BuddyError, BuddyResult};
use crate::executor::{QueryKind, RawRow, RowStream, SqlExecutor, log_sql};
use crate::metadata::Introspector;
use crate::record::{FromRecord, Record, RecordMapper};
use crate::result::QueryResult;
use crate::value::Value;
use futures_util::StreamExt;
use std::future::Future;
use std::sync::Arc;

/// Everything a builder needs besides its own clauses.
#[derive(Debug, Clone)]
pub struct Context {
    pub(crate) dialect: Arc<dyn Dialect>,
    pub(crate) introspector: Arc<Introspector>,
    pub(crate) config: Arc<DatabaseConfig>,
}

impl Context {
    pub fn new(
        dialect: Arc<dyn Dialect>,
        introspector: Arc<Introspector>,
        config: Arc<DatabaseConfig>,
    ) -> Self {
        Self {
            dialect,
            introspector,
            config,
        }
    }

    /// Context with the given dialect, a fresh registry and default configuration.
    pub fn with_dialect(dialect: Arc<dyn Dialect>) -> Self {
        Self::new(
            dialect,
            Arc::new(Introspector::new()),
            Arc::new(DatabaseConfig::default()),
        )
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    pub fn introspector(&self) -> &Arc<Introspector> {
        &self.introspector
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn record_mapper(&self) -> RecordMapper {
        RecordMapper::new(Arc::clone(&self.dialect), Arc::clone(&self.introspector))
    }

    fn log(&self, kind: QueryKind, sql: &str, params: &[Value]) {
        log_sql(kind, sql, params.len(), self.config.max_sql_length);
    }

    /// Run a statement and return the affected row count.
    pub(crate) async fn run_execute<X: SqlExecutor>(
        &self,
        executor: &X,
        kind: QueryKind,
        sql: &str,
        params: &[Value],
    ) -> BuddyResult<u64> {
        self.log(kind, sql, params);
        executor.execute(sql, params).await
    }

    /// Run a query and map its rows into records, honoring the fetch mode.
    pub(crate) async fn run_query<X: SqlExecutor>(
        &self,
        executor: &X,
        kind: QueryKind,
        sql: &str,
        params: &[Value],
    ) -> BuddyResult<QueryResult<Record>> {
        self.log(kind, sql, params);
        let rows = match self.config.fetch_mode {
            FetchMode::Streaming => executor.query_stream(sql, params).await?,
            FetchMode::Buffered => RowStream::buffered(executor.query(sql, params).await?),
        };
        Ok(self.map_rows(rows))
    }

    pub(crate) fn map_rows<R: RawRow + 'static>(&self, rows: RowStream<R>) -> QueryResult<Record> {
        let mut mapper = self.record_mapper();
        QueryResult::streaming(rows.map(move |row| row.and_then(|row| mapper.map(&row))))
    }

    pub(crate) fn map_buffered<R: RawRow>(&self, rows: Vec<R>) -> BuddyResult<QueryResult<Record>> {
        let mut mapper = self.record_mapper();
        let records = rows
            .iter()
            .map(|row| mapper.map(row))
            .collect::<BuddyResult<Vec<_>>>()?;
        Ok(QueryResult::buffered(records))
    }
}

/// A renderable, executable statement.
pub trait Statement {
    fn kind(&self) -> QueryKind;

    fn context(&self) -> &Context;

    /// Render the statement. Fails when the builder is incomplete.
    fn to_sql(&self) -> BuddyResult<String>;

    /// Bind values in placeholder order.
    fn collect_parameters(&self) -> Vec<Value>;

    /// Run the statement and return the number of affected rows.
    fn execute<X: SqlExecutor>(&self, executor: &X) -> impl Future<Output = BuddyResult<u64>> + Send {
        let prepared = self.to_sql().map(|sql| (sql, self.collect_parameters()));
        let kind = self.kind();
        let ctx = self.context().clone();
        async move {
            let (sql, params) = prepared?;
            ctx.run_execute(executor, kind, &sql, &params).await
        }
    }
}

/// Statements that produce rows.
///
/// `fetch*` return generic [`Record`]s, `*_into` convert each record into the
/// statement's output type.
pub trait Fetchable: Statement {
    type Output: FromRecord + Send + 'static;

    fn fetch<X: SqlExecutor>(
        &self,
        executor: &X,
    ) -> impl Future<Output = BuddyResult<QueryResult<Record>>> + Send;

    fn fetch_into<X: SqlExecutor>(
        &self,
        executor: &X,
    ) -> impl Future<Output = BuddyResult<QueryResult<Self::Output>>> + Send {
        self.fetch_into_as::<Self::Output, X>(executor)
    }

    /// Like [`Fetchable::fetch_into`] with an explicit target type.
    fn fetch_into_as<Q, X>(
        &self,
        executor: &X,
    ) -> impl Future<Output = BuddyResult<QueryResult<Q>>> + Send
    where
        Q: FromRecord + Send + 'static,
        X: SqlExecutor,
    {
        let fetch = self.fetch(executor);
        async move { Ok(fetch.await?.try_map(|record| record.into::<Q>())) }
    }

    /// First record, if any.
    fn fetch_one<X: SqlExecutor>(
        &self,
        executor: &X,
    ) -> impl Future<Output = BuddyResult<Option<Record>>> + Send {
        let fetch = self.fetch(executor);
        async move { fetch.await?.next().await }
    }

    fn fetch_one_into<X: SqlExecutor>(
        &self,
        executor: &X,
    ) -> impl Future<Output = BuddyResult<Option<Self::Output>>> + Send {
        let fetch = self.fetch_one(executor);
        async move { fetch.await?.map(|record| record.into()).transpose() }
    }

    /// Exactly one record: [`BuddyError::NoDataFound`] on none,
    /// [`BuddyError::TooManyRows`] on more than one.
    fn fetch_single<X: SqlExecutor>(
        &self,
        executor: &X,
    ) -> impl Future<Output = BuddyResult<Record>> + Send {
        let fetch = self.fetch(executor);
        async move {
            let mut result = fetch.await?;
            let record = result.next().await?.ok_or(BuddyError::NoDataFound)?;
            if result.has_next().await {
                return Err(BuddyError::TooManyRows);
            }
            Ok(record)
        }
    }

    fn fetch_single_into<X: SqlExecutor>(
        &self,
        executor: &X,
    ) -> impl Future<Output = BuddyResult<Self::Output>> + Send {
        let fetch = self.fetch_single(executor);
        async move { fetch.await?.into() }
    }
}

#[cfg(test)]
mod tests;
