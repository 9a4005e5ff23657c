//! Entry point: an executor plus the dialect, registry and configuration
//! every statement shares.

use crate::builder::{Context, Delete, Insert, Select, Update};
use crate::config::DatabaseConfig;
use crate::copy::CopyIn;
use crate::dialect::{self, Dialect};
use crate::error::BuddyResult;
use crate::executor::{QueryKind, RowStream, SqlExecutor};
use crate::expr::{Expr, Expression, IntoExpr, count};
use crate::metadata::{Entity, Introspector, TableInfo};
use crate::record::Record;
use crate::result::QueryResult;
use crate::value::Value;
use futures_core::Stream;
use std::future::Future;
use std::sync::Arc;

/// A database handle.
///
/// The dialect is picked from the executor's product name unless the
/// configuration forces one. `Database` is itself an executor, so statements
/// built from it can run against it directly:
///
/// ```ignore
/// let db = Database::new(client);
/// let person = db.table::<Person>();
/// let ann: Person = db.by_id(&person, 1i64)?.fetch_single_into(&db).await?;
/// ```
pub struct Database<X> {
    executor: X,
    ctx: Context,
}

impl<X: SqlExecutor> Database<X> {
    pub fn new(executor: X) -> Self {
        Self::with_config(executor, DatabaseConfig::default())
    }

    pub fn with_config(executor: X, config: DatabaseConfig) -> Self {
        let dialect = dialect::of(
            config
                .dialect
                .as_deref()
                .unwrap_or_else(|| executor.product_name()),
        );
        tracing::debug!(target: "buddy.sql", dialect = dialect.name(), "database opened");
        let ctx = Context::new(dialect, Arc::new(Introspector::new()), Arc::new(config));
        Self { executor, ctx }
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn into_inner(self) -> X {
        self.executor
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        self.ctx.dialect()
    }

    /// A new occurrence of `E`'s table with a fresh alias.
    pub fn table<E: Entity>(&self) -> TableInfo<E> {
        self.ctx.introspector().table()
    }

    /// Run raw SQL (`?` placeholders) and return the affected row count.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> BuddyResult<u64> {
        self.ctx
            .run_execute(&self.executor, QueryKind::Raw, sql, params)
            .await
    }

    /// Run a raw query (`?` placeholders).
    pub async fn fetch(&self, sql: &str, params: &[Value]) -> BuddyResult<QueryResult<Record>> {
        self.ctx
            .run_query(&self.executor, QueryKind::Raw, sql, params)
            .await
    }

    pub fn insert_into<E>(&self, table: &TableInfo<E>) -> Insert<E> {
        Insert::new(self.ctx.clone(), table.clone())
    }

    /// `SELECT <alias>.* FROM <table>`, converting rows into `E`.
    pub fn select_from<E>(&self, table: &TableInfo<E>) -> Select<E> {
        Select::from_table(self.ctx.clone(), Vec::new(), table)
    }

    /// `SELECT count(*) FROM <table>`
    pub fn select_count<E>(&self, table: &TableInfo<E>) -> Select<i64> {
        Select::from_table(self.ctx.clone(), vec![count()], table)
    }

    /// Select of arbitrary expressions, fetched as [`Record`]s.
    pub fn select<I>(&self, projection: I) -> Select<Record>
    where
        I: IntoIterator,
        I::Item: IntoExpr,
    {
        self.select_for(projection)
    }

    /// Select of arbitrary expressions converting rows into `R`.
    pub fn select_for<R, I>(&self, projection: I) -> Select<R>
    where
        I: IntoIterator,
        I::Item: IntoExpr,
    {
        let projection: Vec<Expr> = projection.into_iter().map(IntoExpr::into_expr).collect();
        Select::new(self.ctx.clone(), projection)
    }

    pub fn update<E>(&self, table: &TableInfo<E>) -> Update<E> {
        Update::new(self.ctx.clone(), table.clone())
    }

    pub fn delete_from<E>(&self, table: &TableInfo<E>) -> Delete<E> {
        Delete::new(self.ctx.clone(), table.clone())
    }

    /// Select the row whose id equals `id`.
    pub fn by_id<E>(&self, table: &TableInfo<E>, id: impl IntoExpr) -> BuddyResult<Select<E>> {
        let id_column = table.id_column()?;
        self.select_from(table).where_(id_column.eq(id))
    }

    pub fn delete_by_id<E>(&self, table: &TableInfo<E>, id: impl IntoExpr) -> BuddyResult<Delete<E>> {
        let id_column = table.id_column()?;
        Ok(self.delete_from(table).where_(id_column.eq(id)))
    }

    /// Delete `entity` by its id.
    pub fn delete_entity<E: Entity>(&self, entity: &E) -> BuddyResult<Delete<E>> {
        let table = self.table::<E>();
        let id_column = table.id_column()?;
        let id = id_column.value_of(entity);
        Ok(self.delete_from(&table).where_(id_column.eq(id)))
    }

    /// Write every updatable column of `entity`, matched by id.
    pub fn update_entity<E: Entity>(&self, entity: &E) -> BuddyResult<Update<E>> {
        let table = self.table::<E>();
        let id_column = table.id_column()?;
        let mut update = self.update(&table);
        for column in table.updatable_columns() {
            let value = column.value_of(entity);
            update = update.set(&column, value)?;
        }
        let id = id_column.value_of(entity);
        Ok(update.where_(id_column.eq(id)))
    }

    /// Insert every insertable column of `entity`.
    ///
    /// Add `.returning()` and fetch into `E` to read generated values back.
    pub fn persist<E: Entity>(&self, entity: &E) -> BuddyResult<Insert<E>> {
        let table = self.table::<E>();
        let mut insert = self.insert_into(&table);
        for column in table.insertable_columns() {
            let value = column.value_of(entity);
            insert = insert.set(&column, value)?;
        }
        Ok(insert)
    }

    /// Multi-row insert of `entities` over their insertable columns.
    pub fn persist_many<'a, E, I>(&self, entities: I) -> BuddyResult<Insert<E>>
    where
        E: Entity,
        I: IntoIterator<Item = &'a E>,
    {
        let table = self.table::<E>();
        let columns = table.insertable_columns();
        let mut insert = self.insert_into(&table).columns(columns.clone())?;
        for entity in entities {
            insert = insert.values(columns.iter().map(|c| c.value_of(entity)))?;
        }
        Ok(insert)
    }

    /// Bulk-load `entities` through `COPY ... FROM STDIN` (CSV).
    pub async fn copy_in<E, S>(&self, entities: S) -> BuddyResult<u64>
    where
        E: Entity,
        S: Stream<Item = E> + Send,
    {
        CopyIn::new(self.ctx.clone(), self.table::<E>())
            .execute(&self.executor, entities)
            .await
    }
}

impl<X: SqlExecutor> SqlExecutor for Database<X> {
    type Row = X::Row;
    type Sink = X::Sink;

    fn product_name(&self) -> &str {
        self.executor.product_name()
    }

    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = BuddyResult<u64>> + Send {
        self.executor.execute(sql, params)
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = BuddyResult<Vec<Self::Row>>> + Send {
        self.executor.query(sql, params)
    }

    fn query_stream(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = BuddyResult<RowStream<Self::Row>>> + Send {
        self.executor.query_stream(sql, params)
    }

    fn execute_returning_keys(
        &self,
        sql: &str,
        params: &[Value],
        columns: &[String],
    ) -> impl Future<Output = BuddyResult<Vec<Self::Row>>> + Send {
        self.executor.execute_returning_keys(sql, params, columns)
    }

    fn copy_in(&self, statement: &str) -> impl Future<Output = BuddyResult<Self::Sink>> + Send {
        self.executor.copy_in(statement)
    }
}
