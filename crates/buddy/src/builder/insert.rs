use super::{Context, Fetchable, Select, Statement};
use crate::error::{BuddyResult, ensure};
use crate::executor::{QueryKind, SqlExecutor};
use crate::expr::{Expr, IntoExpr, QueryPart};
use crate::metadata::{TableField, TableInfo};
use crate::record::{FromRecord, Record};
use crate::result::QueryResult;
use crate::value::Value;
use std::fmt;
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conflict {
    DoNothing,
    IgnoreDuplicate,
}

/// INSERT builder.
///
/// Values come from exactly one source: `set` pairs, `columns` + `values`
/// rows, or a sub-select.
pub struct Insert<E> {
    ctx: Context,
    table: TableInfo<E>,
    columns: Vec<TableField<E>>,
    set_values: Vec<Value>,
    records: Vec<Vec<Value>>,
    sub_select: Option<(String, Vec<Value>)>,
    conflict: Option<Conflict>,
    returning: Vec<Expr>,
}

impl<E> Clone for Insert<E> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            table: self.table.clone(),
            columns: self.columns.clone(),
            set_values: self.set_values.clone(),
            records: self.records.clone(),
            sub_select: self.sub_select.clone(),
            conflict: self.conflict,
            returning: self.returning.clone(),
        }
    }
}

impl<E> fmt::Debug for Insert<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Insert")
            .field("sql", &self.to_sql())
            .field("params", &self.collect_parameters())
            .finish()
    }
}

impl<E> Insert<E> {
    pub fn new(ctx: Context, table: TableInfo<E>) -> Self {
        Self {
            ctx,
            table,
            columns: Vec::new(),
            set_values: Vec::new(),
            records: Vec::new(),
            sub_select: None,
            conflict: None,
            returning: Vec::new(),
        }
    }

    /// Add one column with its value.
    pub fn set(mut self, field: &TableField<E>, value: impl Into<Value>) -> BuddyResult<Self> {
        ensure!(
            self.sub_select.is_none(),
            "Cannot use set method when using select insert"
        );
        ensure!(
            self.records.is_empty(),
            "Cannot use set method when using multiple records"
        );
        ensure!(
            self.columns.len() == self.set_values.len(),
            "Cannot use set after calling columns"
        );
        ensure!(
            !self.columns.iter().any(|c| c.same_column(field)),
            "Cannot set same field multiple times"
        );
        self.columns.push(field.clone());
        self.set_values.push(value.into());
        Ok(self)
    }

    /// Declare the columns filled by [`Insert::values`] or [`Insert::select`].
    pub fn columns<I>(mut self, fields: I) -> BuddyResult<Self>
    where
        I: IntoIterator<Item = TableField<E>>,
    {
        ensure!(
            self.set_values.is_empty(),
            "Columns are specified automatically when you use set(Field, value)"
        );
        self.columns.extend(fields);
        Ok(self)
    }

    /// Add one row; call repeatedly for a multi-row insert.
    pub fn values<I>(mut self, row: I) -> BuddyResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        ensure!(
            self.sub_select.is_none(),
            "Cannot specify values when using select insert"
        );
        ensure!(
            self.set_values.is_empty(),
            "Cannot mix and match set(Field, value) with values"
        );
        let row: Vec<Value> = row.into_iter().map(Into::into).collect();
        ensure!(
            row.len() == self.columns.len(),
            "Specified values don't match the number of columns"
        );
        self.records.push(row);
        Ok(self)
    }

    /// Insert the rows produced by `query`.
    pub fn select<Q>(mut self, query: &Select<Q>) -> BuddyResult<Self> {
        ensure!(
            self.set_values.is_empty(),
            "Cannot use select after you've used values method"
        );
        ensure!(
            self.records.is_empty(),
            "Cannot use select after you've used set method"
        );
        let sql = query.to_sql()?;
        self.sub_select = Some((sql, query.collect_parameters()));
        Ok(self)
    }

    pub fn on_conflict_do_nothing(mut self) -> Self {
        self.conflict = Some(Conflict::DoNothing);
        self
    }

    pub fn on_duplicate_key_ignore(mut self) -> Self {
        self.conflict = Some(Conflict::IgnoreDuplicate);
        self
    }

    /// Return every column of the inserted rows.
    pub fn returning(mut self) -> Self {
        self.returning.push(Expr::Asterisk);
        self
    }

    pub fn returning_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoExpr,
    {
        self.returning
            .extend(fields.into_iter().map(IntoExpr::into_expr));
        self
    }

    fn write_row(&self, sql: &mut String) {
        sql.push('(');
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(self.ctx.dialect.placeholder_for(column.data_type()));
        }
        sql.push(')');
    }

    /// Rendered statement plus the generated-key columns to request when the
    /// dialect cannot render RETURNING.
    fn prepare_fetch(&self) -> BuddyResult<(String, Vec<Value>, Option<Vec<String>>)> {
        ensure!(
            !self.returning.is_empty(),
            "Fetch is only allowed when using returning"
        );
        let keys = if self.ctx.dialect.supports_returning() {
            None
        } else {
            Some(self.key_columns()?)
        };
        Ok((self.to_sql()?, self.collect_parameters(), keys))
    }

    /// Columns to request as generated keys when the dialect has no RETURNING.
    fn key_columns(&self) -> BuddyResult<Vec<String>> {
        if self.returning.iter().any(Expr::is_asterisk) {
            return Ok(vec![self.table.id_column()?.name().to_string()]);
        }
        Ok(self.returning.iter().map(QueryPart::to_sql).collect())
    }
}

impl<E> Statement for Insert<E> {
    fn kind(&self) -> QueryKind {
        QueryKind::Insert
    }

    fn context(&self) -> &Context {
        &self.ctx
    }

    fn to_sql(&self) -> BuddyResult<String> {
        ensure!(
            !self.columns.is_empty(),
            "You need to defined at least one column to insert"
        );
        ensure!(
            !self.set_values.is_empty() || !self.records.is_empty() || self.sub_select.is_some(),
            "Missing values to insert"
        );
        let mut sql = format!("INSERT INTO {} (", self.table.name());
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(column.name());
        }
        sql.push_str(") ");
        if let Some((select, _)) = &self.sub_select {
            sql.push_str(select);
        } else if self.records.is_empty() {
            sql.push_str("VALUES ");
            self.write_row(&mut sql);
        } else {
            sql.push_str("VALUES ");
            for i in 0..self.records.len() {
                if i > 0 {
                    sql.push_str(", ");
                }
                self.write_row(&mut sql);
            }
        }
        match self.conflict {
            Some(Conflict::DoNothing) => self.ctx.dialect.render_conflict_ignore(&mut sql),
            Some(Conflict::IgnoreDuplicate) => self.ctx.dialect.render_duplicate_ignore(&mut sql),
            None => {}
        }
        self.ctx.dialect.render_returning(&mut sql, &self.returning);
        Ok(sql)
    }

    fn collect_parameters(&self) -> Vec<Value> {
        let mut out = self.set_values.clone();
        for record in &self.records {
            out.extend(record.iter().cloned());
        }
        if let Some((_, params)) = &self.sub_select {
            out.extend(params.iter().cloned());
        }
        out
    }
}

impl<E: FromRecord + Send + 'static> Fetchable for Insert<E> {
    type Output = E;

    fn fetch<X: SqlExecutor>(
        &self,
        executor: &X,
    ) -> impl Future<Output = BuddyResult<QueryResult<Record>>> + Send {
        let prepared = self.prepare_fetch();
        let ctx = self.ctx.clone();
        async move {
            let (sql, params, keys) = prepared?;
            match keys {
                None => ctx.run_query(executor, QueryKind::Insert, &sql, &params).await,
                Some(columns) => {
                    ctx.log(QueryKind::Insert, &sql, &params);
                    let rows = executor
                        .execute_returning_keys(&sql, &params, &columns)
                        .await?;
                    ctx.map_buffered(rows)
                }
            }
        }
    }
}
