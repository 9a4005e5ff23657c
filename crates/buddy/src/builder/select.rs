use super::{Context, Fetchable, Statement};
use crate::error::{BuddyError, BuddyResult, ensure};
use crate::executor::{QueryKind, SqlExecutor};
use crate::expr::{Expr, Expression, IntoExpr, Order, QueryPart};
use crate::metadata::{TableField, TableInfo, TableRef};
use crate::predicate::Predicate;
use crate::record::{FromRecord, Record};
use crate::result::QueryResult;
use crate::value::Value;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Start,
    From,
    Join,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Offset,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Start => "SELECT",
            Phase::From => "FROM",
            Phase::Join => "JOIN",
            Phase::Where => "WHERE",
            Phase::GroupBy => "GROUP BY",
            Phase::Having => "HAVING",
            Phase::OrderBy => "ORDER BY",
            Phase::Limit => "LIMIT",
            Phase::Offset => "OFFSET",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: TableRef,
    on: Predicate,
}

/// SELECT builder.
///
/// `R` is the type [`Fetchable::fetch_into`] converts rows into.
pub struct Select<R = Record> {
    ctx: Context,
    projection: Vec<Expr>,
    root: Option<TableRef>,
    joins: Vec<Join>,
    predicates: Vec<Predicate>,
    group_by: Vec<Expr>,
    having: Vec<Predicate>,
    order_by: Vec<Order>,
    limit: Option<u64>,
    offset: Option<u64>,
    phase: Phase,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Select<R> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            projection: self.projection.clone(),
            root: self.root.clone(),
            joins: self.joins.clone(),
            predicates: self.predicates.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            phase: self.phase,
            _record: PhantomData,
        }
    }
}

impl<R> fmt::Debug for Select<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Select")
            .field("sql", &self.to_sql())
            .field("params", &self.collect_parameters())
            .finish()
    }
}

impl<R> Select<R> {
    /// A select of `projection`; an empty projection selects `<root>.*`.
    pub fn new(ctx: Context, projection: Vec<Expr>) -> Self {
        Self {
            ctx,
            projection,
            root: None,
            joins: Vec::new(),
            predicates: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            phase: Phase::Start,
            _record: PhantomData,
        }
    }

    /// A select already past its FROM clause.
    pub(crate) fn from_table<E>(ctx: Context, projection: Vec<Expr>, table: &TableInfo<E>) -> Self {
        let mut select = Self::new(ctx, projection);
        select.root = Some(table.table_ref().clone());
        select.phase = Phase::From;
        select
    }

    fn advance(&mut self, next: Phase) -> BuddyResult<()> {
        if next == Phase::From {
            ensure!(self.root.is_none(), "FROM clause has already been specified");
        } else {
            ensure!(
                self.root.is_some(),
                format!("Select requires a FROM clause before {next}")
            );
        }
        let repeated_bound = self.phase == next && matches!(next, Phase::Limit | Phase::Offset);
        ensure!(
            next >= self.phase && !repeated_bound,
            format!("Cannot use {next} after {}", self.phase)
        );
        self.phase = next;
        Ok(())
    }

    pub fn from<E>(mut self, table: &TableInfo<E>) -> BuddyResult<Self> {
        self.advance(Phase::From)?;
        self.root = Some(table.table_ref().clone());
        Ok(self)
    }

    fn add_join<E>(mut self, kind: JoinKind, table: &TableInfo<E>, on: Predicate) -> BuddyResult<Self> {
        self.advance(Phase::Join)?;
        self.joins.push(Join {
            kind,
            table: table.table_ref().clone(),
            on,
        });
        Ok(self)
    }

    /// `JOIN <table> ON <on>`
    pub fn join<E>(self, table: &TableInfo<E>, on: Predicate) -> BuddyResult<Self> {
        self.add_join(JoinKind::Inner, table, on)
    }

    pub fn left_join<E>(self, table: &TableInfo<E>, on: Predicate) -> BuddyResult<Self> {
        self.add_join(JoinKind::Left, table, on)
    }

    pub fn right_join<E>(self, table: &TableInfo<E>, on: Predicate) -> BuddyResult<Self> {
        self.add_join(JoinKind::Right, table, on)
    }

    /// Join `table` on `<root>.id = field`.
    pub fn join_on_id<E>(self, kind: JoinKind, table: &TableInfo<E>, field: &TableField<E>) -> BuddyResult<Self> {
        let on = self.root_id()?.eq(field);
        self.add_join(kind, table, on)
    }

    fn root_id(&self) -> BuddyResult<Expr> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| BuddyError::builder("Select requires a FROM clause before JOIN"))?;
        Ok(Expr::Column(root.id_ref()?))
    }

    /// Add a WHERE condition; repeated calls are AND-ed.
    pub fn where_(mut self, predicate: Predicate) -> BuddyResult<Self> {
        self.advance(Phase::Where)?;
        self.predicates.push(predicate);
        Ok(self)
    }

    pub fn group_by<I>(mut self, fields: I) -> BuddyResult<Self>
    where
        I: IntoIterator,
        I::Item: IntoExpr,
    {
        self.advance(Phase::GroupBy)?;
        self.group_by
            .extend(fields.into_iter().map(IntoExpr::into_expr));
        Ok(self)
    }

    /// Add a HAVING condition; repeated calls are AND-ed.
    pub fn having(mut self, predicate: Predicate) -> BuddyResult<Self> {
        self.advance(Phase::Having)?;
        self.having.push(predicate);
        Ok(self)
    }

    pub fn order_by(mut self, order: Order) -> BuddyResult<Self> {
        self.advance(Phase::OrderBy)?;
        self.order_by.push(order);
        Ok(self)
    }

    pub fn limit(mut self, amount: u64) -> BuddyResult<Self> {
        self.advance(Phase::Limit)?;
        self.limit = Some(amount);
        Ok(self)
    }

    pub fn offset(mut self, amount: u64) -> BuddyResult<Self> {
        self.advance(Phase::Offset)?;
        self.offset = Some(amount);
        Ok(self)
    }

    /// Same statement converting rows into `Q`.
    pub fn into_type<Q>(self) -> Select<Q> {
        Select {
            ctx: self.ctx,
            projection: self.projection,
            root: self.root,
            joins: self.joins,
            predicates: self.predicates,
            group_by: self.group_by,
            having: self.having,
            order_by: self.order_by,
            limit: self.limit,
            offset: self.offset,
            phase: self.phase,
            _record: PhantomData,
        }
    }
}

fn write_list<T: QueryPart>(sql: &mut String, parts: &[T], sep: &str) {
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            sql.push_str(sep);
        }
        part.write_sql(sql, true);
    }
}

impl<R> Statement for Select<R> {
    fn kind(&self) -> QueryKind {
        QueryKind::Select
    }

    fn context(&self) -> &Context {
        &self.ctx
    }

    fn to_sql(&self) -> BuddyResult<String> {
        let Some(root) = &self.root else {
            return Err(BuddyError::builder("Select requires a FROM clause before SELECT"));
        };
        let mut sql = String::from("SELECT ");
        if self.projection.is_empty() {
            sql.push_str(root.alias());
            sql.push_str(".*");
        } else {
            write_list(&mut sql, &self.projection, ", ");
        }
        sql.push_str(" FROM ");
        sql.push_str(root.name());
        sql.push(' ');
        sql.push_str(root.alias());

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join.kind.keyword());
            sql.push(' ');
            sql.push_str(join.table.name());
            sql.push(' ');
            sql.push_str(join.table.alias());
            sql.push_str(" ON ");
            join.on.write_sql(&mut sql, true);
        }
        if !self.predicates.is_empty() {
            sql.push_str(" WHERE ");
            write_list(&mut sql, &self.predicates, " and ");
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            write_list(&mut sql, &self.group_by, ", ");
        }
        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            write_list(&mut sql, &self.having, " and ");
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            write_list(&mut sql, &self.order_by, ", ");
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Ok(sql)
    }

    fn collect_parameters(&self) -> Vec<Value> {
        let mut out = Vec::new();
        for expr in &self.projection {
            expr.collect_values(&mut out);
        }
        for join in &self.joins {
            join.on.collect_values(&mut out);
        }
        for predicate in &self.predicates {
            predicate.collect_values(&mut out);
        }
        for expr in &self.group_by {
            expr.collect_values(&mut out);
        }
        for predicate in &self.having {
            predicate.collect_values(&mut out);
        }
        for order in &self.order_by {
            order.collect_values(&mut out);
        }
        out
    }
}

impl<R: FromRecord + Send + 'static> Fetchable for Select<R> {
    type Output = R;

    fn fetch<X: SqlExecutor>(
        &self,
        executor: &X,
    ) -> impl Future<Output = BuddyResult<QueryResult<Record>>> + Send {
        let prepared = self.to_sql().map(|sql| (sql, self.collect_parameters()));
        let ctx = self.ctx.clone();
        async move {
            let (sql, params) = prepared?;
            ctx.run_query(executor, QueryKind::Select, &sql, &params).await
        }
    }
}
