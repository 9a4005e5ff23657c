use super::{Context, Statement};
use crate::error::{BuddyResult, ensure};
use crate::executor::QueryKind;
use crate::expr::QueryPart;
use crate::metadata::{TableField, TableInfo};
use crate::predicate::Predicate;
use crate::value::Value;
use std::fmt;

/// UPDATE builder: `set` pairs first, then conditions.
pub struct Update<E> {
    ctx: Context,
    table: TableInfo<E>,
    columns: Vec<TableField<E>>,
    values: Vec<Value>,
    predicates: Vec<Predicate>,
}

impl<E> Clone for Update<E> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            table: self.table.clone(),
            columns: self.columns.clone(),
            values: self.values.clone(),
            predicates: self.predicates.clone(),
        }
    }
}

impl<E> fmt::Debug for Update<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Update")
            .field("sql", &self.to_sql())
            .field("params", &self.values)
            .finish()
    }
}

impl<E> Update<E> {
    pub fn new(ctx: Context, table: TableInfo<E>) -> Self {
        Self {
            ctx,
            table,
            columns: Vec::new(),
            values: Vec::new(),
            predicates: Vec::new(),
        }
    }

    pub fn set(mut self, field: &TableField<E>, value: impl Into<Value>) -> BuddyResult<Self> {
        ensure!(self.predicates.is_empty(), "Cannot use set after where");
        self.columns.push(field.clone());
        self.values.push(value.into());
        Ok(self)
    }

    /// Add a condition; repeated calls are AND-ed.
    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

impl<E> Statement for Update<E> {
    fn kind(&self) -> QueryKind {
        QueryKind::Update
    }

    fn context(&self) -> &Context {
        &self.ctx
    }

    fn to_sql(&self) -> BuddyResult<String> {
        ensure!(
            !self.columns.is_empty(),
            "You need to specify at least one column to update"
        );
        let mut sql = format!("UPDATE {} {} SET ", self.table.name(), self.table.alias());
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(column.name());
            sql.push_str("=?");
        }
        write_where(&mut sql, &self.predicates);
        Ok(sql)
    }

    fn collect_parameters(&self) -> Vec<Value> {
        let mut out = self.values.clone();
        for predicate in &self.predicates {
            predicate.collect_values(&mut out);
        }
        out
    }
}

/// ` WHERE p1 AND p2`, nothing when there are no predicates.
pub(super) fn write_where(sql: &mut String, predicates: &[Predicate]) {
    for (i, predicate) in predicates.iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        predicate.write_sql(sql, true);
    }
}
