use super::update::write_where;
use super::{Context, Statement};
use crate::error::BuddyResult;
use crate::executor::QueryKind;
use crate::expr::QueryPart;
use crate::metadata::TableInfo;
use crate::predicate::Predicate;
use crate::value::Value;
use std::fmt;

/// DELETE builder. Without conditions every row of the table is deleted.
pub struct Delete<E> {
    ctx: Context,
    table: TableInfo<E>,
    predicates: Vec<Predicate>,
}

impl<E> Clone for Delete<E> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            table: self.table.clone(),
            predicates: self.predicates.clone(),
        }
    }
}

impl<E> fmt::Debug for Delete<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delete")
            .field("sql", &self.to_sql())
            .finish()
    }
}

impl<E> Delete<E> {
    pub fn new(ctx: Context, table: TableInfo<E>) -> Self {
        Self {
            ctx,
            table,
            predicates: Vec::new(),
        }
    }

    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

impl<E> Statement for Delete<E> {
    fn kind(&self) -> QueryKind {
        QueryKind::Delete
    }

    fn context(&self) -> &Context {
        &self.ctx
    }

    fn to_sql(&self) -> BuddyResult<String> {
        let mut sql = format!("DELETE FROM {} {}", self.table.name(), self.table.alias());
        write_where(&mut sql, &self.predicates);
        Ok(sql)
    }

    fn collect_parameters(&self) -> Vec<Value> {
        let mut out = Vec::new();
        for predicate in &self.predicates {
            predicate.collect_values(&mut out);
        }
        out
    }
}
