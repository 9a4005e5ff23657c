use super::{ColumnDetails, Entity, TableDetails};
use crate::error::{BuddyError, BuddyResult};
use crate::expr::{ColumnRef, Expr, Expression, IntoExpr};
use crate::value::{DataType, Value};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static ALIAS_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_alias(table: &str) -> Arc<str> {
    let n = ALIAS_COUNTER.fetch_add(1, Ordering::Relaxed);
    Arc::from(format!("{table}{n}"))
}

/// One occurrence of a table in a statement, without the entity type.
#[derive(Debug, Clone)]
pub struct TableRef {
    details: Arc<TableDetails>,
    alias: Arc<str>,
}

impl TableRef {
    pub fn name(&self) -> &str {
        self.details.name()
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn details(&self) -> &Arc<TableDetails> {
        &self.details
    }

    pub(crate) fn column_ref(&self, column: &ColumnDetails) -> ColumnRef {
        ColumnRef::new(Arc::clone(&self.alias), column.name.as_str())
    }

    pub(crate) fn id_ref(&self) -> BuddyResult<ColumnRef> {
        self.details
            .id_column()
            .map(|c| self.column_ref(c))
            .ok_or_else(|| BuddyError::MissingId(self.name().to_string()))
    }
}

/// Typed occurrence of `E`'s table: shared details plus a statement alias.
///
/// Every [`TableInfo::new`] gets a process-unique alias (`<table><n>`), so the
/// same type can appear several times in one statement.
pub struct TableInfo<E> {
    table: TableRef,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for TableInfo<E> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for TableInfo<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableInfo")
            .field("name", &self.name())
            .field("alias", &self.alias())
            .finish()
    }
}

impl<E> TableInfo<E> {
    pub fn new(details: Arc<TableDetails>) -> Self {
        let alias = next_alias(details.name());
        Self::with_table(TableRef { details, alias })
    }

    /// Occurrence with an explicit alias.
    pub fn aliased(details: Arc<TableDetails>, alias: impl Into<String>) -> Self {
        Self::with_table(TableRef {
            details,
            alias: Arc::from(alias.into()),
        })
    }

    fn with_table(table: TableRef) -> Self {
        Self {
            table,
            _entity: PhantomData,
        }
    }

    /// Same table under another alias.
    pub fn with_alias(&self, alias: impl Into<String>) -> Self {
        Self::aliased(Arc::clone(&self.table.details), alias)
    }

    /// Same table under a fresh generated alias (self-joins).
    pub fn another(&self) -> Self {
        Self::new(Arc::clone(&self.table.details))
    }

    pub fn name(&self) -> &str {
        self.table.name()
    }

    pub fn alias(&self) -> &str {
        self.table.alias()
    }

    pub fn details(&self) -> &Arc<TableDetails> {
        self.table.details()
    }

    pub fn table_ref(&self) -> &TableRef {
        &self.table
    }

    fn field_at(&self, index: usize) -> TableField<E> {
        TableField {
            table: self.table.clone(),
            index,
            _entity: PhantomData,
        }
    }

    /// Field by Rust field name (or SQL column name).
    pub fn column(&self, field: &str) -> BuddyResult<TableField<E>> {
        self.details()
            .column_index(field)
            .map(|i| self.field_at(i))
            .ok_or_else(|| BuddyError::UnknownField {
                table: self.name().to_string(),
                field: field.to_string(),
            })
    }

    pub fn id_column(&self) -> BuddyResult<TableField<E>> {
        self.details()
            .id_index()
            .map(|i| self.field_at(i))
            .ok_or_else(|| BuddyError::MissingId(self.name().to_string()))
    }

    pub fn asterisk(&self) -> Expr {
        Expr::Asterisk
    }

    pub fn fields(&self) -> Vec<TableField<E>> {
        (0..self.details().columns().len())
            .map(|i| self.field_at(i))
            .collect()
    }

    pub fn insertable_columns(&self) -> Vec<TableField<E>> {
        self.fields_where(|c| c.insertable)
    }

    pub fn updatable_columns(&self) -> Vec<TableField<E>> {
        self.fields_where(|c| c.updatable)
    }

    fn fields_where(&self, keep: impl Fn(&ColumnDetails) -> bool) -> Vec<TableField<E>> {
        self.details()
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| keep(c))
            .map(|(i, _)| self.field_at(i))
            .collect()
    }
}

/// Typed handle on one column of a table occurrence.
pub struct TableField<E> {
    table: TableRef,
    index: usize,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for TableField<E> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            index: self.index,
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for TableField<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableField({}.{})", self.table.alias(), self.name())
    }
}

impl<E> TableField<E> {
    pub fn details(&self) -> &ColumnDetails {
        &self.table.details().columns()[self.index]
    }

    /// SQL column name
    pub fn name(&self) -> &str {
        &self.details().name
    }

    /// Rust field name
    pub fn field_name(&self) -> &'static str {
        self.details().field
    }

    pub fn data_type(&self) -> DataType {
        self.details().data_type
    }

    pub fn table_alias(&self) -> &str {
        self.table.alias()
    }

    /// Whether both handles point at the same column of the same occurrence.
    pub fn same_column(&self, other: &TableField<E>) -> bool {
        self.index == other.index && self.table.alias == other.table.alias
    }

    pub fn to_expr(&self) -> Expr {
        Expr::Column(self.table.column_ref(self.details()))
    }
}

impl<E: Entity> TableField<E> {
    /// Current value of this field on `entity`.
    pub fn value_of(&self, entity: &E) -> Value {
        entity.field_value(self.field_name()).unwrap_or(Value::Null)
    }
}

impl<E> IntoExpr for TableField<E> {
    fn into_expr(self) -> Expr {
        self.to_expr()
    }
}

impl<E> IntoExpr for &TableField<E> {
    fn into_expr(self) -> Expr {
        self.to_expr()
    }
}

impl<E> Expression for TableField<E> {}
impl<E> Expression for &TableField<E> {}
