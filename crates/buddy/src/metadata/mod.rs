//! Entity metadata: static type descriptors, the introspector that turns them
//! into table details, and the per-statement table/field handles.
//!
//! Types normally get their descriptor from `#[derive(Entity)]`:
//!
//! ```ignore
//! #[derive(Entity)]
//! #[buddy(table = "people")]
//! struct Person {
//!     #[buddy(id, generated)]
//!     id: Option<i64>,
//!     first_name: String,
//!     #[buddy(column = "years", updatable = false)]
//!     age: i32,
//!     #[buddy(transient)]
//!     scratch: String,
//! }
//! ```

mod introspector;
mod table;

pub use introspector::{ColumnDetails, Introspector, TableDetails};
pub use table::{TableField, TableInfo, TableRef};

use crate::error::BuddyResult;
use crate::value::{DataType, SqlType, Value};

/// A Rust type mapped to a table.
pub trait Entity: Sized + Send + 'static {
    /// Static shape of the type: fields in declaration order plus annotations.
    fn descriptor() -> EntityDescriptor;

    /// How the row mapper builds instances.
    fn constructor() -> Constructor<Self> {
        Constructor::Missing
    }

    /// Current value of a (Rust) field, `None` for unknown fields.
    fn field_value(&self, field: &str) -> Option<Value>;
}

/// Construction strategy for an entity, in order of preference.
pub enum Constructor<E> {
    /// Build from every non-transient field value in declaration order.
    /// Missing columns are passed as [`Value::Null`].
    AllArgs(fn(Vec<Value>) -> BuddyResult<E>),
    /// Default-construct, then assign each non-null column value by field name.
    FieldAssign {
        new: fn() -> E,
        assign: fn(&mut E, &str, Value) -> BuddyResult<()>,
    },
    /// The type cannot be built from rows.
    Missing,
}

/// Static description of an entity type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub type_name: &'static str,
    /// Explicit table name; blank or `None` derives it from `type_name`.
    pub table: Option<&'static str>,
    pub fields: Vec<FieldDescriptor>,
    /// Accessor methods (`getX` / `isX`) that may carry annotations for field `x`.
    pub accessors: Vec<AccessorDescriptor>,
}

impl EntityDescriptor {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            table: None,
            fields: Vec::new(),
            accessors: Vec::new(),
        }
    }

    pub fn table(mut self, name: &'static str) -> Self {
        self.table = Some(name);
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn accessor(mut self, name: &'static str, meta: FieldMeta) -> Self {
        self.accessors.push(AccessorDescriptor { name, meta });
        self
    }
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub data_type: DataType,
    pub transient: bool,
    pub meta: FieldMeta,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            transient: false,
            meta: FieldMeta::default(),
        }
    }

    /// Field whose declared type is `T`.
    pub fn of<T: SqlType>(name: &'static str) -> Self {
        Self::new(name, T::data_type())
    }

    pub fn id(mut self) -> Self {
        self.meta.id = true;
        self
    }

    pub fn generated(mut self) -> Self {
        self.meta.generated = true;
        self
    }

    pub fn column(mut self, column: ColumnOverride) -> Self {
        self.meta.column = Some(column);
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct AccessorDescriptor {
    pub name: &'static str,
    pub meta: FieldMeta,
}

/// Annotations that can sit on a field or its accessor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldMeta {
    pub id: bool,
    pub generated: bool,
    pub column: Option<ColumnOverride>,
}

impl FieldMeta {
    pub fn is_annotated(&self) -> bool {
        self.id || self.generated || self.column.is_some()
    }
}

/// Column name / writability override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnOverride {
    /// Blank means "derive from the field name".
    pub name: &'static str,
    pub insertable: bool,
    pub updatable: bool,
}

impl ColumnOverride {
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            insertable: true,
            updatable: true,
        }
    }

    pub fn insertable(mut self, insertable: bool) -> Self {
        self.insertable = insertable;
        self
    }

    pub fn updatable(mut self, updatable: bool) -> Self {
        self.updatable = updatable;
        self
    }
}
