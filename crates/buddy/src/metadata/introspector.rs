use super::{Entity, EntityDescriptor, FieldDescriptor, FieldMeta, TableInfo};
use crate::value::DataType;
use heck::ToSnakeCase;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// One mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDetails {
    /// Rust field name
    pub field: &'static str,
    /// SQL column name
    pub name: String,
    pub data_type: DataType,
    pub insertable: bool,
    pub updatable: bool,
    pub generated: bool,
    pub id: bool,
}

impl ColumnDetails {
    fn build(field: &FieldDescriptor, meta: FieldMeta) -> Self {
        let default_name = || field.name.to_snake_case();
        let (name, insertable, updatable) = match meta.column {
            Some(column) => (
                if column.name.trim().is_empty() {
                    default_name()
                } else {
                    column.name.to_string()
                },
                !meta.generated && column.insertable,
                !(meta.id || meta.generated) && column.updatable,
            ),
            None => (default_name(), !meta.generated, !(meta.id || meta.generated)),
        };
        Self {
            field: field.name,
            name,
            data_type: field.data_type,
            insertable,
            updatable,
            generated: meta.generated,
            id: meta.id,
        }
    }
}

/// Derived table metadata for one entity type.
#[derive(Debug, Clone)]
pub struct TableDetails {
    name: String,
    type_name: &'static str,
    columns: Vec<ColumnDetails>,
    id_column: Option<usize>,
}

impl TableDetails {
    /// Analyze a descriptor. Pure; callers normally go through [`Introspector::analyze`].
    pub fn from_descriptor(descriptor: &EntityDescriptor) -> Self {
        let name = match descriptor.table {
            Some(table) if !table.trim().is_empty() => table.to_string(),
            _ => descriptor.type_name.to_snake_case(),
        };

        let accessors: HashMap<String, FieldMeta> = descriptor
            .accessors
            .iter()
            .filter_map(|a| accessor_field_name(a.name).map(|field| (field, a.meta)))
            .collect();

        let columns: Vec<ColumnDetails> = descriptor
            .fields
            .iter()
            .filter(|f| !f.transient)
            .map(|f| {
                // First annotated source wins: the field, then its accessor.
                let meta = [Some(f.meta), accessors.get(f.name).copied()]
                    .into_iter()
                    .flatten()
                    .find(FieldMeta::is_annotated)
                    .unwrap_or_default();
                ColumnDetails::build(f, meta)
            })
            .collect();

        let id_column = columns.iter().position(|c| c.id);

        Self {
            name,
            type_name: descriptor.type_name,
            columns,
            id_column,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Non-transient columns in declaration order.
    pub fn columns(&self) -> &[ColumnDetails] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDetails> {
        self.columns.get(index)
    }

    /// Index of a column by Rust field name, falling back to the SQL name.
    pub fn column_index(&self, field: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.field == field)
            .or_else(|| self.columns.iter().position(|c| c.name == field))
    }

    pub fn id_index(&self) -> Option<usize> {
        self.id_column
    }

    pub fn id_column(&self) -> Option<&ColumnDetails> {
        self.id_column.map(|i| &self.columns[i])
    }

    pub fn insertable_columns(&self) -> impl Iterator<Item = &ColumnDetails> {
        self.columns.iter().filter(|c| c.insertable)
    }

    pub fn updatable_columns(&self) -> impl Iterator<Item = &ColumnDetails> {
        self.columns.iter().filter(|c| c.updatable)
    }
}

/// `getFirstName` / `get_first_name` -> `firstName` / `first_name`; `isActive` -> `active`.
fn accessor_field_name(method: &str) -> Option<String> {
    let rest = method
        .strip_prefix("get")
        .or_else(|| method.strip_prefix("is"))?;
    let rest = rest.trim_start_matches('_');
    let mut chars = rest.chars();
    let first = chars.next()?;
    Some(first.to_lowercase().chain(chars).collect())
}

/// Registry of analyzed entity types.
///
/// Each type is analyzed at most once per registry and shared afterwards.
/// Concurrent first use may compute the details twice; the first stored value
/// wins and every caller sees that one.
#[derive(Debug, Default)]
pub struct Introspector {
    cache: RwLock<HashMap<TypeId, Arc<TableDetails>>>,
}

impl Introspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table details of `E`, computed on first use.
    pub fn analyze<E: Entity>(&self) -> Arc<TableDetails> {
        let key = TypeId::of::<E>();
        if let Some(details) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(details);
        }

        let computed = Arc::new(TableDetails::from_descriptor(&E::descriptor()));
        tracing::trace!(
            target: "buddy.introspect",
            entity = computed.type_name(),
            table = computed.name(),
            columns = computed.columns().len(),
            "analyzed entity"
        );

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(key).or_insert(computed))
    }

    /// A new occurrence of `E`'s table with a fresh alias.
    pub fn table<E: Entity>(&self) -> TableInfo<E> {
        TableInfo::new(self.analyze::<E>())
    }

    /// Number of analyzed types.
    pub fn len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
