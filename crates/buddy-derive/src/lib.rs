//! Derive macros for buddy
//!
//! Provides `#[derive(Entity)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod entity;

/// Derive `Entity` (and `FromRecord`) for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use buddy::Entity;
///
/// #[derive(Entity)]
/// #[buddy(table = "people")]
/// struct Person {
///     #[buddy(id, generated)]
///     id: Option<i64>,
///     first_name: String,
///     #[buddy(column = "years", updatable = false)]
///     age: i32,
///     #[buddy(transient)]
///     scratch: Vec<String>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[buddy(table = "name")]` - Table name (defaults to the snake_case type name)
/// - `#[buddy(id)]` - Id column
/// - `#[buddy(generated)]` - Database-generated; never inserted or updated
/// - `#[buddy(transient)]` - Not mapped; rebuilt with `Default`
/// - `#[buddy(column = "name", insertable = false, updatable = false)]` - Column
///   name and writability overrides
///
/// Every mapped field type must implement `SqlType`, `FromValue` and
/// `Clone + Into<Value>`.
#[proc_macro_derive(Entity, attributes(buddy))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
