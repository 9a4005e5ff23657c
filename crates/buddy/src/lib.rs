//! # buddy
//!
//! A typed SQL statement builder with dialect-aware rendering and row mapping.
//!
//! ## Features
//!
//! - **Expression algebra**: columns, literals, functions and predicates that
//!   render SQL with `?` placeholders and collect bind values in textual order
//! - **Statement builders**: SELECT / INSERT / UPDATE / DELETE with phase
//!   checks that fail on misuse instead of rendering broken SQL
//! - **Entity metadata**: table and column names derived from a type
//!   descriptor (`#[derive(Entity)]`), cached per type
//! - **Dialects**: vendor placeholders, RETURNING and document decoding
//! - **Row mapping**: generic [`Record`]s and typed conversion with value
//!   coercion
//! - **Bulk copy**: CSV `COPY ... FROM STDIN` for Postgres
//!
//! ```ignore
//! use buddy::prelude::*;
//!
//! #[derive(Entity)]
//! struct Person {
//!     #[buddy(id, generated)]
//!     id: Option<i64>,
//!     name: String,
//!     age: i32,
//! }
//!
//! let db = Database::new(client);
//! let person = db.table::<Person>();
//!
//! let saved: Person = db
//!     .persist(&Person { id: None, name: "Ann".into(), age: 30 })?
//!     .returning()
//!     .fetch_single_into(&db)
//!     .await?;
//!
//! let adults = db
//!     .select_from(&person)
//!     .where_(person.column("age")?.greater_or_equal(18))?
//!     .fetch_into(&db)
//!     .await?
//!     .to_list()
//!     .await?;
//! ```

pub mod builder;
pub mod config;
pub mod copy;
pub mod database;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod expr;
pub mod mapper;
pub mod metadata;
pub mod predicate;
pub mod prelude;
pub mod record;
pub mod result;
pub mod value;

pub use builder::{Context, Delete, Fetchable, Insert, JoinKind, Select, Statement, Update};
pub use config::{DatabaseConfig, FetchMode};
pub use copy::CopyIn;
pub use database::Database;
pub use dialect::{DefaultDialect, Dialect, H2Dialect, PostgresDialect};
pub use error::{BuddyError, BuddyResult};
pub use executor::{ColumnType, CopySink, NoCopy, PgCopySink, QueryKind, RawRow, RowStream, SqlExecutor};
pub use expr::{
    ColumnRef, Direction, Expr, Expression, IntoExpr, Order, QueryPart, concat, count, function,
    lower, upper,
};
pub use metadata::{
    ColumnDetails, ColumnOverride, Constructor, Entity, EntityDescriptor, FieldDescriptor,
    FieldMeta, Introspector, TableDetails, TableField, TableInfo, TableRef,
};
pub use predicate::Predicate;
pub use record::{FromRecord, Record};
pub use result::QueryResult;
pub use value::{DataType, FromValue, SqlType, Value};

#[cfg(feature = "derive")]
pub use buddy_derive::Entity;
