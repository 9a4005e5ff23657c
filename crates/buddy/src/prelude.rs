//! Common imports.
//!
//! ```ignore
//! use buddy::prelude::*;
//! ```

pub use crate::{
    BuddyError, BuddyResult, Database, DatabaseConfig, Delete, Entity, Expression, Fetchable,
    FromRecord, Insert, Order, Predicate, QueryResult, Record, Select, SqlExecutor, Statement,
    TableField, TableInfo, Update, Value, concat, count, function, lower, upper,
};
