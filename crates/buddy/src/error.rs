//! Error types for buddy

use thiserror::Error;

/// Result type alias for buddy operations
pub type BuddyResult<T> = Result<T, BuddyError>;

/// Error types for statement building, mapping and execution
#[derive(Debug, Error)]
pub enum BuddyError {
    /// Illegal builder state transition; the message is shown verbatim
    #[error("{0}")]
    Builder(String),

    /// A single-row fetch matched no rows
    #[error("No data found")]
    NoDataFound,

    /// A single-row fetch matched more than one row
    #[error("Too many rows: expected exactly one")]
    TooManyRows,

    /// An operation needs an id column the mapped type does not declare
    #[error("No id column mapped for table '{0}'")]
    MissingId(String),

    /// Lookup of a field that is not mapped on the table
    #[error("Unknown field '{field}' on table '{table}'")]
    UnknownField { table: String, field: String },

    /// Entity configuration error (e.g. no usable constructor)
    #[error("{0}")]
    Mapping(String),

    /// Row decode/coercion error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Document codec error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Query execution error, propagated from the driver
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// The executor does not provide the requested capability
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl BuddyError {
    /// Create a builder misuse error
    pub fn builder(message: impl Into<String>) -> Self {
        Self::Builder(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Check if this is a builder misuse error
    pub fn is_builder(&self) -> bool {
        matches!(self, Self::Builder(_))
    }

    /// Check if this is a "no data found" error
    pub fn is_no_data_found(&self) -> bool {
        matches!(self, Self::NoDataFound)
    }

    /// Check if this is a "too many rows" error
    pub fn is_too_many_rows(&self) -> bool {
        matches!(self, Self::TooManyRows)
    }
}

/// Fail with a [`BuddyError::Builder`] unless `cond` holds.
macro_rules! ensure {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::error::BuddyError::builder($msg));
        }
    };
}

pub(crate) use ensure;

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for BuddyError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
