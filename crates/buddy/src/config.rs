//! Runtime configuration for a [`Database`](crate::Database).

/// How query results are read from the executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// Pull rows from the executor's cursor as the caller consumes them.
    #[default]
    Streaming,
    /// Load every row before handing the result out.
    Buffered,
}

/// Default number of CSV lines per bulk-copy batch.
pub const DEFAULT_COPY_BATCH_SIZE: usize = 10_000;

/// Configuration for statement execution and logging.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Dialect name to use instead of the executor's product name.
    pub dialect: Option<String>,
    pub fetch_mode: FetchMode,
    /// Lines buffered before each bulk-copy write.
    pub copy_batch_size: usize,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: None,
            fetch_mode: FetchMode::Streaming,
            copy_batch_size: DEFAULT_COPY_BATCH_SIZE,
            max_sql_length: Some(200),
        }
    }
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a dialect by product name (`"PostgreSQL"`, `"H2"`, ...).
    pub fn with_dialect(mut self, name: impl Into<String>) -> Self {
        self.dialect = Some(name.into());
        self
    }

    pub fn with_fetch_mode(mut self, mode: FetchMode) -> Self {
        self.fetch_mode = mode;
        self
    }

    /// Materialize results before returning them.
    pub fn buffered(self) -> Self {
        self.with_fetch_mode(FetchMode::Buffered)
    }

    /// Set the bulk-copy batch size. Zero is treated as one.
    pub fn with_copy_batch_size(mut self, lines: usize) -> Self {
        self.copy_batch_size = lines.max(1);
        self
    }

    /// Set maximum SQL length to log.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation in logs.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }
}
