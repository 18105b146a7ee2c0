use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error not covered by a more specific variant.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// A lookup that should match at most one row matched several.
    #[error("Expected at most one row in {table}, found several")]
    MultipleRows { table: &'static str },

    /// UNIQUE or PRIMARY KEY constraint violated.
    #[error("Duplicate record: {0}")]
    Conflict(String),

    /// FOREIGN KEY constraint violated.
    #[error("Referenced record does not exist: {0}")]
    ForeignKey(String),

    /// CHECK or NOT NULL constraint violated.
    #[error("Constraint check failed: {0}")]
    Check(String),

    /// A filter, sort or update named a column the entity does not expose.
    #[error("Unknown column '{column}' for table {table}")]
    UnknownColumn { table: &'static str, column: String },

    /// Update or delete without a filter.
    #[error("Refusing to modify {table} without a filter")]
    EmptyFilter { table: &'static str },

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl StoreError {
    /// Classify a rusqlite error, lifting constraint violations into their
    /// own variants.
    pub(crate) fn from_sqlite(err: rusqlite::Error) -> Self {
        use rusqlite::ffi;

        if let rusqlite::Error::SqliteFailure(code, ref message) = err {
            let detail = message.clone().unwrap_or_default();
            match code.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return StoreError::Conflict(detail)
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return StoreError::ForeignKey(detail),
                ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                    return StoreError::Check(detail)
                }
                _ => {}
            }
        }
        StoreError::Sqlite(err)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
