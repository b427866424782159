use thiserror::Error;

/// Failures raised by a [`TableStore`](super::TableStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("table '{table}' is corrupt: {reason}")]
    Corrupt { table: String, reason: String },

    #[error("table '{0}' already exists")]
    TableExists(String),

    #[error("no such table: '{0}'")]
    NoSuchTable(String),

    #[error("no such column '{column}' in table '{table}'")]
    NoSuchColumn { table: String, column: String },

    #[error("type mismatch in table '{table}', column '{column}'")]
    TypeMismatch { table: String, column: String },
}
