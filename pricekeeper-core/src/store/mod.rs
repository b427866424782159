//! Table-store contract and its backends.
//!
//! The keeper never touches storage directly: it names tables and issues
//! create/query/upsert/delete calls through [`TableStore`], then commits
//! once per update. Writes stay invisible to a reopened store until that
//! commit succeeds.

pub mod error;
pub mod memory;
pub mod parquet;
pub mod table_set;
pub mod types;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use parquet::ParquetStore;
pub use table_set::{TableData, TableSet};
pub use types::{ColumnDef, ColumnType, Key, KeyBound, Predicate, Projection, Record, Rows, Value};

use std::collections::BTreeSet;

/// A transactional store of named, primary-keyed tables.
///
/// Reads observe uncommitted writes made through the same store value.
pub trait TableStore {
    /// Names of every table, committed or created in the open transaction.
    fn list_tables(&self) -> Result<BTreeSet<String>, StoreError>;

    fn has_table(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.list_tables()?.contains(name))
    }

    /// Create an empty table keyed by `key`. Fails with
    /// [`StoreError::TableExists`] if the name is taken.
    fn create_table(&mut self, name: &str, key: ColumnDef) -> Result<(), StoreError>;

    fn add_column(&mut self, table: &str, column: ColumnDef) -> Result<(), StoreError>;

    /// Rows matching `predicate`, ascending by key.
    fn query(
        &self,
        table: &str,
        projection: &Projection,
        predicate: &Predicate,
    ) -> Result<Rows, StoreError>;

    /// Insert-or-replace each row. An empty map is a no-op.
    fn upsert(&mut self, table: &str, rows: Rows) -> Result<(), StoreError>;

    /// Remove one row if present.
    fn delete(&mut self, table: &str, key: &Key) -> Result<(), StoreError>;

    /// Make every write since the last commit durable and visible.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard every write since the last commit.
    fn rollback(&mut self);
}
