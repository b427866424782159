use super::error::StoreError;
use super::table_set::TableSet;
use super::types::{ColumnDef, Key, Predicate, Projection, Rows};
use super::TableStore;
use std::collections::BTreeSet;

/// Volatile store. Commit and rollback swap between a committed and a
/// working copy, so transaction behavior matches [`ParquetStore`](super::ParquetStore).
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    committed: TableSet,
    working: TableSet,
    commits: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    /// Committed state, ignoring any open transaction.
    pub fn committed(&self) -> &TableSet {
        &self.committed
    }

    pub fn has_pending_writes(&self) -> bool {
        self.committed != self.working
    }
}

impl TableStore for MemoryStore {
    fn list_tables(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.working.names())
    }

    fn has_table(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.working.contains(name))
    }

    fn create_table(&mut self, name: &str, key: ColumnDef) -> Result<(), StoreError> {
        self.working.create(name, key)
    }

    fn add_column(&mut self, table: &str, column: ColumnDef) -> Result<(), StoreError> {
        self.working.add_column(table, column)
    }

    fn query(
        &self,
        table: &str,
        projection: &Projection,
        predicate: &Predicate,
    ) -> Result<Rows, StoreError> {
        self.working.query(table, projection, predicate)
    }

    fn upsert(&mut self, table: &str, rows: Rows) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.working.upsert(table, rows)
    }

    fn delete(&mut self, table: &str, key: &Key) -> Result<(), StoreError> {
        self.working.delete(table, key)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.committed = self.working.clone();
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) {
        self.working = self.committed.clone();
    }
}
