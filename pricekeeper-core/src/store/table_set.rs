//! In-memory tables shared by every store backend.
//!
//! Both [`MemoryStore`](super::MemoryStore) and
//! [`ParquetStore`](super::ParquetStore) keep a committed and a working
//! `TableSet`; they differ only in how a commit is made durable.

use super::error::StoreError;
use super::types::{ColumnDef, Key, KeyBound, Predicate, Projection, Record, Rows};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Schema plus rows of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub key: ColumnDef,
    pub columns: Vec<ColumnDef>,
    pub rows: Rows,
}

impl TableData {
    pub fn new(key: ColumnDef) -> Self {
        Self {
            key,
            columns: Vec::new(),
            rows: Rows::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSet {
    tables: BTreeMap<String, TableData>,
}

impl TableSet {
    pub fn names(&self) -> BTreeSet<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&TableData> {
        self.tables.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TableData)> {
        self.tables.iter()
    }

    /// Install a fully-formed table, replacing any previous one. Used when
    /// loading from disk.
    pub fn insert_table(&mut self, name: impl Into<String>, data: TableData) {
        self.tables.insert(name.into(), data);
    }

    pub fn create(&mut self, name: &str, key: ColumnDef) -> Result<(), StoreError> {
        if self.tables.contains_key(name) {
            return Err(StoreError::TableExists(name.to_string()));
        }
        self.tables.insert(name.to_string(), TableData::new(key));
        Ok(())
    }

    pub fn add_column(&mut self, table: &str, column: ColumnDef) -> Result<(), StoreError> {
        let data = self.table_mut(table)?;
        if data.key.name == column.name || data.column(&column.name).is_some() {
            return Err(StoreError::Corrupt {
                table: table.to_string(),
                reason: format!("duplicate column '{}'", column.name),
            });
        }
        data.columns.push(column);
        Ok(())
    }

    pub fn query(
        &self,
        table: &str,
        projection: &Projection,
        predicate: &Predicate,
    ) -> Result<Rows, StoreError> {
        let data = self.table(table)?;
        if let Projection::Columns(cols) = projection {
            for col in cols {
                if data.column(col).is_none() {
                    return Err(StoreError::NoSuchColumn {
                        table: table.to_string(),
                        column: col.clone(),
                    });
                }
            }
        }

        let mut out = Rows::new();
        if let Some(key) = predicate.pinned_key() {
            if let Some(record) = data.rows.get(key) {
                if predicate.matches(key) {
                    out.insert(key.clone(), project(record, projection));
                }
            }
            return Ok(out);
        }

        let (lower, upper) = key_range(predicate);
        if let (Bound::Included(lo), Bound::Included(hi)) = (&lower, &upper) {
            if lo > hi {
                return Ok(out);
            }
        }
        for (key, record) in data.rows.range((lower, upper)) {
            if predicate.matches(key) {
                out.insert(key.clone(), project(record, projection));
            }
        }
        Ok(out)
    }

    pub fn upsert(&mut self, table: &str, rows: Rows) -> Result<(), StoreError> {
        let data = self.table_mut(table)?;
        for (key, record) in &rows {
            if !key.fits(data.key.ty) {
                return Err(StoreError::TypeMismatch {
                    table: table.to_string(),
                    column: data.key.name.clone(),
                });
            }
            for (name, value) in record {
                let column = data.column(name).ok_or_else(|| StoreError::NoSuchColumn {
                    table: table.to_string(),
                    column: name.clone(),
                })?;
                if !value.fits(column.ty) {
                    return Err(StoreError::TypeMismatch {
                        table: table.to_string(),
                        column: name.clone(),
                    });
                }
            }
        }
        data.rows.extend(rows);
        Ok(())
    }

    pub fn delete(&mut self, table: &str, key: &Key) -> Result<(), StoreError> {
        self.table_mut(table)?.rows.remove(key);
        Ok(())
    }

    fn table(&self, name: &str) -> Result<&TableData, StoreError> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::NoSuchTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut TableData, StoreError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::NoSuchTable(name.to_string()))
    }
}

fn project(record: &Record, projection: &Projection) -> Record {
    match projection {
        Projection::All => record.clone(),
        Projection::Columns(_) => record
            .iter()
            .filter(|(name, _)| projection.includes(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
    }
}

/// Tightest inclusive range implied by the predicate's bounds.
fn key_range(predicate: &Predicate) -> (Bound<Key>, Bound<Key>) {
    let mut lower: Option<&Key> = None;
    let mut upper: Option<&Key> = None;
    for bound in predicate.bounds() {
        match bound {
            KeyBound::AtLeast(k) => {
                if lower.map_or(true, |cur| k > cur) {
                    lower = Some(k);
                }
            }
            KeyBound::AtMost(k) => {
                if upper.map_or(true, |cur| k < cur) {
                    upper = Some(k);
                }
            }
            KeyBound::Equals(_) => {}
        }
    }
    (
        lower.map_or(Bound::Unbounded, |k| Bound::Included(k.clone())),
        upper.map_or(Bound::Unbounded, |k| Bound::Included(k.clone())),
    )
}
