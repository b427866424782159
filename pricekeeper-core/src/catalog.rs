//! Master catalog: one sync-metadata row per symbol.
//!
//! [`MasterCatalog`] is the typed handle over the `master` table.
//! [`CatalogSnapshot`] is the keeper's in-process copy of it, used only to
//! avoid a store round-trip when a symbol is already known. A snapshot miss
//! is never trusted on its own; see [`CatalogSnapshot::confirm_known`].

use crate::domain::{DateKey, MasterRecord};
use crate::error::{KeeperError, KeeperResult};
use crate::store::{ColumnDef, ColumnType, Key, Predicate, Projection, Record, Rows, TableStore, Value};
use std::collections::BTreeMap;
use tracing::debug;

pub const MASTER_TABLE: &str = "master";

const SYMBOL: &str = "symbol";
const LAST_UPDATE: &str = "last_update";
const FIRST_DATE: &str = "first_date";
const LAST_DATE: &str = "last_date";
const DATA_POINTS: &str = "data_points";

/// Handle over the master table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterCatalog {
    table: String,
}

impl Default for MasterCatalog {
    fn default() -> Self {
        Self {
            table: MASTER_TABLE.to_string(),
        }
    }
}

impl MasterCatalog {
    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn exists<S: TableStore + ?Sized>(&self, store: &S) -> KeeperResult<bool> {
        Ok(store.has_table(&self.table)?)
    }

    /// Create the master table if the store does not have one yet.
    /// Returns true when it was created.
    pub fn ensure<S: TableStore + ?Sized>(&self, store: &mut S) -> KeeperResult<bool> {
        if self.exists(store)? {
            return Ok(false);
        }
        store.create_table(&self.table, ColumnDef::new(SYMBOL, ColumnType::Text))?;
        for col in [LAST_UPDATE, FIRST_DATE, LAST_DATE, DATA_POINTS] {
            store.add_column(&self.table, ColumnDef::new(col, ColumnType::Int))?;
        }
        debug!(table = %self.table, "created master table");
        Ok(true)
    }

    pub fn get<S: TableStore + ?Sized>(
        &self,
        store: &S,
        symbol: &str,
    ) -> KeeperResult<Option<MasterRecord>> {
        let key = Key::Text(symbol.to_string());
        let rows = store.query(&self.table, &Projection::All, &Predicate::key_equals(key.clone()))?;
        rows.get(&key)
            .map(|rec| decode_record(symbol, rec))
            .transpose()
    }

    /// Full snapshot of the catalog, keyed by symbol.
    pub fn list<S: TableStore + ?Sized>(
        &self,
        store: &S,
    ) -> KeeperResult<BTreeMap<String, MasterRecord>> {
        let rows = store.query(&self.table, &Projection::All, &Predicate::all())?;
        rows.iter()
            .map(|(key, rec)| {
                let symbol = key.as_text().ok_or_else(|| {
                    KeeperError::Invariant(format!("non-text key {key} in master table"))
                })?;
                Ok((symbol.to_string(), decode_record(symbol, rec)?))
            })
            .collect()
    }

    /// Write or overwrite one symbol's record.
    pub fn upsert<S: TableStore + ?Sized>(
        &self,
        store: &mut S,
        symbol: &str,
        record: &MasterRecord,
    ) -> KeeperResult<()> {
        let rows = Rows::from([(Key::Text(symbol.to_string()), encode_record(symbol, record)?)]);
        store.upsert(&self.table, rows)?;
        Ok(())
    }
}

fn encode_record(symbol: &str, record: &MasterRecord) -> KeeperResult<Record> {
    let data_points = i64::try_from(record.data_points).map_err(|_| {
        KeeperError::Invariant(format!("data_points overflow for {symbol}"))
    })?;
    Ok(Record::from([
        (LAST_UPDATE.to_string(), Value::Int(record.last_update.0)),
        (FIRST_DATE.to_string(), Value::Int(record.first_date.0)),
        (LAST_DATE.to_string(), Value::Int(record.last_date.0)),
        (DATA_POINTS.to_string(), Value::Int(data_points)),
    ]))
}

fn decode_record(symbol: &str, rec: &Record) -> KeeperResult<MasterRecord> {
    let int = |col: &str| match rec.get(col) {
        Some(Value::Int(v)) => Ok(*v),
        other => Err(KeeperError::Invariant(format!(
            "master record for {symbol}: bad '{col}' value {other:?}"
        ))),
    };
    let data_points = u64::try_from(int(DATA_POINTS)?).map_err(|_| {
        KeeperError::Invariant(format!("master record for {symbol}: negative data_points"))
    })?;
    Ok(MasterRecord {
        last_update: DateKey(int(LAST_UPDATE)?),
        first_date: DateKey(int(FIRST_DATE)?),
        last_date: DateKey(int(LAST_DATE)?),
        data_points,
    })
}

/// In-process copy of the catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    records: BTreeMap<String, MasterRecord>,
    refreshes: u64,
}

impl CatalogSnapshot {
    pub fn load<S: TableStore + ?Sized>(catalog: &MasterCatalog, store: &S) -> KeeperResult<Self> {
        let mut snapshot = Self::default();
        snapshot.refresh(catalog, store)?;
        Ok(snapshot)
    }

    /// Replace the snapshot with the store's current catalog.
    pub fn refresh<S: TableStore + ?Sized>(
        &mut self,
        catalog: &MasterCatalog,
        store: &S,
    ) -> KeeperResult<&BTreeMap<String, MasterRecord>> {
        self.records = catalog.list(store)?;
        self.refreshes += 1;
        Ok(&self.records)
    }

    /// Two-step existence check: consult the snapshot, and on a miss
    /// refresh it from the store exactly once before answering.
    pub fn confirm_known<S: TableStore + ?Sized>(
        &mut self,
        catalog: &MasterCatalog,
        store: &S,
        symbol: &str,
    ) -> KeeperResult<bool> {
        if self.records.contains_key(symbol) {
            return Ok(true);
        }
        debug!(symbol, "snapshot miss, refreshing catalog");
        Ok(self.refresh(catalog, store)?.contains_key(symbol))
    }

    pub fn contains_cached(&self, symbol: &str) -> bool {
        self.records.contains_key(symbol)
    }

    pub fn remember(&mut self, symbol: &str, record: MasterRecord) {
        self.records.insert(symbol.to_string(), record);
    }

    pub fn forget(&mut self, symbol: &str) {
        self.records.remove(symbol);
    }

    /// How many times the snapshot has been reloaded from the store.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes
    }
}
