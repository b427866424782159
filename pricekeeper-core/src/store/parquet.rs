//! File-backed table store: one Parquet file per table plus a manifest.
//!
//! Layout: `{store_dir}/manifest.json` and
//! `{store_dir}/{name-hash}-{content-hash}.parquet`
//!
//! - File names are derived from the table name and the file content, so
//!   symbols like `BRK.B` or `^GSPC` need no escaping and a commit never
//!   overwrites a file the current manifest points at.
//! - Commits write each changed table to a fresh file, then replace the
//!   manifest via `.tmp` and rename. The manifest rename is the only commit
//!   point: until it happens the previous manifest and its files are intact.
//!   Superseded files are deleted after it succeeds.
//! - Files no manifest entry names (leftovers of a failed commit) are
//!   removed on open.
//! - The manifest records a BLAKE3 hash per file. A mismatch on open
//!   quarantines the file (`.quarantined`) and fails the open.

use super::error::StoreError;
use super::table_set::{TableData, TableSet};
use super::types::{ColumnDef, ColumnType, Key, Predicate, Projection, Record, Rows, Value};
use super::TableStore;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_VERSION: u32 = 1;

/// Manifest sidecar describing every committed table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreManifest {
    pub version: u32,
    pub tables: BTreeMap<String, TableEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub file: String,
    pub key: ColumnDef,
    pub columns: Vec<ColumnDef>,
    pub rows: usize,
    pub data_hash: String,
}

/// Durable store rooted at a directory.
pub struct ParquetStore {
    dir: PathBuf,
    manifest: StoreManifest,
    committed: TableSet,
    working: TableSet,
}

impl ParquetStore {
    /// Open (or initialize) the store under `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            let content = fs::read_to_string(&manifest_path)?;
            let manifest: StoreManifest = serde_json::from_str(&content)
                .map_err(|e| StoreError::Manifest(format!("parse: {e}")))?;
            if manifest.version != MANIFEST_VERSION {
                return Err(StoreError::Manifest(format!(
                    "unsupported manifest version {}",
                    manifest.version
                )));
            }
            manifest
        } else {
            StoreManifest {
                version: MANIFEST_VERSION,
                tables: BTreeMap::new(),
            }
        };

        let mut tables = TableSet::default();
        for (name, entry) in &manifest.tables {
            let data = load_table(&dir, name, entry)?;
            tables.insert_table(name.clone(), data);
        }
        sweep_unreferenced(&dir, &manifest)?;
        debug!(dir = %dir.display(), tables = manifest.tables.len(), "opened parquet store");

        Ok(Self {
            dir,
            manifest,
            committed: tables.clone(),
            working: tables,
        })
    }

    /// Manifest as of the last commit.
    pub fn manifest(&self) -> &StoreManifest {
        &self.manifest
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Write changed tables to new files, then swap in the manifest naming
    /// them. Every file created is recorded in `written`.
    fn stage(&self, next: &mut StoreManifest, written: &mut Vec<String>) -> Result<(), StoreError> {
        for (name, data) in self.working.iter() {
            let unchanged = self.committed.get(name) == Some(data);
            match self.manifest.tables.get(name) {
                Some(entry) if unchanged => {
                    next.tables.insert(name.clone(), entry.clone());
                }
                _ => {
                    let entry = write_table(&self.dir, name, data, written)?;
                    next.tables.insert(name.clone(), entry);
                }
            }
        }

        let json = serde_json::to_string_pretty(&*next)
            .map_err(|e| StoreError::Manifest(format!("serialize: {e}")))?;
        atomic_write(&self.manifest_path(), json.as_bytes())
    }
}

impl StoreManifest {
    fn references(&self, file: &str) -> bool {
        self.tables.values().any(|entry| entry.file == file)
    }
}

impl TableStore for ParquetStore {
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
        let mut next = StoreManifest {
            version: MANIFEST_VERSION,
            tables: BTreeMap::new(),
        };
        let mut written: Vec<String> = Vec::new();

        if let Err(e) = self.stage(&mut next, &mut written) {
            // The previous manifest is still the committed state; drop
            // whatever this attempt produced.
            for file in &written {
                if !self.manifest.references(file) {
                    let _ = fs::remove_file(self.dir.join(file));
                }
            }
            return Err(e);
        }

        for entry in self.manifest.tables.values() {
            if next.references(&entry.file) {
                continue;
            }
            if let Err(e) = fs::remove_file(self.dir.join(&entry.file)) {
                warn!(file = %entry.file, error = %e, "failed to remove superseded table file");
            }
        }

        self.manifest = next;
        self.committed = self.working.clone();
        Ok(())
    }

    fn rollback(&mut self) {
        self.working = self.committed.clone();
    }
}

/// File name for one version of a table: 16 hex chars of the BLAKE3 hash
/// of its name, then 16 of the file's content hash.
fn table_file_name(name: &str, data_hash: &str) -> String {
    let name_hash = blake3::hash(name.as_bytes()).to_hex();
    format!("{}-{}.parquet", &name_hash[..16], &data_hash[..16])
}

/// Remove table files and temp files the manifest does not name.
fn sweep_unreferenced(dir: &Path, manifest: &StoreManifest) -> Result<(), StoreError> {
    for dirent in fs::read_dir(dir)? {
        let path = dirent?.path();
        let Some(file) = path.file_name().and_then(|f| f.to_str()) else {
            continue;
        };
        let leftover = file.ends_with(".tmp")
            || (file.ends_with(".parquet") && !manifest.references(file));
        if leftover && path.is_file() {
            debug!(file, "removing file left by an unfinished commit");
            if let Err(e) = fs::remove_file(&path) {
                warn!(file, error = %e, "failed to remove leftover file");
            }
        }
    }
    Ok(())
}

/// Write `bytes` to `path` via a `.tmp` sibling and rename.
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::Io(e)
    })
}

fn write_table(
    dir: &Path,
    name: &str,
    data: &TableData,
    written: &mut Vec<String>,
) -> Result<TableEntry, StoreError> {
    let mut df = table_to_dataframe(name, data)?;
    let mut buf: Vec<u8> = Vec::new();
    ParquetWriter::new(&mut buf)
        .finish(&mut df)
        .map_err(|e| StoreError::Parquet(format!("write '{name}': {e}")))?;

    let data_hash = blake3::hash(&buf).to_hex().to_string();
    let file = table_file_name(name, &data_hash);
    atomic_write(&dir.join(&file), &buf)?;
    written.push(file.clone());

    Ok(TableEntry {
        file,
        key: data.key.clone(),
        columns: data.columns.clone(),
        rows: data.rows.len(),
        data_hash,
    })
}

fn load_table(dir: &Path, name: &str, entry: &TableEntry) -> Result<TableData, StoreError> {
    let path = dir.join(&entry.file);
    let bytes = fs::read(&path)?;

    let hash = blake3::hash(&bytes).to_hex().to_string();
    if hash != entry.data_hash {
        let quarantine = path.with_extension("parquet.quarantined");
        warn!(
            table = name,
            file = %path.display(),
            "hash mismatch, quarantining table file"
        );
        let _ = fs::rename(&path, &quarantine);
        return Err(StoreError::Corrupt {
            table: name.to_string(),
            reason: "content hash does not match manifest".into(),
        });
    }

    let file = fs::File::open(&path)?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::Parquet(format!("read '{name}': {e}")))?;

    if df.height() != entry.rows {
        return Err(StoreError::Corrupt {
            table: name.to_string(),
            reason: format!("expected {} rows, found {}", entry.rows, df.height()),
        });
    }

    dataframe_to_table(name, entry, &df)
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn table_to_dataframe(name: &str, data: &TableData) -> Result<DataFrame, StoreError> {
    let mut columns = Vec::with_capacity(data.columns.len() + 1);

    let key_col = match data.key.ty {
        ColumnType::Int | ColumnType::BigInt => {
            let keys: Vec<Option<i64>> = data.rows.keys().map(Key::as_int).collect();
            Column::new(data.key.name.as_str().into(), keys)
        }
        ColumnType::Text => {
            let keys: Vec<Option<String>> = data
                .rows
                .keys()
                .map(|k| k.as_text().map(str::to_string))
                .collect();
            Column::new(data.key.name.as_str().into(), keys)
        }
        ColumnType::Float => {
            return Err(StoreError::TypeMismatch {
                table: name.to_string(),
                column: data.key.name.clone(),
            })
        }
    };
    columns.push(key_col);

    for def in &data.columns {
        let cells = data.rows.values().map(|rec| rec.get(&def.name));
        let col = match def.ty {
            ColumnType::Int | ColumnType::BigInt => {
                let vals: Vec<Option<i64>> = cells
                    .map(|v| match v {
                        Some(Value::Int(i)) => Some(*i),
                        _ => None,
                    })
                    .collect();
                Column::new(def.name.as_str().into(), vals)
            }
            ColumnType::Float => {
                let vals: Vec<Option<f64>> = cells
                    .map(|v| match v {
                        Some(Value::Float(f)) => Some(*f),
                        _ => None,
                    })
                    .collect();
                Column::new(def.name.as_str().into(), vals)
            }
            ColumnType::Text => {
                let vals: Vec<Option<String>> = cells
                    .map(|v| match v {
                        Some(Value::Text(s)) => Some(s.clone()),
                        _ => None,
                    })
                    .collect();
                Column::new(def.name.as_str().into(), vals)
            }
        };
        columns.push(col);
    }

    DataFrame::new(columns)
        .map_err(|e| StoreError::Parquet(format!("dataframe creation for '{name}': {e}")))
}

fn dataframe_to_table(
    name: &str,
    entry: &TableEntry,
    df: &DataFrame,
) -> Result<TableData, StoreError> {
    let corrupt = |column: &str, e: PolarsError| StoreError::Corrupt {
        table: name.to_string(),
        reason: format!("column '{column}': {e}"),
    };
    let n = df.height();

    let key_series = df
        .column(&entry.key.name)
        .map_err(|e| corrupt(&entry.key.name, e))?;
    let mut keys: Vec<Key> = Vec::with_capacity(n);
    match entry.key.ty {
        ColumnType::Int | ColumnType::BigInt => {
            let ca = key_series.i64().map_err(|e| corrupt(&entry.key.name, e))?;
            for i in 0..n {
                let k = ca.get(i).ok_or_else(|| StoreError::Corrupt {
                    table: name.to_string(),
                    reason: format!("null key at row {i}"),
                })?;
                keys.push(Key::Int(k));
            }
        }
        ColumnType::Text => {
            let ca = key_series.str().map_err(|e| corrupt(&entry.key.name, e))?;
            for i in 0..n {
                let k = ca.get(i).ok_or_else(|| StoreError::Corrupt {
                    table: name.to_string(),
                    reason: format!("null key at row {i}"),
                })?;
                keys.push(Key::Text(k.to_string()));
            }
        }
        ColumnType::Float => {
            return Err(StoreError::TypeMismatch {
                table: name.to_string(),
                column: entry.key.name.clone(),
            })
        }
    }

    let mut records: Vec<Record> = vec![Record::new(); n];
    for def in &entry.columns {
        let series = df.column(&def.name).map_err(|e| corrupt(&def.name, e))?;
        match def.ty {
            ColumnType::Int | ColumnType::BigInt => {
                let ca = series.i64().map_err(|e| corrupt(&def.name, e))?;
                for (i, rec) in records.iter_mut().enumerate() {
                    if let Some(v) = ca.get(i) {
                        rec.insert(def.name.clone(), Value::Int(v));
                    }
                }
            }
            ColumnType::Float => {
                let ca = series.f64().map_err(|e| corrupt(&def.name, e))?;
                for (i, rec) in records.iter_mut().enumerate() {
                    if let Some(v) = ca.get(i) {
                        rec.insert(def.name.clone(), Value::Float(v));
                    }
                }
            }
            ColumnType::Text => {
                let ca = series.str().map_err(|e| corrupt(&def.name, e))?;
                for (i, rec) in records.iter_mut().enumerate() {
                    if let Some(v) = ca.get(i) {
                        rec.insert(def.name.clone(), Value::Text(v.to_string()));
                    }
                }
            }
        }
    }

    let mut data = TableData::new(entry.key.clone());
    data.columns = entry.columns.clone();
    data.rows = keys.into_iter().zip(records).collect();
    if data.rows.len() != n {
        return Err(StoreError::Corrupt {
            table: name.to_string(),
            reason: "duplicate primary keys".into(),
        });
    }
    Ok(data)
}
