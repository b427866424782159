//! Typed handle over one symbol's price table.

use crate::domain::{DateKey, PriceRow, PriceSeries};
use crate::error::{KeeperError, KeeperResult};
use crate::store::{
    ColumnDef, ColumnType, Key, KeyBound, Predicate, Projection, Record, Rows, TableStore, Value,
};

const DATE: &str = "date";
const OPEN: &str = "open";
const HIGH: &str = "high";
const LOW: &str = "low";
const CLOSE: &str = "close";
const ADJ_CLOSE: &str = "adjclose";
const VOLUME: &str = "volume";

/// Prefix separating price tables from the master table namespace.
const TABLE_PREFIX: &str = "prices/";

/// Inclusive date bounds for a price query. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateKey>,
    pub end: Option<DateKey>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: Option<DateKey>, end: Option<DateKey>) -> Self {
        Self { start, end }
    }

    fn predicate(&self) -> Predicate {
        let mut pred = Predicate::all();
        if let Some(start) = self.start {
            pred = pred.and(KeyBound::AtLeast(Key::Int(start.0)));
        }
        if let Some(end) = self.end {
            pred = pred.and(KeyBound::AtMost(Key::Int(end.0)));
        }
        pred
    }
}

/// Handle naming the table that stores `symbol`'s daily rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTable {
    symbol: String,
    table: String,
}

impl PriceTable {
    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            table: format!("{TABLE_PREFIX}{symbol}"),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn exists<S: TableStore + ?Sized>(&self, store: &S) -> KeeperResult<bool> {
        Ok(store.has_table(&self.table)?)
    }

    /// Create the table with the fixed OHLCV schema. The caller checks
    /// existence first; creating over an existing table is a contract
    /// violation and reported as [`KeeperError::Invariant`].
    pub fn create<S: TableStore + ?Sized>(&self, store: &mut S) -> KeeperResult<()> {
        if self.exists(store)? {
            return Err(KeeperError::Invariant(format!(
                "price table for {} already exists",
                self.symbol
            )));
        }
        store.create_table(&self.table, ColumnDef::new(DATE, ColumnType::Int))?;
        for col in [OPEN, HIGH, LOW, CLOSE, ADJ_CLOSE] {
            store.add_column(&self.table, ColumnDef::new(col, ColumnType::Float))?;
        }
        store.add_column(&self.table, ColumnDef::new(VOLUME, ColumnType::BigInt))?;
        Ok(())
    }

    /// Rows within `range`, ascending by date.
    pub fn query<S: TableStore + ?Sized>(
        &self,
        store: &S,
        range: DateRange,
    ) -> KeeperResult<PriceSeries> {
        let rows = store.query(&self.table, &Projection::All, &range.predicate())?;
        rows.iter()
            .map(|(key, rec)| Ok((self.date_of(key)?, self.decode_row(key, rec)?)))
            .collect()
    }

    /// The row stored for exactly `date`, if any.
    pub fn get<S: TableStore + ?Sized>(
        &self,
        store: &S,
        date: DateKey,
    ) -> KeeperResult<Option<PriceRow>> {
        let key = Key::Int(date.0);
        let rows = store.query(&self.table, &Projection::All, &Predicate::key_equals(key.clone()))?;
        rows.get(&key).map(|rec| self.decode_row(&key, rec)).transpose()
    }

    /// Every stored date, ascending.
    pub fn dates<S: TableStore + ?Sized>(&self, store: &S) -> KeeperResult<Vec<DateKey>> {
        let rows = store.query(&self.table, &Projection::keys_only(), &Predicate::all())?;
        let mut dates = rows
            .keys()
            .map(|k| self.date_of(k))
            .collect::<KeeperResult<Vec<_>>>()?;
        // The prefix trim in resync depends on this order.
        dates.sort_unstable();
        Ok(dates)
    }

    /// Insert-or-replace each row. An empty batch is a no-op.
    pub fn upsert<'a, S, I>(&self, store: &mut S, rows: I) -> KeeperResult<usize>
    where
        S: TableStore + ?Sized,
        I: IntoIterator<Item = (&'a DateKey, &'a PriceRow)>,
    {
        let batch: Rows = rows
            .into_iter()
            .map(|(date, row)| (Key::Int(date.0), encode_row(row)))
            .collect();
        let written = batch.len();
        if written > 0 {
            store.upsert(&self.table, batch)?;
        }
        Ok(written)
    }

    /// Remove the row for `date` if present.
    pub fn delete<S: TableStore + ?Sized>(&self, store: &mut S, date: DateKey) -> KeeperResult<()> {
        store.delete(&self.table, &Key::Int(date.0))?;
        Ok(())
    }

    fn date_of(&self, key: &Key) -> KeeperResult<DateKey> {
        key.as_int().map(DateKey).ok_or_else(|| {
            KeeperError::Invariant(format!("non-integer date key {key} for {}", self.symbol))
        })
    }

    fn decode_row(&self, key: &Key, rec: &Record) -> KeeperResult<PriceRow> {
        let bad = |col: &str| {
            KeeperError::Invariant(format!(
                "price row {key} for {}: missing or mistyped '{col}'",
                self.symbol
            ))
        };
        let float = |col: &str| match rec.get(col) {
            Some(Value::Float(v)) => Ok(*v),
            _ => Err(bad(col)),
        };
        let volume = match rec.get(VOLUME) {
            Some(Value::Int(v)) => *v,
            _ => return Err(bad(VOLUME)),
        };
        Ok(PriceRow {
            open: float(OPEN)?,
            high: float(HIGH)?,
            low: float(LOW)?,
            close: float(CLOSE)?,
            adj_close: float(ADJ_CLOSE)?,
            volume,
        })
    }
}

fn encode_row(row: &PriceRow) -> Record {
    Record::from([
        (OPEN.to_string(), Value::Float(row.open)),
        (HIGH.to_string(), Value::Float(row.high)),
        (LOW.to_string(), Value::Float(row.low)),
        (CLOSE.to_string(), Value::Float(row.close)),
        (ADJ_CLOSE.to_string(), Value::Float(row.adj_close)),
        (VOLUME.to_string(), Value::Int(row.volume)),
    ])
}
