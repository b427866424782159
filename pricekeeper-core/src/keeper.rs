//! PriceKeeper: incremental updates and queries over the price store.
//!
//! One `update` call is one transaction:
//!
//! 1. make sure the symbol has a price table and a catalog row,
//! 2. skip entirely if it was already updated today (unless forced),
//! 3. spot-check the incoming series and resync on mismatch,
//! 4. append incoming rows dated after the catalog's `last_date`,
//! 5. rewrite the catalog row,
//! 6. commit.
//!
//! Any error rolls the store back to the previous commit.

use crate::catalog::{CatalogSnapshot, MasterCatalog};
use crate::clock::{Clock, LocalClock};
use crate::config::KeeperConfig;
use crate::domain::{date_span, DateKey, MasterRecord, PriceSeries};
use crate::error::{KeeperError, KeeperResult};
use crate::price_table::{DateRange, PriceTable};
use crate::reconcile::{ReconciliationEngine, ResyncReport, SpotCheck};
use crate::store::{ParquetStore, TableStore};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Whether `update` may skip a symbol already updated today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    /// Return without touching storage if `last_update` is today.
    #[default]
    SkipIfUpdatedToday,
    /// Always run the full update.
    Force,
}

/// What an `update` call did.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Already updated today; storage untouched.
    Skipped { record: MasterRecord },
    Applied(AppliedUpdate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUpdate {
    /// This call registered the symbol (created its table or catalog row).
    pub created: bool,
    pub spot_check: SpotCheck,
    pub resync: Option<ResyncReport>,
    /// Rows written because they were dated after the previous `last_date`.
    pub appended: usize,
    /// Catalog row as committed.
    pub record: MasterRecord,
}

impl UpdateOutcome {
    pub fn record(&self) -> &MasterRecord {
        match self {
            UpdateOutcome::Skipped { record } => record,
            UpdateOutcome::Applied(applied) => &applied.record,
        }
    }

    pub fn was_skipped(&self) -> bool {
        matches!(self, UpdateOutcome::Skipped { .. })
    }
}

/// Keeps per-symbol price tables and the master catalog in sync with
/// externally supplied daily series.
pub struct PriceKeeper<S: TableStore, C: Clock = LocalClock> {
    store: S,
    catalog: MasterCatalog,
    snapshot: CatalogSnapshot,
    engine: ReconciliationEngine,
    clock: C,
}

impl PriceKeeper<ParquetStore, LocalClock> {
    /// Open the file-backed store named by `config`.
    pub fn open(config: &KeeperConfig) -> KeeperResult<Self> {
        let store = ParquetStore::open(&config.store_dir)?;
        Self::with_store(store, config, LocalClock)
    }
}

impl<S: TableStore, C: Clock> PriceKeeper<S, C> {
    /// Wrap an existing store. Creates the master table if missing and
    /// loads the catalog snapshot.
    pub fn with_store(mut store: S, config: &KeeperConfig, clock: C) -> KeeperResult<Self> {
        let catalog = MasterCatalog::default();
        if catalog.ensure(&mut store)? {
            store.commit()?;
            info!("initialized master catalog");
        }
        let snapshot = CatalogSnapshot::load(&catalog, &store)?;
        Ok(Self {
            store,
            catalog,
            snapshot,
            engine: ReconciliationEngine::new(&config.spot_check),
            clock,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Bring `symbol`'s stored history up to date with `incoming`.
    pub fn update(
        &mut self,
        symbol: &str,
        incoming: &PriceSeries,
        policy: SkipPolicy,
    ) -> KeeperResult<UpdateOutcome> {
        match self.apply_update(symbol, incoming, policy) {
            Ok(UpdateOutcome::Skipped { record }) => {
                debug!(symbol, "already updated today, skipping");
                Ok(UpdateOutcome::Skipped { record })
            }
            Ok(UpdateOutcome::Applied(applied)) => {
                if let Err(e) = self.store.commit() {
                    self.abandon(symbol);
                    return Err(e.into());
                }
                self.snapshot.remember(symbol, applied.record);
                info!(
                    symbol,
                    appended = applied.appended,
                    resynced = applied.resync.is_some(),
                    data_points = applied.record.data_points,
                    "applied update"
                );
                Ok(UpdateOutcome::Applied(applied))
            }
            Err(e) => {
                warn!(symbol, error = %e, "update failed, rolling back");
                self.abandon(symbol);
                Err(e)
            }
        }
    }

    fn apply_update(
        &mut self,
        symbol: &str,
        incoming: &PriceSeries,
        policy: SkipPolicy,
    ) -> KeeperResult<UpdateOutcome> {
        let table = PriceTable::for_symbol(symbol);
        let created = self.ensure_symbol(symbol, &table)?;

        let today = self.clock.today();
        let mut record = self.catalog.get(&self.store, symbol)?.ok_or_else(|| {
            KeeperError::Invariant(format!("catalog row for {symbol} vanished"))
        })?;
        if !created && policy == SkipPolicy::SkipIfUpdatedToday && record.updated_on(today) {
            // Nothing was written, so there is nothing to commit or roll back.
            return Ok(UpdateOutcome::Skipped { record });
        }

        let spot_check = self.engine.spot_check(&self.store, &table, incoming)?;
        let resync = if spot_check.passed() {
            None
        } else {
            info!(symbol, date = ?spot_check.mismatch.map(|m| m.date), "spot-check failed, resyncing");
            let report = self
                .engine
                .resync(&mut self.store, &self.catalog, &table, incoming)?;
            record = report.record;
            Some(report)
        };

        let delta: PriceSeries = incoming
            .range(DateKey(record.last_date.0.saturating_add(1))..)
            .map(|(d, r)| (*d, *r))
            .collect();
        let appended = table.upsert(&mut self.store, &delta)?;

        let record = next_record(record, incoming, appended, today);
        self.catalog.upsert(&mut self.store, symbol, &record)?;

        Ok(UpdateOutcome::Applied(AppliedUpdate {
            created,
            spot_check,
            resync,
            appended,
            record,
        }))
    }

    /// Make sure `symbol` has a catalog row and a price table, creating
    /// whichever is missing in the open transaction. Returns true when
    /// anything was created.
    fn ensure_symbol(&mut self, symbol: &str, table: &PriceTable) -> KeeperResult<bool> {
        let known = self
            .snapshot
            .confirm_known(&self.catalog, &self.store, symbol)?;
        if known && table.exists(&self.store)? {
            return Ok(false);
        }

        if !table.exists(&self.store)? {
            table.create(&mut self.store)?;
        } else {
            warn!(symbol, "price table exists without a catalog row");
        }
        if !known {
            self.catalog
                .upsert(&mut self.store, symbol, &MasterRecord::empty())?;
        }
        info!(symbol, "registered new symbol");
        Ok(true)
    }

    fn abandon(&mut self, symbol: &str) {
        self.store.rollback();
        self.snapshot.forget(symbol);
    }

    /// Stored rows for `symbol` within `[start, end]`, ascending. Either
    /// bound may be open.
    pub fn query_price(
        &mut self,
        symbol: &str,
        start: Option<DateKey>,
        end: Option<DateKey>,
    ) -> KeeperResult<PriceSeries> {
        let table = self.known_table(symbol)?;
        table.query(&self.store, DateRange::between(start, end))
    }

    /// Catalog row for `symbol`.
    pub fn query_master_info(&mut self, symbol: &str) -> KeeperResult<MasterRecord> {
        self.known_table(symbol)?;
        self.catalog
            .get(&self.store, symbol)?
            .ok_or_else(|| KeeperError::not_found(symbol))
    }

    /// The whole catalog, re-read from the store.
    pub fn query_full_catalog(&mut self) -> KeeperResult<BTreeMap<String, MasterRecord>> {
        Ok(self.snapshot.refresh(&self.catalog, &self.store)?.clone())
    }

    fn known_table(&mut self, symbol: &str) -> KeeperResult<PriceTable> {
        if !self
            .snapshot
            .confirm_known(&self.catalog, &self.store, symbol)?
        {
            return Err(KeeperError::not_found(symbol));
        }
        let table = PriceTable::for_symbol(symbol);
        if !table.exists(&self.store)? {
            return Err(KeeperError::not_found(symbol));
        }
        Ok(table)
    }
}

/// Catalog row after applying `incoming`, given the row as it stood
/// before the append (post-resync, if one ran).
///
/// `data_points` is set to the incoming length when it was zero and
/// otherwise grows by the appended count. The two rules disagree when an
/// incoming series overlaps rows that were stored without a catalog count;
/// the behavior is kept as is.
fn next_record(
    mut record: MasterRecord,
    incoming: &PriceSeries,
    appended: usize,
    today: DateKey,
) -> MasterRecord {
    record.last_update = today;
    if let Some((first, last)) = date_span(incoming) {
        if record.first_date.is_unset() {
            record.first_date = first;
        }
        record.last_date = record.last_date.max(last);
    }
    if record.data_points == 0 {
        record.data_points = incoming.len() as u64;
    } else {
        record.data_points += appended as u64;
    }
    record
}
