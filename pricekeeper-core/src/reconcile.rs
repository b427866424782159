//! Spot-check validation and resync repair.
//!
//! Providers occasionally recompute adjusted closes for an entire history
//! after a split or dividend. Comparing a random sample of incoming dates
//! against the stored table detects that cheaply: a recalculation touching
//! a large share of the history is caught by a 20-date sample with
//! near certainty. Isolated single-row corruption is not the target.
//!
//! When the check fails, [`ReconciliationEngine::resync`] makes the stored
//! table agree with the incoming series while keeping the overlap:
//!
//! 1. stored dates before the incoming minimum are dropped (prefix trim),
//! 2. remaining stored dates present in the incoming series are overwritten,
//! 3. remaining stored dates absent from it are deleted,
//! 4. the catalog's coverage fields are recomputed from the repaired table.

use crate::catalog::MasterCatalog;
use crate::config::SpotCheckConfig;
use crate::domain::{DateKey, MasterRecord, PriceSeries};
use crate::error::KeeperResult;
use crate::price_table::PriceTable;
use crate::store::TableStore;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Whether two adjusted closes agree at `decimals` places. Two NaNs agree.
pub fn adj_close_matches(stored: f64, incoming: f64, decimals: u32) -> bool {
    if stored.is_nan() || incoming.is_nan() {
        return stored.is_nan() && incoming.is_nan();
    }
    round_to(stored, decimals) == round_to(incoming, decimals)
}

/// First sampled date whose adjusted close disagrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mismatch {
    pub date: DateKey,
    pub stored: f64,
    pub incoming: f64,
}

/// Outcome of one spot-check.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotCheck {
    /// Dates drawn from the incoming series.
    pub sampled: usize,
    /// Sampled dates that also had a stored row, up to and including any mismatch.
    pub compared: usize,
    pub mismatch: Option<Mismatch>,
}

impl SpotCheck {
    pub fn passed(&self) -> bool {
        self.mismatch.is_none()
    }
}

/// What a resync changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResyncReport {
    /// Dates dropped for predating the incoming series.
    pub trimmed: Vec<DateKey>,
    /// Dates dropped because the incoming series no longer has them.
    pub removed: Vec<DateKey>,
    /// Number of stored rows overwritten with incoming values.
    pub overwritten: usize,
    /// Catalog record written after the repair.
    pub record: MasterRecord,
}

/// Spot-check sampler plus resync repair.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    sample_size: usize,
    decimals: u32,
    rng: StdRng,
}

impl ReconciliationEngine {
    pub fn new(config: &SpotCheckConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            sample_size: config.sample_size,
            decimals: config.adj_close_decimals,
            rng,
        }
    }

    /// Compare stored adjusted closes against `incoming` on a random sample
    /// of up to `sample_size` distinct incoming dates. Dates without a
    /// stored row are skipped; the first mismatch ends the check.
    pub fn spot_check<S: TableStore + ?Sized>(
        &mut self,
        store: &S,
        table: &PriceTable,
        incoming: &PriceSeries,
    ) -> KeeperResult<SpotCheck> {
        let candidates: Vec<DateKey> = incoming.keys().copied().collect();
        let sample: Vec<DateKey> = candidates
            .choose_multiple(&mut self.rng, self.sample_size)
            .copied()
            .collect();

        let mut compared = 0;
        for date in &sample {
            let Some(stored) = table.get(store, *date)? else {
                continue;
            };
            compared += 1;
            let fresh = incoming[date].adj_close;
            if !adj_close_matches(stored.adj_close, fresh, self.decimals) {
                debug!(
                    symbol = table.symbol(),
                    %date,
                    stored = stored.adj_close,
                    incoming = fresh,
                    "adj_close mismatch"
                );
                return Ok(SpotCheck {
                    sampled: sample.len(),
                    compared,
                    mismatch: Some(Mismatch {
                        date: *date,
                        stored: stored.adj_close,
                        incoming: fresh,
                    }),
                });
            }
        }

        Ok(SpotCheck {
            sampled: sample.len(),
            compared,
            mismatch: None,
        })
    }

    /// [`spot_check`](Self::spot_check) reduced to pass/fail.
    pub fn validate<S: TableStore + ?Sized>(
        &mut self,
        store: &S,
        table: &PriceTable,
        incoming: &PriceSeries,
    ) -> KeeperResult<bool> {
        Ok(self.spot_check(store, table, incoming)?.passed())
    }

    /// Repair the stored table to agree with `incoming` and rewrite the
    /// symbol's coverage in the catalog. `last_update` is left as it was.
    pub fn resync<S: TableStore + ?Sized>(
        &self,
        store: &mut S,
        catalog: &MasterCatalog,
        table: &PriceTable,
        incoming: &PriceSeries,
    ) -> KeeperResult<ResyncReport> {
        let min_incoming = incoming.keys().next().copied().unwrap_or(DateKey::UNSET);
        let stored = table.dates(store)?;

        let keep_from = stored.partition_point(|d| *d < min_incoming);
        let (before, remaining) = stored.split_at(keep_from);
        for date in before {
            table.delete(store, *date)?;
        }

        let mut removed = Vec::new();
        let mut overwrites = PriceSeries::new();
        for date in remaining {
            match incoming.get(date) {
                Some(row) => {
                    overwrites.insert(*date, *row);
                }
                None => {
                    table.delete(store, *date)?;
                    removed.push(*date);
                }
            }
        }
        let overwritten = table.upsert(store, &overwrites)?;

        let repaired = table.dates(store)?;
        let previous = catalog.get(store, table.symbol())?.unwrap_or_default();
        let record = MasterRecord {
            last_update: previous.last_update,
            first_date: repaired.first().copied().unwrap_or(DateKey::UNSET),
            last_date: repaired.last().copied().unwrap_or(DateKey::UNSET),
            data_points: repaired.len() as u64,
        };
        catalog.upsert(store, table.symbol(), &record)?;

        info!(
            symbol = table.symbol(),
            trimmed = before.len(),
            removed = removed.len(),
            overwritten,
            data_points = record.data_points,
            "resynced price history"
        );

        Ok(ResyncReport {
            trimmed: before.to_vec(),
            removed,
            overwritten,
            record,
        })
    }
}
