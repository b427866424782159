//! Property tests for update invariants.
//!
//! Uses proptest to verify:
//! 1. Same-day idempotence: a second update on the same day changes nothing
//! 2. Append-only growth: extending a consistent series never rewrites history
//! 3. Catalog consistency: the master row always matches the stored table
//! 4. Resync convergence: after a recalculated series, shared dates carry
//!    the new values and stale dates are gone
//! 5. Range queries return exactly the stored dates inside the bounds

use pricekeeper_core::store::MemoryStore;
use pricekeeper_core::{
    DateKey, FixedClock, KeeperConfig, PriceKeeper, PriceRow, PriceSeries, SkipPolicy,
    SpotCheckConfig, UpdateOutcome,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

const DAY: i64 = 86_400;
const TODAY: i64 = 30_000;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_days() -> impl Strategy<Value = BTreeSet<i64>> {
    prop::collection::btree_set(1..400_i64, 0..60)
}

fn arb_nonempty_days() -> impl Strategy<Value = BTreeSet<i64>> {
    prop::collection::btree_set(1..400_i64, 1..60)
}

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

// ── Helpers ──────────────────────────────────────────────────────────

fn row(adj: f64) -> PriceRow {
    PriceRow {
        open: adj,
        high: adj + 1.0,
        low: adj - 1.0,
        close: adj,
        adj_close: adj,
        volume: 100,
    }
}

/// adj_close is `base + day`, so two series with different bases disagree
/// on every shared date.
fn series(days: &BTreeSet<i64>, base: f64) -> PriceSeries {
    days.iter()
        .map(|&d| (DateKey(d * DAY), row(base + d as f64)))
        .collect()
}

fn keeper(seed: u64) -> PriceKeeper<MemoryStore, FixedClock> {
    let config = KeeperConfig {
        spot_check: SpotCheckConfig {
            seed: Some(seed),
            ..SpotCheckConfig::default()
        },
        ..KeeperConfig::default()
    };
    PriceKeeper::with_store(MemoryStore::new(), &config, FixedClock(DateKey(TODAY * DAY)))
        .unwrap()
}

fn assert_catalog_matches_table(
    keeper: &mut PriceKeeper<MemoryStore, FixedClock>,
    symbol: &str,
) -> Result<(), TestCaseError> {
    let stored = keeper.query_price(symbol, None, None).unwrap();
    let record = keeper.query_master_info(symbol).unwrap();
    prop_assert!(record.is_consistent());
    prop_assert_eq!(record.data_points, stored.len() as u64);
    if let (Some(first), Some(last)) = (stored.keys().next(), stored.keys().next_back()) {
        prop_assert_eq!(record.first_date, *first);
        prop_assert_eq!(record.last_date, *last);
    }
    Ok(())
}

// ── 1. Same-day idempotence ──────────────────────────────────────────

proptest! {
    #[test]
    fn same_day_update_is_noop(
        first in arb_days(),
        second in arb_days(),
        base in arb_price(),
        seed in any::<u64>(),
    ) {
        let mut keeper = keeper(seed);
        keeper.update("SPY", &series(&first, base), SkipPolicy::default()).unwrap();
        let before = keeper.store().committed().clone();
        let commits = keeper.store().commit_count();

        let outcome = keeper
            .update("SPY", &series(&second, base + 7.0), SkipPolicy::default())
            .unwrap();

        prop_assert!(outcome.was_skipped());
        prop_assert_eq!(keeper.store().commit_count(), commits);
        prop_assert_eq!(keeper.store().committed(), &before);
    }
}

// ── 2-3. Append-only growth and catalog consistency ─────────────────

proptest! {
    #[test]
    fn extending_series_only_appends(
        days in arb_days(),
        extra in 1..30_i64,
        base in arb_price(),
        seed in any::<u64>(),
    ) {
        let mut keeper = keeper(seed);
        let initial = series(&days, base);
        keeper.update("SPY", &initial, SkipPolicy::default()).unwrap();

        let last = days.iter().next_back().copied().unwrap_or(0);
        let mut extended_days = days.clone();
        extended_days.extend(last + 1..=last + extra);
        let extended = series(&extended_days, base);

        keeper.clock_mut().advance_days(1);
        let outcome = keeper.update("SPY", &extended, SkipPolicy::default()).unwrap();
        let record = *outcome.record();

        // History agrees, so no resync and nothing but the new tail is written.
        prop_assert_eq!(keeper.query_price("SPY", None, None).unwrap(), extended);
        if !days.is_empty() {
            prop_assert_eq!(record.data_points, days.len() as u64 + extra as u64);
        }
        assert_catalog_matches_table(&mut keeper, "SPY")?;
    }
}

// ── 4. Resync convergence ────────────────────────────────────────────

proptest! {
    /// Incoming series stay within the spot-check sample size, so every
    /// shared date is compared.
    #[test]
    fn recalculated_series_replaces_overlap(
        old_days in arb_nonempty_days(),
        new_days in prop::collection::btree_set(1..400_i64, 1..=20),
        seed in any::<u64>(),
    ) {
        let mut keeper = keeper(seed);
        let old = series(&old_days, 0.0);
        keeper.update("SPY", &old, SkipPolicy::default()).unwrap();

        keeper.clock_mut().advance_days(1);
        let fresh = series(&new_days, 1_000.0);
        let outcome = keeper.update("SPY", &fresh, SkipPolicy::default()).unwrap();
        let stored = keeper.query_price("SPY", None, None).unwrap();

        let shared: BTreeSet<i64> = old_days.intersection(&new_days).copied().collect();
        let expected: PriceSeries = match shared.iter().next_back() {
            // Mismatch on the overlap: the survivors take the fresh values,
            // then fresh dates past the last survivor are appended.
            Some(&last_shared) => {
                let UpdateOutcome::Applied(applied) = &outcome else {
                    return Err(TestCaseError::fail("update was skipped"));
                };
                prop_assert!(applied.resync.is_some());
                fresh
                    .iter()
                    .filter(|(d, _)| {
                        let day = d.as_i64() / DAY;
                        shared.contains(&day) || day > last_shared
                    })
                    .map(|(d, r)| (*d, *r))
                    .collect()
            }
            // Nothing to compare: the check passes and only dates past the
            // old last date are appended.
            None => {
                let old_last = *old_days.iter().next_back().unwrap();
                let mut expected = old.clone();
                expected.extend(
                    fresh
                        .range(DateKey((old_last + 1) * DAY)..)
                        .map(|(d, r)| (*d, *r)),
                );
                expected
            }
        };
        prop_assert_eq!(stored, expected);
        assert_catalog_matches_table(&mut keeper, "SPY")?;
    }
}

// ── 5. Range queries ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn range_query_matches_filter(
        days in arb_days(),
        start in prop::option::of(0..420_i64),
        end in prop::option::of(0..420_i64),
    ) {
        let mut keeper = keeper(0);
        let full = series(&days, 50.0);
        keeper.update("SPY", &full, SkipPolicy::default()).unwrap();

        let start_key = start.map(|d| DateKey(d * DAY));
        let end_key = end.map(|d| DateKey(d * DAY));
        let got = keeper.query_price("SPY", start_key, end_key).unwrap();

        let expected: PriceSeries = full
            .iter()
            .filter(|(d, _)| start_key.map_or(true, |s| **d >= s))
            .filter(|(d, _)| end_key.map_or(true, |e| **d <= e))
            .map(|(d, r)| (*d, *r))
            .collect();
        prop_assert_eq!(got, expected);
    }
}
