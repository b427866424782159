//! Criterion benchmarks for PriceKeeper hot paths.
//!
//! Benchmarks:
//! 1. Spot-check sampling against a stored history
//! 2. Daily incremental update (one new row on a long history)
//! 3. Resync of a fully recalculated history
//! 4. Range query over a stored history

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use pricekeeper_core::store::MemoryStore;
use pricekeeper_core::{
    DateKey, DateRange, FixedClock, KeeperConfig, MasterCatalog, PriceKeeper, PriceRow,
    PriceSeries, PriceTable, ReconciliationEngine, SkipPolicy, SpotCheckConfig,
};

const DAY: i64 = 86_400;
const SIZES: [usize; 3] = [252, 1260, 5040];

// ── Helpers ──────────────────────────────────────────────────────────

fn make_series(n: usize, scale: f64) -> PriceSeries {
    let base = DateKey::from_date(chrono::NaiveDate::from_ymd_opt(2005, 1, 3).unwrap());
    (0..n)
        .map(|i| {
            let close = (100.0 + (i as f64 * 0.1).sin() * 10.0) * scale;
            (
                DateKey(base.as_i64() + i as i64 * DAY),
                PriceRow {
                    open: close - 0.3,
                    high: close + 1.5,
                    low: close - 1.5,
                    close,
                    adj_close: close,
                    volume: 1_000_000 + (i as i64 % 500_000),
                },
            )
        })
        .collect()
}

fn config() -> KeeperConfig {
    KeeperConfig {
        spot_check: SpotCheckConfig {
            seed: Some(42),
            ..SpotCheckConfig::default()
        },
        ..KeeperConfig::default()
    }
}

fn loaded_store(series: &PriceSeries) -> (MemoryStore, MasterCatalog, PriceTable) {
    let mut store = MemoryStore::new();
    let catalog = MasterCatalog::default();
    catalog.ensure(&mut store).unwrap();
    let table = PriceTable::for_symbol("BENCH");
    table.create(&mut store).unwrap();
    table.upsert(&mut store, series).unwrap();
    (store, catalog, table)
}

fn loaded_keeper(series: &PriceSeries) -> PriceKeeper<MemoryStore, FixedClock> {
    let mut keeper =
        PriceKeeper::with_store(MemoryStore::new(), &config(), FixedClock(DateKey(0))).unwrap();
    keeper
        .update("BENCH", series, SkipPolicy::Force)
        .unwrap();
    keeper
}

// ── 1. Spot-check ────────────────────────────────────────────────────

fn bench_spot_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("spot_check");

    for &n in &SIZES {
        let stored = make_series(n, 1.0);
        let (store, _, table) = loaded_store(&stored);
        let mut engine = ReconciliationEngine::new(&config().spot_check);

        group.bench_with_input(BenchmarkId::new("matching", n), &n, |b, _| {
            b.iter(|| {
                engine
                    .spot_check(black_box(&store), &table, black_box(&stored))
                    .unwrap()
            });
        });
    }

    group.finish();
}

// ── 2. Incremental update ────────────────────────────────────────────

fn bench_daily_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("daily_update");

    for &n in &SIZES {
        let history = make_series(n, 1.0);
        let next_day = make_series(n + 1, 1.0);

        group.bench_with_input(BenchmarkId::new("append_one", n), &n, |b, _| {
            b.iter_batched(
                || loaded_keeper(&history),
                |mut keeper| {
                    keeper
                        .update("BENCH", black_box(&next_day), SkipPolicy::Force)
                        .unwrap()
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

// ── 3. Resync ────────────────────────────────────────────────────────

fn bench_resync(c: &mut Criterion) {
    let mut group = c.benchmark_group("resync");

    for &n in &SIZES {
        let stored = make_series(n, 1.0);
        // Drop the first tenth and recompute everything else.
        let recalculated: PriceSeries = make_series(n, 0.5).into_iter().skip(n / 10).collect();
        let engine = ReconciliationEngine::new(&config().spot_check);

        group.bench_with_input(BenchmarkId::new("full_recalc", n), &n, |b, _| {
            b.iter_batched(
                || loaded_store(&stored),
                |(mut store, catalog, table)| {
                    engine
                        .resync(&mut store, &catalog, &table, black_box(&recalculated))
                        .unwrap()
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

// ── 4. Range query ───────────────────────────────────────────────────

fn bench_range_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_query");

    for &n in &SIZES {
        let stored = make_series(n, 1.0);
        let (store, _, table) = loaded_store(&stored);
        let keys: Vec<DateKey> = stored.keys().copied().collect();
        let window = DateRange::between(Some(keys[n / 4]), Some(keys[n / 2]));

        group.bench_with_input(BenchmarkId::new("quarter_window", n), &n, |b, _| {
            b.iter(|| table.query(black_box(&store), window).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_spot_check,
    bench_daily_update,
    bench_resync,
    bench_range_query
);
criterion_main!(benches);
