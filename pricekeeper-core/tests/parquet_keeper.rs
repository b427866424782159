//! The keeper over the file-backed store: state survives reopening and
//! tampered files are refused.

use pricekeeper_core::store::{ColumnDef, ColumnType, ParquetStore, TableStore};
use pricekeeper_core::{
    DateKey, FixedClock, KeeperConfig, KeeperError, MasterRecord, PriceKeeper, PriceRow,
    PriceSeries, SkipPolicy,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const DAY: i64 = 86_400;

fn series(days: std::ops::RangeInclusive<i64>, scale: f64) -> PriceSeries {
    days.map(|d| {
        let px = d as f64 * scale;
        (
            DateKey(d * DAY),
            PriceRow {
                open: px,
                high: px + 1.5,
                low: px - 1.5,
                close: px + 0.25,
                adj_close: px,
                volume: 5_000 + d,
            },
        )
    })
    .collect()
}

fn open_keeper(dir: &Path, today: i64) -> PriceKeeper<ParquetStore, FixedClock> {
    let config = KeeperConfig::default().with_store_dir(dir);
    let store = ParquetStore::open(&config.store_dir).unwrap();
    PriceKeeper::with_store(store, &config, FixedClock(DateKey(today * DAY))).unwrap()
}

#[test]
fn committed_history_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let incoming = series(1..=10, 2.0);
    {
        let mut keeper = open_keeper(tmp.path(), 100);
        keeper
            .update("BRK.B", &incoming, SkipPolicy::default())
            .unwrap();
    }

    let mut keeper = open_keeper(tmp.path(), 100);
    assert_eq!(keeper.query_price("BRK.B", None, None).unwrap(), incoming);
    assert_eq!(
        keeper.query_master_info("BRK.B").unwrap(),
        MasterRecord {
            last_update: DateKey(100 * DAY),
            first_date: DateKey(DAY),
            last_date: DateKey(10 * DAY),
            data_points: 10,
        }
    );

    // Same day after reopening is still a skip.
    let outcome = keeper
        .update("BRK.B", &series(1..=12, 2.0), SkipPolicy::default())
        .unwrap();
    assert!(outcome.was_skipped());
}

#[test]
fn resync_is_persisted() {
    let tmp = TempDir::new().unwrap();
    {
        let mut keeper = open_keeper(tmp.path(), 100);
        keeper
            .update("^GSPC", &series(1..=8, 1.0), SkipPolicy::default())
            .unwrap();
    }
    {
        let mut keeper = open_keeper(tmp.path(), 101);
        let outcome = keeper
            .update("^GSPC", &series(4..=9, 0.5), SkipPolicy::default())
            .unwrap();
        assert!(!outcome.was_skipped());
    }

    let mut keeper = open_keeper(tmp.path(), 101);
    assert_eq!(
        keeper.query_price("^GSPC", None, None).unwrap(),
        series(4..=9, 0.5)
    );
    let record = keeper.query_master_info("^GSPC").unwrap();
    assert_eq!(record.first_date, DateKey(4 * DAY));
    assert_eq!(record.last_date, DateKey(9 * DAY));
    assert_eq!(record.data_points, 6);
}

#[test]
fn uncommitted_writes_are_not_persisted() {
    let tmp = TempDir::new().unwrap();
    {
        let mut store = ParquetStore::open(tmp.path()).unwrap();
        store
            .create_table("scratch", ColumnDef::new("id", ColumnType::Int))
            .unwrap();
        // Dropped without commit.
    }
    let store = ParquetStore::open(tmp.path()).unwrap();
    assert!(!store.has_table("scratch").unwrap());
}

#[test]
fn tampered_table_file_is_quarantined() {
    let tmp = TempDir::new().unwrap();
    {
        let mut keeper = open_keeper(tmp.path(), 100);
        keeper
            .update("SPY", &series(1..=5, 1.0), SkipPolicy::default())
            .unwrap();
    }

    let store = ParquetStore::open(tmp.path()).unwrap();
    let entry = store.manifest().tables["prices/SPY"].clone();
    drop(store);

    let file = tmp.path().join(&entry.file);
    let mut bytes = fs::read(&file).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    fs::write(&file, bytes).unwrap();

    let config = KeeperConfig::default().with_store_dir(tmp.path());
    let err = PriceKeeper::open(&config).err().expect("open should fail");
    assert!(matches!(err, KeeperError::StoreUnavailable(_)));
    assert!(!file.exists());
    assert!(file.with_extension("parquet.quarantined").exists());
}

#[test]
fn failed_commit_leaves_previous_state_readable() {
    let tmp = TempDir::new().unwrap();
    let first = series(1..=5, 1.0);
    let mut keeper = open_keeper(tmp.path(), 100);
    keeper.update("SPY", &first, SkipPolicy::default()).unwrap();

    // A directory where the manifest temp file goes makes the next commit fail
    // after the new table files have been written.
    let blocker = tmp.path().join("manifest.json.tmp");
    fs::create_dir(&blocker).unwrap();
    keeper.clock_mut().advance_days(1);
    let err = keeper
        .update("SPY", &series(1..=8, 1.0), SkipPolicy::default())
        .unwrap_err();
    assert!(matches!(err, KeeperError::StoreUnavailable(_)));
    fs::remove_dir(&blocker).unwrap();

    let mut reopened = open_keeper(tmp.path(), 101);
    assert_eq!(reopened.query_price("SPY", None, None).unwrap(), first);
    let record = reopened.query_master_info("SPY").unwrap();
    assert_eq!(record.last_update, DateKey(100 * DAY));
    assert_eq!(record.data_points, 5);
    drop(reopened);

    // The rolled-back keeper can retry and the retry is durable.
    keeper
        .update("SPY", &series(1..=8, 1.0), SkipPolicy::default())
        .unwrap();
    let mut reopened = open_keeper(tmp.path(), 101);
    assert_eq!(
        reopened.query_price("SPY", None, None).unwrap(),
        series(1..=8, 1.0)
    );
    assert_eq!(reopened.query_master_info("SPY").unwrap().data_points, 8);
}
