//! PriceKeeper Core: per-symbol daily price tables kept in sync with
//! externally sourced series.
//!
//! This crate contains:
//! - Domain types (date keys, OHLCV rows, catalog records)
//! - The table-store contract with in-memory and Parquet backends
//! - Typed handles for the master catalog and per-symbol price tables
//! - Spot-check validation and resync repair of recalculated history
//! - The update coordinator tying them into one transaction per call

pub mod catalog;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod import;
pub mod keeper;
pub mod price_table;
pub mod reconcile;
pub mod store;

pub use catalog::{CatalogSnapshot, MasterCatalog};
pub use clock::{Clock, FixedClock, LocalClock};
pub use config::{ConfigError, KeeperConfig, SpotCheckConfig, ADJ_CLOSE_DECIMALS};
pub use domain::{DateKey, MasterRecord, PriceRow, PriceSeries};
pub use error::{KeeperError, KeeperResult};
pub use keeper::{AppliedUpdate, PriceKeeper, SkipPolicy, UpdateOutcome};
pub use price_table::{DateRange, PriceTable};
pub use reconcile::{ReconciliationEngine, ResyncReport, SpotCheck};
