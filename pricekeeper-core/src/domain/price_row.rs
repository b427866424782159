//! PriceRow: one day of OHLCV data for a symbol.

use super::DateKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// OHLCV payload for a single symbol on a single day.
///
/// The date is not stored on the row; it is the key of the [`PriceSeries`]
/// holding it. `adj_close` is the field providers recalculate after splits
/// and dividends, so it is the one the spot-check compares.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: i64,
}

/// Date-ordered OHLCV rows. Used both for caller input and query results.
pub type PriceSeries = BTreeMap<DateKey, PriceRow>;

/// Earliest and latest dates of a series, or `None` when empty.
pub fn date_span(series: &PriceSeries) -> Option<(DateKey, DateKey)> {
    let first = series.keys().next()?;
    let last = series.keys().next_back()?;
    Some((*first, *last))
}
