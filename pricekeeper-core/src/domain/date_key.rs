//! DateKey: the day-granularity key shared by price tables and the catalog.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

const SECONDS_PER_DAY: i64 = 86_400;

/// Seconds since the Unix epoch at UTC midnight of a calendar day.
///
/// `DateKey(0)` doubles as "unset" in [`MasterRecord`](super::MasterRecord)
/// fields, which matches the epoch itself; no market data predates 1970 in
/// practice, so the overlap is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateKey(pub i64);

impl DateKey {
    pub const UNSET: DateKey = DateKey(0);

    /// Key for a calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        let epoch = DateTime::UNIX_EPOCH.date_naive();
        DateKey((date - epoch).num_days() * SECONDS_PER_DAY)
    }

    /// Floor an arbitrary Unix timestamp (seconds) to its day.
    pub fn truncate(seconds: i64) -> Self {
        DateKey(seconds - seconds.rem_euclid(SECONDS_PER_DAY))
    }

    /// Calendar date for this key, if representable.
    pub fn to_date(self) -> Option<NaiveDate> {
        DateTime::from_timestamp(self.0, 0).map(|dt| dt.date_naive())
    }

    pub fn is_unset(self) -> bool {
        self.0 == 0
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        DateKey::from_date(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_date() {
            Some(date) if self.0 % SECONDS_PER_DAY == 0 => write!(f, "{date}"),
            _ => write!(f, "{}", self.0),
        }
    }
}
