//! MasterRecord: per-symbol sync metadata held in the master catalog.

use super::DateKey;
use serde::{Deserialize, Serialize};

/// Sync state and date coverage of one symbol's price table.
///
/// Invariant: `first_date` and `last_date` are both unset exactly when
/// `data_points == 0`; otherwise `first_date <= last_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MasterRecord {
    /// Day of the last applied update (unset = never).
    pub last_update: DateKey,
    pub first_date: DateKey,
    pub last_date: DateKey,
    pub data_points: u64,
}

impl MasterRecord {
    /// The all-zero record written when a symbol is first seen.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_consistent(&self) -> bool {
        let unset = self.first_date.is_unset() && self.last_date.is_unset();
        if self.data_points == 0 {
            unset
        } else {
            !unset && self.first_date <= self.last_date
        }
    }

    /// Stored date range, when any rows are stored.
    pub fn coverage(&self) -> Option<(DateKey, DateKey)> {
        (self.data_points > 0).then_some((self.first_date, self.last_date))
    }

    pub fn updated_on(&self, day: DateKey) -> bool {
        !self.last_update.is_unset() && self.last_update == day
    }
}
