//! Source of "today" for skip-if-updated decisions.

use crate::domain::DateKey;

pub trait Clock {
    /// Current calendar day as a [`DateKey`].
    fn today(&self) -> DateKey;
}

/// Today in the machine's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> DateKey {
        DateKey::from_date(chrono::Local::now().date_naive())
    }
}

/// A clock frozen on one day. Tests advance it by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateKey);

impl FixedClock {
    pub fn advance_days(&mut self, days: i64) {
        self.0 = DateKey(self.0 .0 + days * 86_400);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> DateKey {
        self.0
    }
}
