//! Context for dispatching rule evaluation.

use chrono::NaiveDate;

/// State passed to dispatching rules.
///
/// Due-date rules measure deadlines in days from `reference_date`,
/// normally the first day of the planning range.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    /// Day deadlines are measured from.
    pub reference_date: NaiveDate,
}

impl DispatchContext {
    /// Creates a context anchored at `reference_date`.
    pub fn on(reference_date: NaiveDate) -> Self {
        Self { reference_date }
    }

    /// Days from the reference date to `date` (negative if earlier).
    pub fn days_until(&self, date: NaiveDate) -> i64 {
        (date - self.reference_date).num_days()
    }
}
