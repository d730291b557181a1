use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Availability Calendar ──────────────────────────────────────────

/// Per-venue set of blocked dates. Dates are compared purely on
/// calendar-date equality; the set holds no duplicates by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityCalendar {
    blocked: BTreeSet<NaiveDate>,
}

impl AvailabilityCalendar {
    pub fn new() -> Self {
        Self {
            blocked: BTreeSet::new(),
        }
    }

    pub fn from_dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            blocked: dates.into_iter().collect(),
        }
    }

    /// Pure query, no side effects.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.blocked.contains(&date)
    }

    /// Add a date to the blocked set. No-op if already present.
    pub fn block(&mut self, date: NaiveDate) {
        self.blocked.insert(date);
    }

    /// Remove a date from the blocked set. No-op if absent.
    pub fn unblock(&mut self, date: NaiveDate) {
        self.blocked.remove(&date);
    }

    /// Apply a bulk update, returning a NEW calendar:
    /// (existing ∪ block_dates) ∖ unblock_dates, computed in one step so
    /// no order-dependent partial state is ever observable. A date named
    /// in both lists ends up unblocked.
    pub fn bulk(&self, block_dates: &[NaiveDate], unblock_dates: &[NaiveDate]) -> Self {
        let mut next: BTreeSet<NaiveDate> = self.blocked.clone();
        next.extend(block_dates.iter().copied());
        for d in unblock_dates {
            next.remove(d);
        }
        Self { blocked: next }
    }

    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }

    /// Blocked dates in ascending order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.blocked.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
    }

    #[test]
    fn block_is_idempotent() {
        let mut cal = AvailabilityCalendar::new();
        cal.block(d(25));
        let once = cal.clone();
        cal.block(d(25));
        assert_eq!(cal, once);
        assert_eq!(cal.len(), 1);
    }

    #[test]
    fn unblock_is_idempotent() {
        let mut cal = AvailabilityCalendar::from_dates([d(25)]);
        cal.unblock(d(25));
        let once = cal.clone();
        cal.unblock(d(25));
        assert_eq!(cal, once);
        assert!(cal.is_empty());
    }

    #[test]
    fn unblock_absent_is_noop() {
        let mut cal = AvailabilityCalendar::from_dates([d(1)]);
        cal.unblock(d(2));
        assert_eq!(cal.dates(), vec![d(1)]);
    }

    #[test]
    fn bulk_unions_then_subtracts() {
        let cal = AvailabilityCalendar::from_dates([d(1), d(2)]);
        let next = cal.bulk(&[d(2), d(3), d(4)], &[d(1), d(4)]);
        assert_eq!(next.dates(), vec![d(2), d(3)]);
        // original is untouched (replace-on-write)
        assert_eq!(cal.dates(), vec![d(1), d(2)]);
    }

    #[test]
    fn bulk_unblock_wins_for_date_in_both_lists() {
        let cal = AvailabilityCalendar::new();
        let next = cal.bulk(&[d(10)], &[d(10)]);
        assert!(!next.contains(d(10)));
    }

    #[test]
    fn bulk_unblock_wins_even_if_already_blocked() {
        let cal = AvailabilityCalendar::from_dates([d(10)]);
        let next = cal.bulk(&[d(10)], &[d(10)]);
        assert!(!next.contains(d(10)));
    }

    #[test]
    fn bulk_empty_lists_are_noops() {
        let cal = AvailabilityCalendar::from_dates([d(5)]);
        let next = cal.bulk(&[], &[]);
        assert_eq!(next, cal);
    }

    #[test]
    fn from_dates_dedupes() {
        let cal = AvailabilityCalendar::from_dates([d(7), d(7), d(7)]);
        assert_eq!(cal.len(), 1);
    }

    #[test]
    fn dates_are_sorted() {
        let cal = AvailabilityCalendar::from_dates([d(20), d(3), d(11)]);
        assert_eq!(cal.dates(), vec![d(3), d(11), d(20)]);
    }
}
