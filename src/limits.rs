//! Hard limits. These bound memory per engine and keep WAL records small;
//! exceeding any of them surfaces as `EngineError::LimitExceeded`.

use chrono::NaiveDate;

pub const MAX_VENUES: usize = 100_000;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_LOCATION_LEN: usize = 256;
pub const MAX_EMAIL_LEN: usize = 256;

/// Cap on blocked dates held per venue (calendar entries).
pub const MAX_BLOCKED_DATES_PER_VENUE: usize = 10_000;

/// Cap on booking records held per venue (confirmed + cancelled).
pub const MAX_BOOKINGS_PER_VENUE: usize = 50_000;

/// Cap on the block/unblock lists of a single availability update.
pub const MAX_BULK_DATES: usize = 1_000;

/// A single booking covers at most one day of hours.
pub const MAX_HOURS_PER_BOOKING: u32 = 24;

/// Cap on the `limit` argument of recent-bookings queries.
pub const MAX_RECENT_BOOKINGS_LIMIT: usize = 1_000;

/// Accepted booking-date window: [2000-01-01, 2200-01-01).
pub fn min_valid_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid constant date")
}

pub fn max_valid_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2200, 1, 1).expect("valid constant date")
}
