use chrono::NaiveDate;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as Ms
}

pub(crate) fn validate_date(date: NaiveDate) -> Result<(), EngineError> {
    if date < min_valid_date() || date >= max_valid_date() {
        return Err(EngineError::InvalidInput("date out of supported range"));
    }
    Ok(())
}

pub(crate) fn validate_booking_fields(
    user_name: &str,
    user_email: &str,
    hours_booked: u32,
) -> Result<(), EngineError> {
    if hours_booked == 0 {
        return Err(EngineError::InvalidInput("hours_booked must be positive"));
    }
    if hours_booked > MAX_HOURS_PER_BOOKING {
        return Err(EngineError::LimitExceeded("too many hours in one booking"));
    }
    if user_name.is_empty() {
        return Err(EngineError::InvalidInput("user name must not be empty"));
    }
    if user_email.is_empty() {
        return Err(EngineError::InvalidInput("user email must not be empty"));
    }
    if user_name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("user name too long"));
    }
    if user_email.len() > MAX_EMAIL_LEN {
        return Err(EngineError::LimitExceeded("user email too long"));
    }
    Ok(())
}

pub(crate) fn validate_venue_fields(
    name: &str,
    location: &str,
    capacity: u32,
    price_per_hour: f64,
) -> Result<(), EngineError> {
    if name.is_empty() {
        return Err(EngineError::InvalidInput("venue name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("venue name too long"));
    }
    if location.len() > MAX_LOCATION_LEN {
        return Err(EngineError::LimitExceeded("venue location too long"));
    }
    if capacity == 0 {
        return Err(EngineError::InvalidInput("capacity must be positive"));
    }
    if !(price_per_hour > 0.0 && price_per_hour.is_finite()) {
        return Err(EngineError::InvalidInput("price_per_hour must be positive"));
    }
    Ok(())
}

/// The hard invariant lives here: no two confirmed bookings for the same
/// venue and date. Caller holds the venue's write lock, so a pass here
/// stays valid through the commit.
///
/// The booking check runs before the calendar check: a date occupied by a
/// confirmed booking is also blocked on the calendar, and the guard
/// reports the more specific `DoubleBooking` for it.
pub(crate) fn check_booking_conflict(
    vs: &VenueState,
    date: NaiveDate,
) -> Result<(), EngineError> {
    if !vs.status.is_active() {
        return Err(EngineError::VenueUnavailable {
            venue_id: vs.id,
            date,
        });
    }
    if let Some(existing) = vs.confirmed_on(date) {
        return Err(EngineError::DoubleBooking {
            venue_id: vs.id,
            date,
            existing: existing.id,
        });
    }
    if vs.calendar.contains(date) {
        return Err(EngineError::VenueUnavailable {
            venue_id: vs.id,
            date,
        });
    }
    Ok(())
}
