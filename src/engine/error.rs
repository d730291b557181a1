use chrono::NaiveDate;
use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    /// The referenced venue id does not exist (booking path).
    VenueNotFound(Ulid),
    /// Venue is retired or the requested date is in its blocked-date set.
    VenueUnavailable { venue_id: Ulid, date: NaiveDate },
    /// A confirmed booking already exists for this venue and date.
    DoubleBooking {
        venue_id: Ulid,
        date: NaiveDate,
        existing: Ulid,
    },
    /// Generic lookup failure (bookings, retired venues).
    NotFound(Ulid),
    InvalidInput(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::VenueNotFound(id) => write!(f, "venue not found: {id}"),
            EngineError::VenueUnavailable { venue_id, date } => {
                write!(f, "venue {venue_id} is not available on {date}")
            }
            EngineError::DoubleBooking {
                venue_id,
                date,
                existing,
            } => {
                write!(
                    f,
                    "venue {venue_id} is already booked on {date} (booking {existing})"
                )
            }
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
