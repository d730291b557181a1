//! venued — an in-memory venue booking engine with write-ahead-log
//! durability.
//!
//! Venues carry an availability calendar of blocked dates; bookings are
//! admitted through a per-venue conflict guard so a (venue, date) slot
//! can hold at most one confirmed booking. Every accepted mutation is
//! fsynced to the WAL (group-committed) before it becomes visible.

pub mod calendar;
pub mod engine;
pub mod limits;
pub mod maintenance;
pub mod model;
pub mod observability;
pub mod wal;

pub use engine::{Engine, EngineError};
pub use model::{Booking, BookingStatus, VenueInfo, VenueStatus};
