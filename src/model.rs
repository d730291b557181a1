use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::calendar::AvailabilityCalendar;

/// Unix milliseconds — the only wall-clock type. Booking dates are
/// calendar dates (`NaiveDate`) with no time component.
pub type Ms = i64;

/// Venue lifecycle. A retired venue is excluded from listings and from
/// booking eligibility but stays resolvable for its historical bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VenueStatus {
    Active,
    Retired,
}

impl VenueStatus {
    pub fn is_active(self) -> bool {
        matches!(self, VenueStatus::Active)
    }
}

/// Confirmed is the sole initial state; Cancelled is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub venue_id: Ulid,
    pub user_name: String,
    pub user_email: String,
    pub booking_date: NaiveDate,
    pub hours_booked: u32,
    pub status: BookingStatus,
    /// price_per_hour × hours_booked, locked in at creation. Never
    /// recomputed, even if the venue's pricing changes afterwards.
    pub total_cost: f64,
    pub created_at: Ms,
}

impl Booking {
    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

#[derive(Debug, Clone)]
pub struct VenueState {
    pub id: Ulid,
    pub name: String,
    pub location: String,
    pub capacity: u32,
    pub price_per_hour: f64,
    pub created_by: String,
    pub status: VenueStatus,
    /// Blocked-date set — the availability calendar.
    pub calendar: AvailabilityCalendar,
    /// All bookings for this venue, sorted by `booking_date`.
    pub bookings: Vec<Booking>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl VenueState {
    pub fn new(
        id: Ulid,
        name: String,
        location: String,
        capacity: u32,
        price_per_hour: f64,
        created_by: String,
        created_at: Ms,
    ) -> Self {
        Self {
            id,
            name,
            location,
            capacity,
            price_per_hour,
            created_by,
            status: VenueStatus::Active,
            calendar: AvailabilityCalendar::new(),
            bookings: Vec::new(),
            created_at,
            updated_at: created_at,
        }
    }

    /// True iff the venue is active and the date is not blocked.
    /// Booking records are not consulted here — that is the conflict
    /// guard's job.
    pub fn is_available_on(&self, date: NaiveDate) -> bool {
        self.status.is_active() && !self.calendar.contains(date)
    }

    /// Insert a booking maintaining sort order by `booking_date`.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.booking_date, |b| b.booking_date)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    /// Remove a booking by id.
    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        if let Some(pos) = self.bookings.iter().position(|b| b.id == id) {
            Some(self.bookings.remove(pos))
        } else {
            None
        }
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// The confirmed booking on `date`, if any. Uses binary search to
    /// jump to the equal-date run; cancelled bookings are skipped.
    pub fn confirmed_on(&self, date: NaiveDate) -> Option<&Booking> {
        let start = self.bookings.partition_point(|b| b.booking_date < date);
        self.bookings[start..]
            .iter()
            .take_while(|b| b.booking_date == date)
            .find(|b| b.is_confirmed())
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    VenueCreated {
        id: Ulid,
        name: String,
        location: String,
        capacity: u32,
        price_per_hour: f64,
        created_by: String,
        created_at: Ms,
    },
    VenueUpdated {
        id: Ulid,
        name: String,
        location: String,
        capacity: u32,
        price_per_hour: f64,
        updated_at: Ms,
    },
    VenueRetired {
        id: Ulid,
        updated_at: Ms,
    },
    /// Bulk calendar update. Application computes the new blocked set as
    /// (existing ∪ block_dates) ∖ unblock_dates in one step.
    AvailabilityUpdated {
        venue_id: Ulid,
        block_dates: Vec<NaiveDate>,
        unblock_dates: Vec<NaiveDate>,
        updated_at: Ms,
    },
    /// One record for the whole booking commit: applying it inserts the
    /// confirmed booking AND blocks the date on the venue's calendar.
    BookingCreated {
        id: Ulid,
        venue_id: Ulid,
        user_name: String,
        user_email: String,
        booking_date: NaiveDate,
        hours_booked: u32,
        total_cost: f64,
        created_at: Ms,
    },
    BookingUpdated {
        id: Ulid,
        venue_id: Ulid,
        user_name: String,
        user_email: String,
        hours_booked: u32,
    },
    BookingCancelled {
        id: Ulid,
        venue_id: Ulid,
    },
    BookingDeleted {
        id: Ulid,
        venue_id: Ulid,
    },
}

/// Extract the venue id from an event (None for VenueCreated, which is
/// handled at the map level during replay).
pub fn event_venue_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::VenueUpdated { id, .. } | Event::VenueRetired { id, .. } => Some(*id),
        Event::AvailabilityUpdated { venue_id, .. }
        | Event::BookingCreated { venue_id, .. }
        | Event::BookingUpdated { venue_id, .. }
        | Event::BookingCancelled { venue_id, .. }
        | Event::BookingDeleted { venue_id, .. } => Some(*venue_id),
        Event::VenueCreated { .. } => None,
    }
}

// ── Query result types ───────────────────────────────────────────

/// Venue projection handed to callers — bookings are reached through
/// the booking queries, not carried here.
#[derive(Debug, Clone, PartialEq)]
pub struct VenueInfo {
    pub id: Ulid,
    pub name: String,
    pub location: String,
    pub capacity: u32,
    pub price_per_hour: f64,
    pub created_by: String,
    pub status: VenueStatus,
    /// Blocked dates in ascending order.
    pub unavailable_dates: Vec<NaiveDate>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl VenueInfo {
    pub fn from_state(vs: &VenueState) -> Self {
        Self {
            id: vs.id,
            name: vs.name.clone(),
            location: vs.location.clone(),
            capacity: vs.capacity,
            price_per_hour: vs.price_per_hour,
            created_by: vs.created_by.clone(),
            status: vs.status,
            unavailable_dates: vs.calendar.dates(),
            created_at: vs.created_at,
            updated_at: vs.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn venue() -> VenueState {
        VenueState::new(
            Ulid::new(),
            "Grand Palace".into(),
            "Riverside".into(),
            200,
            100.0,
            "owner@example.com".into(),
            1_000,
        )
    }

    fn booking(venue_id: Ulid, d: NaiveDate, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            venue_id,
            user_name: "Alice".into(),
            user_email: "a@x.com".into(),
            booking_date: d,
            hours_booked: 2,
            status,
            total_cost: 200.0,
            created_at: 1_000,
        }
    }

    #[test]
    fn bookings_stay_sorted_by_date() {
        let mut vs = venue();
        let vid = vs.id;
        vs.insert_booking(booking(vid, date(2025, 9, 3), BookingStatus::Confirmed));
        vs.insert_booking(booking(vid, date(2025, 9, 1), BookingStatus::Confirmed));
        vs.insert_booking(booking(vid, date(2025, 9, 2), BookingStatus::Confirmed));
        let dates: Vec<_> = vs.bookings.iter().map(|b| b.booking_date).collect();
        assert_eq!(
            dates,
            vec![date(2025, 9, 1), date(2025, 9, 2), date(2025, 9, 3)]
        );
    }

    #[test]
    fn confirmed_on_skips_cancelled() {
        let mut vs = venue();
        let vid = vs.id;
        let d = date(2025, 9, 1);
        vs.insert_booking(booking(vid, d, BookingStatus::Cancelled));
        assert!(vs.confirmed_on(d).is_none());

        let live = booking(vid, d, BookingStatus::Confirmed);
        let live_id = live.id;
        vs.insert_booking(live);
        assert_eq!(vs.confirmed_on(d).unwrap().id, live_id);
    }

    #[test]
    fn confirmed_on_exact_date_only() {
        let mut vs = venue();
        let vid = vs.id;
        vs.insert_booking(booking(vid, date(2025, 9, 1), BookingStatus::Confirmed));
        assert!(vs.confirmed_on(date(2025, 9, 2)).is_none());
        assert!(vs.confirmed_on(date(2025, 8, 31)).is_none());
    }

    #[test]
    fn remove_booking_by_id() {
        let mut vs = venue();
        let vid = vs.id;
        let b = booking(vid, date(2025, 9, 1), BookingStatus::Confirmed);
        let id = b.id;
        vs.insert_booking(b);
        assert!(vs.remove_booking(id).is_some());
        assert!(vs.bookings.is_empty());
        assert!(vs.remove_booking(id).is_none());
    }

    #[test]
    fn availability_requires_active_and_unblocked() {
        let mut vs = venue();
        let d = date(2025, 7, 25);
        assert!(vs.is_available_on(d));

        vs.calendar.block(d);
        assert!(!vs.is_available_on(d));
        assert!(vs.is_available_on(date(2025, 7, 26)));

        vs.status = VenueStatus::Retired;
        assert!(!vs.is_available_on(date(2025, 7, 26)));
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingCreated {
            id: Ulid::new(),
            venue_id: Ulid::new(),
            user_name: "Alice".into(),
            user_email: "a@x.com".into(),
            booking_date: date(2025, 9, 1),
            hours_booked: 4,
            total_cost: 4000.0,
            created_at: 1_000,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
