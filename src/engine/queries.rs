use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::MAX_RECENT_BOOKINGS_LIMIT;
use crate::model::{Booking, VenueInfo, VenueState};

use super::{Engine, EngineError, SharedVenueState};

impl Engine {
    /// Fetch a single venue. Retired venues are invisible here, same as
    /// in the listings.
    pub async fn get_venue(&self, id: Ulid) -> Result<VenueInfo, EngineError> {
        let vs = self.get_venue_state(&id).ok_or(EngineError::NotFound(id))?;
        let guard = vs.read().await;
        if !guard.status.is_active() {
            return Err(EngineError::NotFound(id));
        }
        Ok(VenueInfo::from_state(&guard))
    }

    /// All active venues, newest first.
    pub async fn list_venues(&self) -> Vec<VenueInfo> {
        self.active_venues(|_| true).await
    }

    /// Active venues whose location contains `query`, case-insensitively.
    pub async fn venues_by_location(&self, query: &str) -> Vec<VenueInfo> {
        let needle = query.to_lowercase();
        self.active_venues(|vs| vs.location.to_lowercase().contains(&needle))
            .await
    }

    /// Active venues with capacity in `[min, max]`.
    pub async fn venues_by_capacity(&self, min: u32, max: u32) -> Vec<VenueInfo> {
        self.active_venues(|vs| (min..=max).contains(&vs.capacity))
            .await
    }

    /// Active venues with hourly price in `[min, max]`.
    pub async fn venues_by_price(&self, min: f64, max: f64) -> Vec<VenueInfo> {
        self.active_venues(|vs| vs.price_per_hour >= min && vs.price_per_hour <= max)
            .await
    }

    /// Quick availability probe; unknown and retired venues read as
    /// unavailable rather than erroring.
    pub async fn is_venue_available(&self, id: Ulid, date: NaiveDate) -> bool {
        match self.get_venue_state(&id) {
            Some(vs) => vs.read().await.is_available_on(date),
            None => false,
        }
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let venue_id = self.venue_for_booking(&id).ok_or(EngineError::NotFound(id))?;
        let vs = self
            .get_venue_state(&venue_id)
            .ok_or(EngineError::NotFound(id))?;
        let guard = vs.read().await;
        guard.booking(id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// All bookings on a venue in date order. An unknown venue yields an
    /// empty list, not an error.
    pub async fn bookings_for_venue(&self, venue_id: Ulid) -> Vec<Booking> {
        match self.get_venue_state(&venue_id) {
            Some(vs) => vs.read().await.bookings.clone(),
            None => Vec::new(),
        }
    }

    /// The most recent bookings across every venue, newest first.
    pub async fn list_recent_bookings(&self, limit: usize) -> Result<Vec<Booking>, EngineError> {
        if limit > MAX_RECENT_BOOKINGS_LIMIT {
            return Err(EngineError::LimitExceeded("recent bookings limit too large"));
        }
        let mut all = Vec::new();
        for vs in self.venue_snapshots() {
            all.extend(vs.read().await.bookings.iter().cloned());
        }
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    fn venue_snapshots(&self) -> Vec<SharedVenueState> {
        self.state.iter().map(|e| e.value().clone()).collect()
    }

    async fn active_venues<F>(&self, pred: F) -> Vec<VenueInfo>
    where
        F: Fn(&VenueState) -> bool,
    {
        let mut out = Vec::new();
        for vs in self.venue_snapshots() {
            let guard = vs.read().await;
            if guard.status.is_active() && pred(&guard) {
                out.push(VenueInfo::from_state(&guard));
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}
