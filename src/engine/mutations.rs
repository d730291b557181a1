use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{RwLock, oneshot};
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{
    check_booking_conflict, validate_booking_fields, validate_date, validate_venue_fields,
};
use super::{Engine, EngineError, WalCommand};

impl Engine {
    pub async fn create_venue(
        &self,
        name: String,
        location: String,
        capacity: u32,
        price_per_hour: f64,
        created_by: String,
    ) -> Result<VenueInfo, EngineError> {
        validate_venue_fields(&name, &location, capacity, price_per_hour)?;
        if created_by.len() > MAX_EMAIL_LEN {
            return Err(EngineError::LimitExceeded("created_by too long"));
        }
        if self.state.len() >= MAX_VENUES {
            return Err(EngineError::LimitExceeded("too many venues"));
        }

        let id = Ulid::new();
        let created_at = self.next_ts();
        let event = Event::VenueCreated {
            id,
            name: name.clone(),
            location: location.clone(),
            capacity,
            price_per_hour,
            created_by: created_by.clone(),
            created_at,
        };
        // Venues have no lock of their own yet; the gate keeps this
        // append out of a concurrent compaction's swap window.
        let _gate = self.create_lock.read().await;
        self.wal_append(&event).await?;

        let vs = VenueState::new(id, name, location, capacity, price_per_hour, created_by, created_at);
        let info = VenueInfo::from_state(&vs);
        self.state.insert(id, Arc::new(RwLock::new(vs)));
        metrics::gauge!(crate::observability::VENUES_TOTAL).set(self.state.len() as f64);
        info!("created venue {id}");
        Ok(info)
    }

    /// Update core venue fields. The calendar and lifecycle status are
    /// managed by their own operations and stay untouched here.
    pub async fn update_venue(
        &self,
        id: Ulid,
        name: String,
        location: String,
        capacity: u32,
        price_per_hour: f64,
    ) -> Result<VenueInfo, EngineError> {
        validate_venue_fields(&name, &location, capacity, price_per_hour)?;
        let vs = self.get_venue_state(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = vs.write().await;

        let event = Event::VenueUpdated {
            id,
            name,
            location,
            capacity,
            price_per_hour,
            updated_at: self.next_ts(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(VenueInfo::from_state(&guard))
    }

    /// Soft delete: the venue drops out of listings and booking
    /// eligibility but its record and bookings stay resolvable.
    pub async fn retire_venue(&self, id: Ulid) -> Result<(), EngineError> {
        let vs = self.get_venue_state(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = vs.write().await;
        if guard.status == VenueStatus::Retired {
            return Ok(());
        }

        let event = Event::VenueRetired {
            id,
            updated_at: self.next_ts(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!("retired venue {id}");
        Ok(())
    }

    /// Bulk calendar update: blocks then unblocks, as one new set — a
    /// date named in both lists ends up unblocked. Existing confirmed
    /// bookings on newly blocked dates are NOT re-validated; an admin can
    /// block a date that already carries a booking.
    pub async fn update_availability(
        &self,
        venue_id: Ulid,
        block_dates: Vec<NaiveDate>,
        unblock_dates: Vec<NaiveDate>,
    ) -> Result<VenueInfo, EngineError> {
        if block_dates.len() > MAX_BULK_DATES || unblock_dates.len() > MAX_BULK_DATES {
            return Err(EngineError::LimitExceeded("too many dates in one update"));
        }
        for d in block_dates.iter().chain(unblock_dates.iter()) {
            validate_date(*d)?;
        }
        let vs = self
            .get_venue_state(&venue_id)
            .ok_or(EngineError::VenueNotFound(venue_id))?;
        let mut guard = vs.write().await;

        let next = guard.calendar.bulk(&block_dates, &unblock_dates);
        if next.len() > MAX_BLOCKED_DATES_PER_VENUE {
            return Err(EngineError::LimitExceeded("too many blocked dates on venue"));
        }

        info!(
            "venue {venue_id}: blocking {} dates, unblocking {}",
            block_dates.len(),
            unblock_dates.len()
        );
        let event = Event::AvailabilityUpdated {
            venue_id,
            block_dates,
            unblock_dates,
            updated_at: self.next_ts(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(VenueInfo::from_state(&guard))
    }

    /// Create a booking. The whole sequence — venue lookup, conflict
    /// check, cost computation, WAL append, booking insert + calendar
    /// block — runs under the venue's write lock: it either fully commits
    /// or leaves no persisted change.
    pub async fn create_booking(
        &self,
        venue_id: Ulid,
        user_name: String,
        user_email: String,
        booking_date: NaiveDate,
        hours_booked: u32,
    ) -> Result<Booking, EngineError> {
        validate_booking_fields(&user_name, &user_email, hours_booked)?;
        validate_date(booking_date)?;

        let vs = self
            .get_venue_state(&venue_id)
            .ok_or(EngineError::VenueNotFound(venue_id))?;
        let mut guard = vs.write().await;

        if guard.bookings.len() >= MAX_BOOKINGS_PER_VENUE {
            return Err(EngineError::LimitExceeded("too many bookings on venue"));
        }
        if guard.calendar.len() >= MAX_BLOCKED_DATES_PER_VENUE {
            return Err(EngineError::LimitExceeded("too many blocked dates on venue"));
        }

        if let Err(e) = check_booking_conflict(&guard, booking_date) {
            if matches!(e, EngineError::DoubleBooking { .. }) {
                metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            }
            return Err(e);
        }

        // Cost locks in at creation time; later price changes don't touch it.
        let total_cost = guard.price_per_hour * f64::from(hours_booked);
        let id = Ulid::new();
        let created_at = self.next_ts();

        let event = Event::BookingCreated {
            id,
            venue_id,
            user_name: user_name.clone(),
            user_email: user_email.clone(),
            booking_date,
            hours_booked,
            total_cost,
            created_at,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        info!("booked venue {venue_id} on {booking_date} (booking {id})");
        Ok(Booking {
            id,
            venue_id,
            user_name,
            user_email,
            booking_date,
            hours_booked,
            status: BookingStatus::Confirmed,
            total_cost,
            created_at,
        })
    }

    /// Update the safe-to-change booking fields. Venue and date never
    /// change (that would dodge the conflict guard), and the locked-in
    /// cost is not recomputed.
    pub async fn update_booking(
        &self,
        id: Ulid,
        user_name: String,
        user_email: String,
        hours_booked: u32,
    ) -> Result<Booking, EngineError> {
        validate_booking_fields(&user_name, &user_email, hours_booked)?;
        let (venue_id, mut guard) = self.resolve_booking_write(&id).await?;

        let event = Event::BookingUpdated {
            id,
            venue_id,
            user_name,
            user_email,
            hours_booked,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        guard.booking(id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// Confirmed → Cancelled; terminal, no way back. The booking date
    /// stays blocked on the calendar (source behavior, see DESIGN.md).
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let (venue_id, mut guard) = self.resolve_booking_write(&id).await?;
        if guard.booking(id).is_some_and(|b| !b.is_confirmed()) {
            return Ok(venue_id);
        }

        let event = Event::BookingCancelled { id, venue_id };
        self.persist_and_apply(&mut guard, &event).await?;
        info!("cancelled booking {id} on venue {venue_id}");
        Ok(venue_id)
    }

    /// Hard delete of a booking record. Calendar untouched, like cancel.
    pub async fn delete_booking(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let (venue_id, mut guard) = self.resolve_booking_write(&id).await?;
        let event = Event::BookingDeleted { id, venue_id };
        self.persist_and_apply(&mut guard, &event).await?;
        info!("deleted booking {id} on venue {venue_id}");
        Ok(venue_id)
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    ///
    /// Holds the creation gate and every venue's write lock from snapshot
    /// through the file swap: with all writers quiesced, every record
    /// acked before this point is reflected in the snapshot, so the
    /// rewrite cannot drop an acknowledged commit.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.create_lock.write().await;
        let arcs: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        let mut guards = Vec::with_capacity(arcs.len());
        for vs in arcs {
            guards.push(vs.write_owned().await);
        }

        let mut events = Vec::new();
        for guard in &guards {
            events.push(Event::VenueCreated {
                id: guard.id,
                name: guard.name.clone(),
                location: guard.location.clone(),
                capacity: guard.capacity,
                price_per_hour: guard.price_per_hour,
                created_by: guard.created_by.clone(),
                created_at: guard.created_at,
            });

            // Emit bookings in creation order so replay reconstructs the
            // same recency ordering.
            let mut bookings = guard.bookings.clone();
            bookings.sort_by_key(|b| b.created_at);
            for b in &bookings {
                events.push(Event::BookingCreated {
                    id: b.id,
                    venue_id: guard.id,
                    user_name: b.user_name.clone(),
                    user_email: b.user_email.clone(),
                    booking_date: b.booking_date,
                    hours_booked: b.hours_booked,
                    total_cost: b.total_cost,
                    created_at: b.created_at,
                });
                if b.status == BookingStatus::Cancelled {
                    events.push(Event::BookingCancelled {
                        id: b.id,
                        venue_id: guard.id,
                    });
                }
            }

            // The full blocked set last, so the exact calendar and
            // updated_at stamp survive the rewrite. Replaying each
            // BookingCreated above re-blocks its date, so booking dates
            // the admin has since reopened must be unblocked explicitly.
            let mut reopened: Vec<NaiveDate> = bookings
                .iter()
                .map(|b| b.booking_date)
                .filter(|d| !guard.calendar.contains(*d))
                .collect();
            reopened.sort_unstable();
            reopened.dedup();
            events.push(Event::AvailabilityUpdated {
                venue_id: guard.id,
                block_dates: guard.calendar.dates(),
                unblock_dates: reopened,
                updated_at: guard.updated_at,
            });

            if guard.status == VenueStatus::Retired {
                events.push(Event::VenueRetired {
                    id: guard.id,
                    updated_at: guard.updated_at,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
