mod conflict;
mod error;
mod mutations;
mod queries;

pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedVenueState = Arc<RwLock<VenueState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                                .record(batch.len() as f64);
                            let flush_start = std::time::Instant::now();
                            let result = flush_batch(&mut wal, &mut batch);
                            metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                                .record(flush_start.elapsed().as_secs_f64());
                            respond_batch(&mut batch, &result);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                        .record(batch.len() as f64);
                    let flush_start = std::time::Instant::now();
                    let result = flush_batch(&mut wal, &mut batch);
                    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                        .record(flush_start.elapsed().as_secs_f64());
                    respond_batch(&mut batch, &result);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The booking-conflict engine. One `RwLock<VenueState>` per venue; every
/// booking commit runs check + WAL append + apply under that venue's write
/// lock, so at most one writer passes the conflict check at a time.
pub struct Engine {
    pub(super) state: DashMap<Ulid, SharedVenueState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Reverse lookup: booking id → venue id.
    pub(super) booking_to_venue: DashMap<Ulid, Ulid>,
    /// Held shared by venue creation, exclusively by compaction. Every
    /// other mutation runs under a venue write lock; compaction takes
    /// this plus all venue locks, so no WAL record can be acked between
    /// the compaction snapshot and the file swap.
    pub(super) create_lock: RwLock<()>,
    /// Monotonic wall clock for created_at/updated_at stamps. Strictly
    /// increasing per engine so creation order is never ambiguous, even
    /// within one millisecond.
    clock: AtomicI64,
}

/// Apply an event directly to a VenueState (no locking — caller holds the lock).
fn apply_to_venue(vs: &mut VenueState, event: &Event, booking_map: &DashMap<Ulid, Ulid>) {
    match event {
        Event::VenueUpdated {
            name,
            location,
            capacity,
            price_per_hour,
            updated_at,
            ..
        } => {
            vs.name = name.clone();
            vs.location = location.clone();
            vs.capacity = *capacity;
            vs.price_per_hour = *price_per_hour;
            vs.updated_at = *updated_at;
        }
        Event::VenueRetired { updated_at, .. } => {
            vs.status = VenueStatus::Retired;
            vs.updated_at = *updated_at;
        }
        Event::AvailabilityUpdated {
            block_dates,
            unblock_dates,
            updated_at,
            ..
        } => {
            // Replace-on-write: one new set, no partial state visible.
            vs.calendar = vs.calendar.bulk(block_dates, unblock_dates);
            vs.updated_at = *updated_at;
        }
        Event::BookingCreated {
            id,
            venue_id,
            user_name,
            user_email,
            booking_date,
            hours_booked,
            total_cost,
            created_at,
        } => {
            vs.insert_booking(Booking {
                id: *id,
                venue_id: *venue_id,
                user_name: user_name.clone(),
                user_email: user_email.clone(),
                booking_date: *booking_date,
                hours_booked: *hours_booked,
                status: BookingStatus::Confirmed,
                total_cost: *total_cost,
                created_at: *created_at,
            });
            // The booking row and the calendar block are one record.
            vs.calendar.block(*booking_date);
            vs.updated_at = *created_at;
            booking_map.insert(*id, *venue_id);
        }
        Event::BookingUpdated {
            id,
            user_name,
            user_email,
            hours_booked,
            ..
        } => {
            if let Some(b) = vs.booking_mut(*id) {
                b.user_name = user_name.clone();
                b.user_email = user_email.clone();
                b.hours_booked = *hours_booked;
                // total_cost stays locked in.
            }
        }
        Event::BookingCancelled { id, .. } => {
            if let Some(b) = vs.booking_mut(*id) {
                b.status = BookingStatus::Cancelled;
            }
        }
        Event::BookingDeleted { id, .. } => {
            vs.remove_booking(*id);
            booking_map.remove(id);
        }
        // VenueCreated is handled at the DashMap level, not here
        Event::VenueCreated { .. } => {}
    }
}

fn event_timestamp(event: &Event) -> Option<Ms> {
    match event {
        Event::VenueCreated { created_at, .. } | Event::BookingCreated { created_at, .. } => {
            Some(*created_at)
        }
        Event::VenueUpdated { updated_at, .. }
        | Event::VenueRetired { updated_at, .. }
        | Event::AvailabilityUpdated { updated_at, .. } => Some(*updated_at),
        Event::BookingUpdated { .. }
        | Event::BookingCancelled { .. }
        | Event::BookingDeleted { .. } => None,
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            state: DashMap::new(),
            wal_tx,
            booking_to_venue: DashMap::new(),
            create_lock: RwLock::new(()),
            clock: AtomicI64::new(0),
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context.
        for event in &events {
            if let Some(ts) = event_timestamp(event) {
                engine.clock.fetch_max(ts, Ordering::Relaxed);
            }
            match event {
                Event::VenueCreated {
                    id,
                    name,
                    location,
                    capacity,
                    price_per_hour,
                    created_by,
                    created_at,
                } => {
                    let vs = VenueState::new(
                        *id,
                        name.clone(),
                        location.clone(),
                        *capacity,
                        *price_per_hour,
                        created_by.clone(),
                        *created_at,
                    );
                    engine.state.insert(*id, Arc::new(RwLock::new(vs)));
                }
                other => {
                    if let Some(venue_id) = event_venue_id(other)
                        && let Some(entry) = engine.state.get(&venue_id)
                    {
                        let vs_arc = entry.clone();
                        let mut guard = vs_arc.try_write().expect("replay: uncontended write");
                        apply_to_venue(&mut guard, other, &engine.booking_to_venue);
                    }
                }
            }
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_venue_state(&self, id: &Ulid) -> Option<SharedVenueState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    pub fn venue_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_venue.get(booking_id).map(|e| *e.value())
    }

    /// Next timestamp: wall clock, forced strictly past every stamp this
    /// engine has issued or replayed.
    pub(super) fn next_ts(&self) -> Ms {
        let now = conflict::now_ms();
        let mut prev = self.clock.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self
                .clock
                .compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(p) => prev = p,
            }
        }
    }

    /// WAL-append + apply in one call: durability is acknowledged before
    /// the in-memory state changes, and any error leaves state untouched.
    pub(super) async fn persist_and_apply(
        &self,
        vs: &mut VenueState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_venue(vs, event, &self.booking_to_venue);
        Ok(())
    }

    /// Lookup booking → venue, get venue, acquire write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<VenueState>), EngineError> {
        let venue_id = self
            .venue_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let vs = self
            .get_venue_state(&venue_id)
            .ok_or(EngineError::NotFound(venue_id))?;
        let guard = vs.write_owned().await;
        Ok((venue_id, guard))
    }
}
