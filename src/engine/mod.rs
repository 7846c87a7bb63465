mod availability;
mod bookings;
mod conflict;
mod error;
mod queries;
#[cfg(test)]
mod tests;

pub use availability::{day_availability, merge_ranges};
pub use bookings::{parse_date, BookingReceipt, CreateBookingRequest, FieldPatch, FieldSpec};
pub use conflict::{check_conflict, ConflictKind};
pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedDaySchedule = Arc<RwLock<DaySchedule>>;

/// One field's live state: read-mostly metadata plus per-date schedules.
/// The per-date lock is the booking atomic unit — attempts on different
/// fields, or the same field on different dates, never contend.
pub struct FieldHandle {
    pub meta: RwLock<FieldMeta>,
    pub days: DashMap<DateKey, SharedDaySchedule>,
}

impl FieldHandle {
    fn new(meta: FieldMeta) -> Self {
        Self {
            meta: RwLock::new(meta),
            days: DashMap::new(),
        }
    }

    /// Get or create the schedule for a date.
    pub fn day(&self, date: DateKey) -> SharedDaySchedule {
        self.days
            .entry(date)
            .or_insert_with(|| Arc::new(RwLock::new(DaySchedule::new())))
            .clone()
    }

    pub fn day_if_exists(&self, date: &DateKey) -> Option<SharedDaySchedule> {
        self.days.get(date).map(|e| e.value().clone())
    }
}

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
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
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

/// The booking scheduling engine: all field and booking state, the WAL
/// writer, and the domain-event hub.
pub struct Engine {
    pub fields: DashMap<Ulid, Arc<FieldHandle>>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Reverse lookup: booking id → (field id, date).
    pub(super) booking_index: DashMap<Ulid, (Ulid, DateKey)>,
    /// Idempotency key → booking id, the duplicate-submission defense.
    pub(super) idempotency: DashMap<String, Ulid>,
}

/// Apply a field-level event to metadata (caller holds the meta write lock).
fn apply_to_meta(meta: &mut FieldMeta, event: &Event) {
    match event {
        Event::FieldUpdated {
            name,
            hours,
            price_per_hour_cents,
            allowed_durations_min,
            active,
            ..
        } => {
            meta.name = name.clone();
            meta.hours = *hours;
            meta.price_per_hour_cents = *price_per_hour_cents;
            meta.allowed_durations_min = allowed_durations_min.clone();
            meta.active = *active;
        }
        Event::DatesBlocked { dates, .. } => {
            for d in dates {
                meta.blocked_dates.insert(*d);
            }
        }
        Event::DatesUnblocked { dates, .. } => {
            for d in dates {
                meta.blocked_dates.remove(d);
            }
        }
        _ => {}
    }
}

/// Apply a day-level event (caller holds the day write lock), maintaining the
/// booking and idempotency indexes.
fn apply_to_day(
    day: &mut DaySchedule,
    event: &Event,
    booking_index: &DashMap<Ulid, (Ulid, DateKey)>,
    idempotency: &DashMap<String, Ulid>,
) {
    match event {
        Event::SlotsBlocked { slots, .. } => {
            for s in slots {
                day.blocked_slots.insert(*s);
            }
        }
        Event::SlotsUnblocked { slots, .. } => {
            for s in slots {
                day.blocked_slots.remove(s);
            }
        }
        Event::BookingCreated { booking } => {
            booking_index.insert(booking.id, (booking.field_id, booking.date));
            if let Some(key) = &booking.idempotency_key {
                idempotency.insert(key.clone(), booking.id);
            }
            day.insert_booking(booking.clone());
        }
        Event::BookingStatusChanged { id, status, .. } => {
            if let Some(b) = day.booking_mut(*id) {
                b.status = *status;
            }
        }
        _ => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            fields: DashMap::new(),
            wal_tx,
            notify,
            booking_index: DashMap::new(),
            idempotency: DashMap::new(),
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context.
        for event in &events {
            match event {
                Event::FieldCreated {
                    id,
                    name,
                    hours,
                    price_per_hour_cents,
                    allowed_durations_min,
                    active,
                } => {
                    let mut meta = FieldMeta::new(
                        *id,
                        name.clone(),
                        *hours,
                        *price_per_hour_cents,
                        allowed_durations_min.clone(),
                    );
                    meta.active = *active;
                    engine.fields.insert(*id, Arc::new(FieldHandle::new(meta)));
                }
                Event::FieldDeleted { id } => {
                    engine.fields.remove(id);
                    engine.booking_index.retain(|_, (fid, _)| *fid != *id);
                }
                Event::FieldUpdated { id, .. }
                | Event::DatesBlocked { field_id: id, .. }
                | Event::DatesUnblocked { field_id: id, .. } => {
                    if let Some(handle) = engine.get_field(id) {
                        let mut meta = handle.meta.try_write().expect("replay: uncontended write");
                        apply_to_meta(&mut meta, event);
                    }
                }
                Event::SlotsBlocked { field_id, date, .. }
                | Event::SlotsUnblocked { field_id, date, .. } => {
                    if let Some(handle) = engine.get_field(field_id) {
                        let day_arc = handle.day(*date);
                        {
                            let mut day =
                                day_arc.try_write().expect("replay: uncontended write");
                            apply_to_day(&mut day, event, &engine.booking_index, &engine.idempotency);
                            if day.is_empty() {
                                handle.days.remove(date);
                            }
                        }
                    }
                }
                Event::BookingCreated { booking } => {
                    if let Some(handle) = engine.get_field(&booking.field_id) {
                        let day_arc = handle.day(booking.date);
                        let mut day = day_arc.try_write().expect("replay: uncontended write");
                        apply_to_day(&mut day, event, &engine.booking_index, &engine.idempotency);
                    }
                }
                Event::BookingStatusChanged { field_id, date, .. } => {
                    if let Some(handle) = engine.get_field(field_id) {
                        let day_arc = handle.day(*date);
                        let mut day = day_arc.try_write().expect("replay: uncontended write");
                        apply_to_day(&mut day, event, &engine.booking_index, &engine.idempotency);
                    }
                }
            }
        }
        metrics::gauge!(crate::observability::FIELDS_ACTIVE).set(engine.fields.len() as f64);

        Ok(engine)
    }

    /// Write an event to the WAL via the background group-commit writer.
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

    pub fn get_field(&self, id: &Ulid) -> Option<Arc<FieldHandle>> {
        self.fields.get(id).map(|e| e.value().clone())
    }

    /// WAL-append + apply + notify for a field-level event, in one call.
    pub(super) async fn persist_meta(
        &self,
        field_id: Ulid,
        meta: &mut FieldMeta,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_meta(meta, event);
        self.notify.send(field_id, event);
        Ok(())
    }

    /// WAL-append + apply + notify for a day-level event. The event is only
    /// applied after the append succeeds, so a failed commit leaves no
    /// partial booking record.
    pub(super) async fn persist_day(
        &self,
        field_id: Ulid,
        day: &mut DaySchedule,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_day(day, event, &self.booking_index, &self.idempotency);
        self.notify.send(field_id, event);
        Ok(())
    }

    /// Lookup booking → (field, date), acquire the day write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, DateKey, tokio::sync::OwnedRwLockWriteGuard<DaySchedule>), EngineError> {
        let (field_id, date) = self
            .booking_index
            .get(booking_id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(*booking_id))?;
        let handle = self
            .get_field(&field_id)
            .ok_or(EngineError::NotFound(field_id))?;
        let day = handle.day(date);
        let guard = day.write_owned().await;
        Ok((field_id, date, guard))
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        let field_ids: Vec<Ulid> = self.fields.iter().map(|e| *e.key()).collect();
        for id in field_ids {
            let Some(handle) = self.get_field(&id) else {
                continue;
            };
            let meta = handle.meta.read().await;
            events.push(Event::FieldCreated {
                id: meta.id,
                name: meta.name.clone(),
                hours: meta.hours,
                price_per_hour_cents: meta.price_per_hour_cents,
                allowed_durations_min: meta.allowed_durations_min.clone(),
                active: meta.active,
            });
            if !meta.blocked_dates.is_empty() {
                let mut dates: Vec<DateKey> = meta.blocked_dates.iter().copied().collect();
                dates.sort();
                events.push(Event::DatesBlocked { field_id: id, dates });
            }
            drop(meta);

            let dates: Vec<DateKey> = handle.days.iter().map(|e| *e.key()).collect();
            for date in dates {
                let Some(day_arc) = handle.day_if_exists(&date) else {
                    continue;
                };
                let day = day_arc.read().await;
                if !day.blocked_slots.is_empty() {
                    events.push(Event::SlotsBlocked {
                        field_id: id,
                        date,
                        slots: day.blocked_slots.iter().copied().collect(),
                    });
                }
                for booking in &day.bookings {
                    // Booking records carry their status, so one event per
                    // booking reproduces cancelled/completed state on replay.
                    events.push(Event::BookingCreated {
                        booking: booking.clone(),
                    });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
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
