use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::timegrid::{booking_range, parse_clock, Minutes, MINUTES_PER_DAY};

use super::conflict::{check_conflict, describe_range};
use super::{Engine, EngineError, FieldHandle};

/// Intake record for a new booking. Raw strings on purpose: format
/// validation is this module's job and fails fast, before any lock or
/// storage access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub field_id: Ulid,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: String,
    /// ISO `YYYY-MM-DD`.
    pub date: String,
    /// `HH:MM`, on a 30-minute boundary.
    pub start_time: String,
    /// Hours; a positive multiple of 0.5, at most 12.
    pub duration: f64,
    /// Client retry token. Resubmitting the same key yields
    /// `DuplicateSubmission` instead of a second booking.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BookingReceipt {
    pub booking_id: Ulid,
    pub status: BookingStatus,
}

/// Field creation input.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: Option<String>,
    /// Defaults to 08:00–23:00 when unset.
    pub hours: Option<OperatingHours>,
    pub price_per_hour_cents: i64,
    pub allowed_durations_min: Vec<u32>,
}

/// Partial field update; `None` leaves the current value unchanged.
#[derive(Debug, Clone, Default)]
pub struct FieldPatch {
    pub name: Option<String>,
    pub hours: Option<OperatingHours>,
    pub price_per_hour_cents: Option<i64>,
    pub allowed_durations_min: Option<Vec<u32>>,
    pub active: Option<bool>,
}

/// Parse a strict `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<DateKey, EngineError> {
    if s.len() != 10 {
        return Err(EngineError::validation(format!(
            "invalid date: {s:?} (expected YYYY-MM-DD)"
        )));
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        EngineError::validation(format!("invalid date: {s:?} (expected YYYY-MM-DD)"))
    })
}

fn validate_hours(hours: &OperatingHours) -> Result<(), EngineError> {
    if hours.open >= hours.close || hours.close > MINUTES_PER_DAY {
        return Err(EngineError::validation(
            "operating hours must satisfy open < close within one day",
        ));
    }
    Ok(())
}

fn validate_durations(durations: &[u32]) -> Result<(), EngineError> {
    if durations.len() > MAX_ALLOWED_DURATIONS {
        return Err(EngineError::LimitExceeded("too many allowed durations"));
    }
    for &d in durations {
        if d == 0 || d > MAX_DURATION_MIN || d % BLOCK_GRANULARITY_MIN as u32 != 0 {
            return Err(EngineError::validation(
                "allowed durations must be positive multiples of 30 minutes, at most 12 hours",
            ));
        }
    }
    Ok(())
}

/// Convert a duration in hours to minutes, enforcing the granularity policy:
/// positive, a multiple of 30 minutes, at most 12 hours. Never rounded — a
/// request the availability grid cannot represent is malformed.
fn duration_to_minutes(hours: f64) -> Result<u32, EngineError> {
    if !hours.is_finite() || hours <= 0.0 {
        return Err(EngineError::validation("duration must be positive"));
    }
    let minutes = hours * 60.0;
    if (minutes - minutes.round()).abs() > 1e-9 {
        return Err(EngineError::validation(
            "duration must be a multiple of 0.5 hours",
        ));
    }
    let minutes = minutes.round() as u32;
    if minutes % BLOCK_GRANULARITY_MIN as u32 != 0 {
        return Err(EngineError::validation(
            "duration must be a multiple of 0.5 hours",
        ));
    }
    if minutes > MAX_DURATION_MIN {
        return Err(EngineError::validation("duration must be at most 12 hours"));
    }
    Ok(minutes)
}

fn validate_customer(req: &CreateBookingRequest) -> Result<Customer, EngineError> {
    for (label, value) in [
        ("user_name", &req.user_name),
        ("user_email", &req.user_email),
        ("user_phone", &req.user_phone),
    ] {
        if value.trim().is_empty() {
            return Err(EngineError::validation(format!("{label} is required")));
        }
        if value.len() > MAX_CONTACT_LEN {
            return Err(EngineError::LimitExceeded("contact field too long"));
        }
    }
    Ok(Customer {
        name: req.user_name.clone(),
        email: req.user_email.clone(),
        phone: req.user_phone.clone(),
    })
}

fn validate_slots(slots: &[Minutes]) -> Result<(), EngineError> {
    if slots.is_empty() {
        return Err(EngineError::validation("time_slots must not be empty"));
    }
    if slots.len() > MAX_SLOTS_PER_REQUEST {
        return Err(EngineError::LimitExceeded("too many time slots in one request"));
    }
    for &slot in slots {
        if slot >= MINUTES_PER_DAY || slot % BLOCK_GRANULARITY_MIN != 0 {
            return Err(EngineError::validation(
                "time slots must be HH:MM on a 30-minute boundary",
            ));
        }
    }
    Ok(())
}

impl Engine {
    // ── Field CRUD ───────────────────────────────────────────

    pub async fn create_field(&self, id: Ulid, spec: FieldSpec) -> Result<(), EngineError> {
        if self.fields.len() >= MAX_FIELDS {
            return Err(EngineError::LimitExceeded("too many fields"));
        }
        if let Some(ref n) = spec.name
            && n.len() > MAX_NAME_LEN
        {
            return Err(EngineError::LimitExceeded("field name too long"));
        }
        let hours = spec.hours.unwrap_or_default();
        validate_hours(&hours)?;
        if spec.price_per_hour_cents < 0 {
            return Err(EngineError::validation("price must not be negative"));
        }
        validate_durations(&spec.allowed_durations_min)?;
        if self.fields.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::FieldCreated {
            id,
            name: spec.name.clone(),
            hours,
            price_per_hour_cents: spec.price_per_hour_cents,
            allowed_durations_min: spec.allowed_durations_min.clone(),
            active: true,
        };
        self.wal_append(&event).await?;
        let meta = FieldMeta::new(
            id,
            spec.name,
            hours,
            spec.price_per_hour_cents,
            spec.allowed_durations_min,
        );
        self.fields.insert(id, Arc::new(FieldHandle::new(meta)));
        metrics::gauge!(crate::observability::FIELDS_ACTIVE).set(self.fields.len() as f64);
        self.notify.send(id, &event);
        Ok(())
    }

    pub async fn update_field(&self, id: Ulid, patch: FieldPatch) -> Result<(), EngineError> {
        let handle = self.get_field(&id).ok_or(EngineError::NotFound(id))?;
        let mut meta = handle.meta.write().await;

        let name = match patch.name {
            Some(n) => {
                if n.len() > MAX_NAME_LEN {
                    return Err(EngineError::LimitExceeded("field name too long"));
                }
                Some(n)
            }
            None => meta.name.clone(),
        };
        let hours = patch.hours.unwrap_or(meta.hours);
        validate_hours(&hours)?;
        let price_per_hour_cents = patch.price_per_hour_cents.unwrap_or(meta.price_per_hour_cents);
        if price_per_hour_cents < 0 {
            return Err(EngineError::validation("price must not be negative"));
        }
        let allowed_durations_min = match patch.allowed_durations_min {
            Some(d) => {
                validate_durations(&d)?;
                d
            }
            None => meta.allowed_durations_min.clone(),
        };
        let active = patch.active.unwrap_or(meta.active);

        let event = Event::FieldUpdated {
            id,
            name,
            hours,
            price_per_hour_cents,
            allowed_durations_min,
            active,
        };
        self.persist_meta(id, &mut meta, &event).await
    }

    pub async fn delete_field(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.fields.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::FieldDeleted { id };
        self.wal_append(&event).await?;
        self.fields.remove(&id);
        self.booking_index.retain(|_, (field_id, _)| *field_id != id);
        metrics::gauge!(crate::observability::FIELDS_ACTIVE).set(self.fields.len() as f64);
        self.notify.send(id, &event);
        self.notify.remove(&id);
        Ok(())
    }

    // ── Booking creation — the transactional core ────────────

    /// Create a booking, guaranteeing that no two concurrent requests can
    /// both commit overlapping ranges for the same field and date.
    ///
    /// Validation and the idempotency fast path run before any lock. The
    /// authoritative conflict re-check and the insert happen under the
    /// per-(field, date) write lock, with the WAL append completing before
    /// the event is applied — a failed commit leaves no partial record.
    pub async fn create_booking(
        &self,
        req: CreateBookingRequest,
    ) -> Result<BookingReceipt, EngineError> {
        let date = parse_date(&req.date)?;
        let start = parse_clock(&req.start_time)
            .map_err(|e| EngineError::validation(e.to_string()))?;
        if start % BLOCK_GRANULARITY_MIN != 0 {
            return Err(EngineError::validation(
                "start time must be on a 30-minute boundary",
            ));
        }
        let duration_min = duration_to_minutes(req.duration)?;
        let customer = validate_customer(&req)?;
        if let Some(key) = &req.idempotency_key {
            if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
                return Err(EngineError::validation("invalid idempotency key"));
            }
            if let Some(existing) = self.idempotency.get(key) {
                metrics::counter!(crate::observability::DUPLICATE_SUBMISSIONS_TOTAL).increment(1);
                return Err(EngineError::DuplicateSubmission(*existing.value()));
            }
        }
        let range =
            booking_range(start, duration_min).map_err(|e| EngineError::validation(e.to_string()))?;

        let handle = self
            .get_field(&req.field_id)
            .ok_or(EngineError::NotFound(req.field_id))?;
        let meta = handle.meta.read().await;
        if !meta.active {
            return Err(EngineError::FieldInactive(meta.id));
        }

        // Optimistic pre-check under the read lock: rejects the common
        // conflict case without contending on the write lock.
        let day_arc = handle.day(date);
        {
            let day = day_arc.read().await;
            if let Err(kind) = check_conflict(&meta, &day, date, &range) {
                metrics::counter!(
                    crate::observability::BOOKING_CONFLICTS_TOTAL,
                    "kind" => kind.code()
                )
                .increment(1);
                tracing::debug!(
                    field = %meta.id,
                    %date,
                    range = %describe_range(&range),
                    %kind,
                    "booking rejected by pre-check"
                );
                return Err(EngineError::Conflict(kind));
            }
        }

        // The atomic unit. Two concurrent attempts can both pass the
        // pre-check on a stale read; only one commits here.
        let mut day = day_arc.write().await;
        if day.bookings.len() >= MAX_BOOKINGS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many bookings on this date"));
        }
        if let Err(kind) = check_conflict(&meta, &day, date, &range) {
            metrics::counter!(
                crate::observability::BOOKING_CONFLICTS_TOTAL,
                "kind" => kind.code()
            )
            .increment(1);
            tracing::debug!(
                field = %meta.id,
                %date,
                range = %describe_range(&range),
                %kind,
                "booking rejected by in-transaction re-check"
            );
            return Err(EngineError::Conflict(kind));
        }

        let id = Ulid::new();
        // Reserve the key before committing; a concurrent resubmission
        // observes DuplicateSubmission with the winner's booking id.
        if let Some(key) = &req.idempotency_key {
            match self.idempotency.entry(key.clone()) {
                Entry::Occupied(e) => {
                    metrics::counter!(crate::observability::DUPLICATE_SUBMISSIONS_TOTAL)
                        .increment(1);
                    return Err(EngineError::DuplicateSubmission(*e.get()));
                }
                Entry::Vacant(v) => {
                    v.insert(id);
                }
            }
        }

        let total_cents = meta.price_per_hour_cents * duration_min as i64 / 60;
        let booking = Booking {
            id,
            field_id: meta.id,
            date,
            range,
            duration_min,
            customer,
            total_cents,
            status: BookingStatus::Pending,
            idempotency_key: req.idempotency_key.clone(),
        };
        let event = Event::BookingCreated { booking };
        if let Err(e) = self.persist_day(meta.id, &mut day, &event).await {
            // Nothing was applied; release the key so a retry can succeed.
            if let Some(key) = &req.idempotency_key {
                self.idempotency.remove(key);
            }
            return Err(e);
        }

        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        tracing::info!(
            booking = %id,
            field = %meta.id,
            %date,
            range = %describe_range(&range),
            "booking created"
        );
        Ok(BookingReceipt {
            booking_id: id,
            status: BookingStatus::Pending,
        })
    }

    // ── Booking lifecycle ────────────────────────────────────

    /// Move a booking along pending → confirmed → completed, or cancel it.
    /// Cancelled bookings stay on record but stop conflicting.
    pub async fn set_booking_status(
        &self,
        id: Ulid,
        next: BookingStatus,
    ) -> Result<(), EngineError> {
        let (field_id, date, mut day) = self.resolve_booking_write(&id).await?;
        let current = day.booking_mut(id).ok_or(EngineError::NotFound(id))?.status;
        if current == next {
            return Ok(()); // repeated transition, no event
        }
        if !current.can_transition_to(next) {
            return Err(EngineError::validation(format!(
                "cannot move booking from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }
        let event = Event::BookingStatusChanged {
            id,
            field_id,
            date,
            status: next,
        };
        self.persist_day(field_id, &mut day, &event).await
    }

    pub async fn cancel_booking(&self, id: Ulid) -> Result<(), EngineError> {
        self.set_booking_status(id, BookingStatus::Cancelled).await
    }

    // ── Blocking — set operations, deliberately no conflict logic ──
    //
    // Blocking a date or slot that has confirmed bookings is allowed: it
    // prevents future bookings, it does not retroactively cancel.

    pub async fn block_dates(&self, field_id: Ulid, dates: Vec<DateKey>) -> Result<(), EngineError> {
        if dates.is_empty() {
            return Err(EngineError::validation("dates must not be empty"));
        }
        if dates.len() > MAX_DATES_PER_REQUEST {
            return Err(EngineError::LimitExceeded("too many dates in one request"));
        }
        let handle = self.get_field(&field_id).ok_or(EngineError::NotFound(field_id))?;
        let mut meta = handle.meta.write().await;
        let event = Event::DatesBlocked { field_id, dates };
        self.persist_meta(field_id, &mut meta, &event).await
    }

    pub async fn unblock_dates(
        &self,
        field_id: Ulid,
        dates: Vec<DateKey>,
    ) -> Result<(), EngineError> {
        if dates.is_empty() {
            return Err(EngineError::validation("dates must not be empty"));
        }
        if dates.len() > MAX_DATES_PER_REQUEST {
            return Err(EngineError::LimitExceeded("too many dates in one request"));
        }
        let handle = self.get_field(&field_id).ok_or(EngineError::NotFound(field_id))?;
        let mut meta = handle.meta.write().await;
        let event = Event::DatesUnblocked { field_id, dates };
        self.persist_meta(field_id, &mut meta, &event).await
    }

    pub async fn block_time_slots(
        &self,
        field_id: Ulid,
        date: DateKey,
        slots: Vec<Minutes>,
    ) -> Result<(), EngineError> {
        validate_slots(&slots)?;
        let handle = self.get_field(&field_id).ok_or(EngineError::NotFound(field_id))?;
        let day_arc = handle.day(date);
        let mut day = day_arc.write().await;
        let event = Event::SlotsBlocked { field_id, date, slots };
        self.persist_day(field_id, &mut day, &event).await
    }

    pub async fn unblock_time_slots(
        &self,
        field_id: Ulid,
        date: DateKey,
        slots: Vec<Minutes>,
    ) -> Result<(), EngineError> {
        validate_slots(&slots)?;
        let handle = self.get_field(&field_id).ok_or(EngineError::NotFound(field_id))?;
        let Some(day_arc) = handle.day_if_exists(&date) else {
            return Ok(()); // nothing blocked on that date — already done
        };
        let mut day = day_arc.write().await;
        let event = Event::SlotsUnblocked { field_id, date, slots };
        self.persist_day(field_id, &mut day, &event).await?;
        // An emptied schedule stays in the map: a concurrent booking attempt
        // may already hold this day's Arc, and dropping the entry out from
        // under it would strand the booking in an orphaned record. Replay
        // prunes empty days instead.
        Ok(())
    }
}
