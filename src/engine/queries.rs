use ulid::Ulid;

use crate::limits::{BLOCK_GRANULARITY_MIN, MAX_DURATION_MIN, SLOT_STEP_MIN};
use crate::model::*;
use crate::timegrid::Minutes;

use super::availability::day_availability;
use super::{Engine, EngineError};

impl Engine {
    /// Per-slot availability for one field and date, parameterized by the
    /// requested duration (defaults to one grid step: 60 minutes).
    pub async fn availability(
        &self,
        field_id: Ulid,
        date: DateKey,
        requested_duration_min: Option<u32>,
    ) -> Result<DayAvailability, EngineError> {
        let duration = requested_duration_min.unwrap_or(SLOT_STEP_MIN as u32);
        if duration == 0
            || duration > MAX_DURATION_MIN
            || duration % BLOCK_GRANULARITY_MIN as u32 != 0
        {
            return Err(EngineError::validation(
                "duration must be a positive multiple of 0.5 hours, at most 12 hours",
            ));
        }

        let handle = self
            .get_field(&field_id)
            .ok_or(EngineError::NotFound(field_id))?;
        let meta = handle.meta.read().await;
        let view = match handle.day_if_exists(&date) {
            Some(day_arc) => {
                let day = day_arc.read().await;
                day_availability(&meta, Some(&day), date, duration)
            }
            None => day_availability(&meta, None, date, duration),
        };
        metrics::counter!(crate::observability::AVAILABILITY_QUERIES_TOTAL).increment(1);
        Ok(view)
    }

    pub async fn list_fields(&self) -> Vec<FieldInfo> {
        let handles: Vec<_> = self.fields.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            let meta = handle.meta.read().await;
            out.push(FieldInfo::from_meta(&meta));
        }
        out.sort_by_key(|f| f.id);
        out
    }

    pub async fn get_field_info(&self, id: Ulid) -> Result<FieldInfo, EngineError> {
        let handle = self.get_field(&id).ok_or(EngineError::NotFound(id))?;
        let meta = handle.meta.read().await;
        Ok(FieldInfo::from_meta(&meta))
    }

    /// Blocked 30-minute slot starts for one date, sorted.
    pub async fn blocked_slots_for(
        &self,
        field_id: Ulid,
        date: DateKey,
    ) -> Result<Vec<Minutes>, EngineError> {
        let handle = self
            .get_field(&field_id)
            .ok_or(EngineError::NotFound(field_id))?;
        match handle.day_if_exists(&date) {
            Some(day_arc) => {
                let day = day_arc.read().await;
                Ok(day.blocked_slots.iter().copied().collect())
            }
            None => Ok(Vec::new()),
        }
    }

    /// Bookings of a field, optionally restricted to one date, sorted by
    /// (date, start). Includes cancelled bookings — this is the audit view.
    pub async fn bookings_for(
        &self,
        field_id: Ulid,
        date: Option<DateKey>,
    ) -> Result<Vec<Booking>, EngineError> {
        let handle = self
            .get_field(&field_id)
            .ok_or(EngineError::NotFound(field_id))?;

        let mut result = Vec::new();
        match date {
            Some(date) => {
                if let Some(day_arc) = handle.day_if_exists(&date) {
                    let day = day_arc.read().await;
                    result.extend(day.bookings.iter().cloned());
                }
            }
            None => {
                let dates: Vec<DateKey> = handle.days.iter().map(|e| *e.key()).collect();
                for date in dates {
                    if let Some(day_arc) = handle.day_if_exists(&date) {
                        let day = day_arc.read().await;
                        result.extend(day.bookings.iter().cloned());
                    }
                }
            }
        }
        result.sort_by_key(|b| (b.date, b.range.start));
        Ok(result)
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let (field_id, date) = self
            .booking_index
            .get(&id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(id))?;
        let handle = self
            .get_field(&field_id)
            .ok_or(EngineError::NotFound(field_id))?;
        let day_arc = handle
            .day_if_exists(&date)
            .ok_or(EngineError::NotFound(id))?;
        let day = day_arc.read().await;
        day.bookings
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(EngineError::NotFound(id))
    }
}
