use crate::limits::{BLOCK_GRANULARITY_MIN, SLOT_STEP_MIN};
use crate::model::{DateKey, DayAvailability, DaySchedule, FieldMeta, SlotStatus};
use crate::timegrid::{generate_slots, Minutes, TimeRange, MINUTES_PER_DAY};

// ── Availability Algorithm ────────────────────────────────────────

/// Classify every candidate start time on the display grid for one field and
/// date, as a function of the requested duration: a 2-hour request can be
/// blocked by a booking a 1-hour request at the same start would clear.
///
/// `day` is None when the date has no bookings and no blocked slots.
pub fn day_availability(
    meta: &FieldMeta,
    day: Option<&DaySchedule>,
    date: DateKey,
    requested_duration_min: u32,
) -> DayAvailability {
    let starts = generate_slots(meta.hours.open, meta.hours.close, SLOT_STEP_MIN);

    // Fully blocked day: every slot is blocked, none booked. Distinct from
    // "all slots individually booked" so the UI can say "field closed".
    if meta.blocked_dates.contains(&date) {
        let slots = starts
            .into_iter()
            .map(|start| SlotStatus {
                start,
                is_available: false,
                is_booked: false,
                is_blocked: true,
                extends_past_close: false,
            })
            .collect();
        return DayAvailability {
            slots,
            booked_ranges: Vec::new(),
            open: meta.hours.open,
            close: meta.hours.close,
        };
    }

    let mut booked: Vec<TimeRange> = Vec::new();
    let mut blocked: Vec<TimeRange> = Vec::new();
    if let Some(day) = day {
        booked = day
            .bookings
            .iter()
            .filter(|b| b.is_active())
            .map(|b| b.range)
            .collect();
        // Each blocked slot is a fixed-width interval; finer than the hourly
        // grid, so a single 30-minute block can invalidate a candidate slot
        // by partial overlap.
        blocked = day
            .blocked_slots
            .iter()
            .map(|&t| TimeRange::new(t, t + BLOCK_GRANULARITY_MIN))
            .collect();
    }

    let slots = starts
        .into_iter()
        .map(|start| {
            let end = start as u32 + requested_duration_min;
            let extends_past_close = end > meta.hours.close as u32;
            // Clamp the provisional range to the day so the overlap flags
            // stay meaningful even for an overflowing request.
            let provisional = TimeRange::new(start, end.min(MINUTES_PER_DAY as u32) as Minutes);
            let is_booked = booked.iter().any(|b| b.overlaps(&provisional));
            let is_blocked = blocked.iter().any(|b| b.overlaps(&provisional));
            SlotStatus {
                start,
                is_available: !extends_past_close && !is_booked && !is_blocked,
                is_booked,
                is_blocked,
                extends_past_close,
            }
        })
        .collect();

    booked.sort_by_key(|r| r.start);
    DayAvailability {
        slots,
        booked_ranges: merge_ranges(&booked),
        open: meta.hours.open,
        close: meta.hours.close,
    }
}

/// Merge sorted overlapping/adjacent ranges into disjoint ranges.
pub fn merge_ranges(sorted: &[TimeRange]) -> Vec<TimeRange> {
    let mut merged: Vec<TimeRange> = Vec::new();
    for &range in sorted {
        if let Some(last) = merged.last_mut()
            && range.start <= last.end
        {
            last.end = last.end.max(range.end);
            continue;
        }
        merged.push(range);
    }
    merged
}
