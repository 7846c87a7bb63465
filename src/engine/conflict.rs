use ulid::Ulid;

use crate::limits::BLOCK_GRANULARITY_MIN;
use crate::model::{DateKey, DaySchedule, FieldMeta};
use crate::timegrid::{format_clock, TimeRange};

/// Why a proposed booking range was rejected. Ordered from hardest rejection
/// to softest: a fully blocked date dominates everything else on that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    DateBlocked,
    OutsideHours,
    SlotBlocked,
    OverlapsBooking(Ulid),
}

impl ConflictKind {
    /// Stable machine-readable code for API responses and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            ConflictKind::DateBlocked => "DATE_BLOCKED",
            ConflictKind::OutsideHours => "OUTSIDE_HOURS",
            ConflictKind::SlotBlocked => "SLOT_BLOCKED",
            ConflictKind::OverlapsBooking(_) => "OVERLAPS_BOOKING",
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::DateBlocked => write!(f, "selected date is blocked for this field"),
            ConflictKind::OutsideHours => {
                write!(f, "selected time range is outside operating hours")
            }
            ConflictKind::SlotBlocked => {
                write!(f, "selected time range overlaps a blocked time slot")
            }
            ConflictKind::OverlapsBooking(_) => {
                write!(f, "selected time range overlaps with an existing booking")
            }
        }
    }
}

/// True if any blocked 30-minute slot interval `[t, t+30)` overlaps the
/// range. Slots at or after `range.end` cannot overlap and are skipped.
pub(crate) fn blocked_slot_overlaps(day: &DaySchedule, range: &TimeRange) -> bool {
    day.blocked_slots
        .range(..range.end)
        .any(|&slot| slot + BLOCK_GRANULARITY_MIN > range.start)
}

/// Classify a proposed `[start, end)` range against a field's state for one
/// date. First match wins; checks are ordered cheapest-first and each is a
/// harder rejection than the next.
pub fn check_conflict(
    meta: &FieldMeta,
    day: &DaySchedule,
    date: DateKey,
    range: &TimeRange,
) -> Result<(), ConflictKind> {
    if meta.blocked_dates.contains(&date) {
        return Err(ConflictKind::DateBlocked);
    }
    // The whole range must fit inside operating hours; partial overflow is
    // rejected, not truncated.
    if !meta.hours.contains_range(range) {
        return Err(ConflictKind::OutsideHours);
    }
    if blocked_slot_overlaps(day, range) {
        return Err(ConflictKind::SlotBlocked);
    }
    if let Some(existing) = day.active_overlapping(*range).next() {
        return Err(ConflictKind::OverlapsBooking(existing.id));
    }
    Ok(())
}

/// Render the offending range for conflict log lines.
pub(crate) fn describe_range(range: &TimeRange) -> String {
    format!("{}-{}", format_clock(range.start), format_clock(range.end))
}
