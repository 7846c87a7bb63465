use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::timegrid::{Minutes, TimeRange};

/// Calendar date used as an opaque partition key. All time comparisons are
/// date equality plus minute arithmetic within the date — never instants.
pub type DateKey = NaiveDate;

/// Daily bookable window `[open, close]` in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub open: Minutes,
    pub close: Minutes,
}

impl OperatingHours {
    /// True if the whole range fits inside the window. Partial overflow
    /// counts as outside; callers reject rather than truncate.
    pub fn contains_range(&self, range: &TimeRange) -> bool {
        self.open <= range.start && range.end <= self.close
    }
}

impl Default for OperatingHours {
    /// 08:00–23:00, the window assumed when a field is created without one.
    fn default() -> Self {
        Self { open: 480, close: 1380 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Cancelled bookings are kept for audit but never participate in
    /// conflict checks.
    pub fn is_active(self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub field_id: Ulid,
    pub date: DateKey,
    /// Half-open `[start, end)`; end is persisted, not recomputed.
    pub range: TimeRange,
    pub duration_min: u32,
    pub customer: Customer,
    pub total_cents: i64,
    pub status: BookingStatus,
    pub idempotency_key: Option<String>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Field-level state that is read-mostly from the booking path: identity,
/// hours, pricing, and the fully-blocked dates set. Per-date state lives in
/// `DaySchedule`.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    pub id: Ulid,
    pub name: Option<String>,
    pub hours: OperatingHours,
    pub price_per_hour_cents: i64,
    /// Permitted booking lengths in minutes. Carried for clients; intake
    /// validation of the chosen duration is a collaborator concern.
    pub allowed_durations_min: Vec<u32>,
    pub active: bool,
    pub blocked_dates: HashSet<DateKey>,
}

impl FieldMeta {
    pub fn new(
        id: Ulid,
        name: Option<String>,
        hours: OperatingHours,
        price_per_hour_cents: i64,
        allowed_durations_min: Vec<u32>,
    ) -> Self {
        Self {
            id,
            name,
            hours,
            price_per_hour_cents,
            allowed_durations_min,
            active: true,
            blocked_dates: HashSet::new(),
        }
    }
}

/// One field's state for one calendar date: its bookings (sorted by range
/// start) and its blocked 30-minute slot starts.
#[derive(Debug, Clone, Default)]
pub struct DaySchedule {
    pub bookings: Vec<Booking>,
    pub blocked_slots: BTreeSet<Minutes>,
}

impl DaySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a booking maintaining sort order by range start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.range.start, |b| b.range.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Non-cancelled bookings whose range overlaps the query window.
    /// Binary search skips bookings starting at or after `query.end`.
    pub fn active_overlapping(&self, query: TimeRange) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.range.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.is_active() && b.range.end > query.start)
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty() && self.blocked_slots.is_empty()
    }
}

/// The event types — this is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    FieldCreated {
        id: Ulid,
        name: Option<String>,
        hours: OperatingHours,
        price_per_hour_cents: i64,
        allowed_durations_min: Vec<u32>,
        active: bool,
    },
    FieldUpdated {
        id: Ulid,
        name: Option<String>,
        hours: OperatingHours,
        price_per_hour_cents: i64,
        allowed_durations_min: Vec<u32>,
        active: bool,
    },
    FieldDeleted {
        id: Ulid,
    },
    DatesBlocked {
        field_id: Ulid,
        dates: Vec<DateKey>,
    },
    DatesUnblocked {
        field_id: Ulid,
        dates: Vec<DateKey>,
    },
    SlotsBlocked {
        field_id: Ulid,
        date: DateKey,
        slots: Vec<Minutes>,
    },
    SlotsUnblocked {
        field_id: Ulid,
        date: DateKey,
        slots: Vec<Minutes>,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingStatusChanged {
        id: Ulid,
        field_id: Ulid,
        date: DateKey,
        status: BookingStatus,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub id: Ulid,
    pub name: Option<String>,
    pub hours: OperatingHours,
    pub price_per_hour_cents: i64,
    pub allowed_durations_min: Vec<u32>,
    pub active: bool,
    /// Sorted for stable output.
    pub blocked_dates: Vec<DateKey>,
}

impl FieldInfo {
    pub fn from_meta(meta: &FieldMeta) -> Self {
        let mut blocked_dates: Vec<DateKey> = meta.blocked_dates.iter().copied().collect();
        blocked_dates.sort();
        Self {
            id: meta.id,
            name: meta.name.clone(),
            hours: meta.hours,
            price_per_hour_cents: meta.price_per_hour_cents,
            allowed_durations_min: meta.allowed_durations_min.clone(),
            active: meta.active,
            blocked_dates,
        }
    }
}

/// One candidate start time on the display grid with its verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotStatus {
    pub start: Minutes,
    pub is_available: bool,
    pub is_booked: bool,
    pub is_blocked: bool,
    pub extends_past_close: bool,
}

/// Availability of one field on one date for a requested duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAvailability {
    pub slots: Vec<SlotStatus>,
    /// Merged `[start, end)` ranges of non-cancelled bookings, so clients can
    /// render "already booked 14:00–16:00" without recomputing from flags.
    pub booked_ranges: Vec<TimeRange>,
    pub open: Minutes,
    pub close: Minutes,
}
