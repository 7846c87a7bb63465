//! Data Transfer Objects for the HTTP API.
//!
//! Clock times cross the wire as `HH:MM` strings and dates as `YYYY-MM-DD`;
//! durations as hours. Conversion to the engine's minute arithmetic happens
//! at this boundary.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub use crate::engine::{BookingReceipt, CreateBookingRequest};
use crate::model::{Booking, BookingStatus, DayAvailability, FieldInfo};
use crate::timegrid::format_clock;

/// Request body for creating a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFieldRequest {
    #[serde(default)]
    pub name: Option<String>,
    /// `HH:MM`; defaults to 08:00 when omitted.
    #[serde(default)]
    pub open: Option<String>,
    /// `HH:MM`; defaults to 23:00 when omitted.
    #[serde(default)]
    pub close: Option<String>,
    pub price_per_hour_cents: i64,
    /// Permitted booking lengths in hours, e.g. `[1, 1.5, 2]`.
    #[serde(default)]
    pub allowed_durations: Vec<f64>,
}

/// Partial field update; omitted members stay unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFieldRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub open: Option<String>,
    #[serde(default)]
    pub close: Option<String>,
    #[serde(default)]
    pub price_per_hour_cents: Option<i64>,
    #[serde(default)]
    pub allowed_durations: Option<Vec<f64>>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldResponse {
    pub id: Ulid,
    pub name: Option<String>,
    pub open: String,
    pub close: String,
    pub price_per_hour_cents: i64,
    pub allowed_durations: Vec<f64>,
    pub active: bool,
    pub blocked_dates: Vec<String>,
}

impl From<FieldInfo> for FieldResponse {
    fn from(info: FieldInfo) -> Self {
        Self {
            id: info.id,
            name: info.name,
            open: format_clock(info.hours.open),
            close: format_clock(info.hours.close),
            price_per_hour_cents: info.price_per_hour_cents,
            allowed_durations: info
                .allowed_durations_min
                .iter()
                .map(|&m| m as f64 / 60.0)
                .collect(),
            active: info.active,
            blocked_dates: info.blocked_dates.iter().map(|d| d.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldListResponse {
    pub fields: Vec<FieldResponse>,
    pub total: usize,
}

/// Query parameters for the availability endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Requested duration in hours; defaults to 1.
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDto {
    pub time: String,
    pub is_available: bool,
    pub is_booked: bool,
    pub is_blocked: bool,
    pub extends_past_close: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedRangeDto {
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub slots: Vec<SlotDto>,
    pub booked_ranges: Vec<BookedRangeDto>,
    pub open: String,
    pub close: String,
}

impl From<DayAvailability> for AvailabilityResponse {
    fn from(view: DayAvailability) -> Self {
        Self {
            slots: view
                .slots
                .iter()
                .map(|s| SlotDto {
                    time: format_clock(s.start),
                    is_available: s.is_available,
                    is_booked: s.is_booked,
                    is_blocked: s.is_blocked,
                    extends_past_close: s.extends_past_close,
                })
                .collect(),
            booked_ranges: view
                .booked_ranges
                .iter()
                .map(|r| BookedRangeDto {
                    start_time: format_clock(r.start),
                    end_time: format_clock(r.end),
                })
                .collect(),
            open: format_clock(view.open),
            close: format_clock(view.close),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: Ulid,
    pub field_id: Ulid,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub duration: f64,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: String,
    pub total_cents: i64,
    pub status: BookingStatus,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            field_id: b.field_id,
            date: b.date.to_string(),
            start_time: format_clock(b.range.start),
            end_time: format_clock(b.range.end),
            duration: b.duration_min as f64 / 60.0,
            user_name: b.customer.name,
            user_email: b.customer.email,
            user_phone: b.customer.phone,
            total_cents: b.total_cents,
            status: b.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingsQuery {
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDatesRequest {
    pub dates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSlotsRequest {
    pub date: String,
    /// `HH:MM` on 30-minute boundaries.
    pub time_slots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedSlotsResponse {
    pub date: String,
    pub time_slots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
