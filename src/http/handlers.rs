//! HTTP handlers. Each handler decodes the wire record, delegates to the
//! engine, and maps the outcome back to a response.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use ulid::Ulid;

use crate::engine::{parse_date, CreateBookingRequest, FieldPatch, FieldSpec};
use crate::model::{DateKey, OperatingHours};
use crate::timegrid::{parse_clock, Minutes};

use super::dto::*;
use super::error::AppError;
use super::state::AppState;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

// ── Health ───────────────────────────────────────────────

/// GET /health
pub async fn health_check() -> HandlerResult<HealthResponse> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

// ── Decoding helpers ─────────────────────────────────────

fn parse_clock_field(label: &str, value: &str) -> Result<Minutes, AppError> {
    parse_clock(value).map_err(|e| AppError::BadRequest(format!("{label}: {e}")))
}

fn parse_hours(open: Option<&str>, close: Option<&str>) -> Result<Option<OperatingHours>, AppError> {
    if open.is_none() && close.is_none() {
        return Ok(None);
    }
    let open = parse_clock_field("open", open.unwrap_or("08:00"))?;
    let close = parse_clock_field("close", close.unwrap_or("23:00"))?;
    Ok(Some(OperatingHours { open, close }))
}

fn hours_to_minutes(label: &str, hours: f64) -> Result<u32, AppError> {
    if !hours.is_finite() || hours <= 0.0 {
        return Err(AppError::BadRequest(format!("{label} must be positive")));
    }
    let minutes = hours * 60.0;
    if (minutes - minutes.round()).abs() > 1e-9 {
        return Err(AppError::BadRequest(format!(
            "{label} must be a whole number of minutes"
        )));
    }
    Ok(minutes.round() as u32)
}

fn durations_to_minutes(durations: &[f64]) -> Result<Vec<u32>, AppError> {
    durations
        .iter()
        .map(|&h| hours_to_minutes("allowed_durations", h))
        .collect()
}

fn parse_dates(dates: &[String]) -> Result<Vec<DateKey>, AppError> {
    dates
        .iter()
        .map(|d| parse_date(d).map_err(AppError::from))
        .collect()
}

fn parse_slots(slots: &[String]) -> Result<Vec<Minutes>, AppError> {
    slots
        .iter()
        .map(|s| parse_clock_field("time_slots", s))
        .collect()
}

// ── Fields ───────────────────────────────────────────────

/// GET /v1/fields
pub async fn list_fields(State(state): State<AppState>) -> HandlerResult<FieldListResponse> {
    let fields: Vec<FieldResponse> = state
        .engine
        .list_fields()
        .await
        .into_iter()
        .map(Into::into)
        .collect();
    let total = fields.len();
    Ok(Json(FieldListResponse { fields, total }))
}

/// POST /v1/fields
pub async fn create_field(
    State(state): State<AppState>,
    Json(req): Json<CreateFieldRequest>,
) -> Result<(StatusCode, Json<FieldResponse>), AppError> {
    let hours = parse_hours(req.open.as_deref(), req.close.as_deref())?;
    let allowed_durations_min = durations_to_minutes(&req.allowed_durations)?;

    let id = Ulid::new();
    state
        .engine
        .create_field(
            id,
            FieldSpec {
                name: req.name,
                hours,
                price_per_hour_cents: req.price_per_hour_cents,
                allowed_durations_min,
            },
        )
        .await?;
    let info = state.engine.get_field_info(id).await?;
    Ok((StatusCode::CREATED, Json(info.into())))
}

/// GET /v1/fields/{id}
pub async fn get_field(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
) -> HandlerResult<FieldResponse> {
    let info = state.engine.get_field_info(id).await?;
    Ok(Json(info.into()))
}

/// PATCH /v1/fields/{id}
pub async fn update_field(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(req): Json<UpdateFieldRequest>,
) -> HandlerResult<FieldResponse> {
    let hours = parse_hours(req.open.as_deref(), req.close.as_deref())?;
    let allowed_durations_min = match req.allowed_durations {
        Some(ref d) => Some(durations_to_minutes(d)?),
        None => None,
    };
    state
        .engine
        .update_field(
            id,
            FieldPatch {
                name: req.name,
                hours,
                price_per_hour_cents: req.price_per_hour_cents,
                allowed_durations_min,
                active: req.active,
            },
        )
        .await?;
    let info = state.engine.get_field_info(id).await?;
    Ok(Json(info.into()))
}

/// DELETE /v1/fields/{id}
pub async fn delete_field(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
) -> Result<StatusCode, AppError> {
    state.engine.delete_field(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Availability ─────────────────────────────────────────

/// GET /v1/fields/{id}/availability?date=YYYY-MM-DD&duration=1.5
pub async fn get_availability(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Query(q): Query<AvailabilityQuery>,
) -> HandlerResult<AvailabilityResponse> {
    let date = parse_date(&q.date)?;
    let duration_min = match q.duration {
        Some(h) => Some(hours_to_minutes("duration", h)?),
        None => None,
    };
    let view = state.engine.availability(id, date, duration_min).await?;
    Ok(Json(view.into()))
}

// ── Bookings ─────────────────────────────────────────────

/// POST /v1/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingReceipt>), AppError> {
    let receipt = state.engine.create_booking(req).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /v1/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
) -> HandlerResult<BookingResponse> {
    let booking = state.engine.get_booking(id).await?;
    Ok(Json(booking.into()))
}

/// POST /v1/bookings/{id}/status — the owner-facing transition surface.
pub async fn set_booking_status(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(req): Json<StatusChangeRequest>,
) -> HandlerResult<BookingResponse> {
    state.engine.set_booking_status(id, req.status).await?;
    let booking = state.engine.get_booking(id).await?;
    Ok(Json(booking.into()))
}

/// GET /v1/fields/{id}/bookings?date=YYYY-MM-DD
pub async fn list_bookings(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Query(q): Query<BookingsQuery>,
) -> HandlerResult<Vec<BookingResponse>> {
    let date = match q.date {
        Some(ref d) => Some(parse_date(d)?),
        None => None,
    };
    let bookings = state.engine.bookings_for(id, date).await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

// ── Blocking ─────────────────────────────────────────────

/// POST /v1/fields/{id}/block-dates
pub async fn block_dates(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(req): Json<BlockDatesRequest>,
) -> HandlerResult<FieldResponse> {
    let dates = parse_dates(&req.dates)?;
    state.engine.block_dates(id, dates).await?;
    let info = state.engine.get_field_info(id).await?;
    Ok(Json(info.into()))
}

/// POST /v1/fields/{id}/unblock-dates
pub async fn unblock_dates(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(req): Json<BlockDatesRequest>,
) -> HandlerResult<FieldResponse> {
    let dates = parse_dates(&req.dates)?;
    state.engine.unblock_dates(id, dates).await?;
    let info = state.engine.get_field_info(id).await?;
    Ok(Json(info.into()))
}

/// POST /v1/fields/{id}/block-slots
pub async fn block_slots(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(req): Json<BlockSlotsRequest>,
) -> HandlerResult<BlockedSlotsResponse> {
    let date = parse_date(&req.date)?;
    let slots = parse_slots(&req.time_slots)?;
    state.engine.block_time_slots(id, date, slots).await?;
    blocked_slots_response(&state, id, date).await
}

/// POST /v1/fields/{id}/unblock-slots
pub async fn unblock_slots(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(req): Json<BlockSlotsRequest>,
) -> HandlerResult<BlockedSlotsResponse> {
    let date = parse_date(&req.date)?;
    let slots = parse_slots(&req.time_slots)?;
    state.engine.unblock_time_slots(id, date, slots).await?;
    blocked_slots_response(&state, id, date).await
}

async fn blocked_slots_response(
    state: &AppState,
    id: Ulid,
    date: DateKey,
) -> HandlerResult<BlockedSlotsResponse> {
    let slots = state.engine.blocked_slots_for(id, date).await?;
    Ok(Json(BlockedSlotsResponse {
        date: date.to_string(),
        time_slots: slots
            .into_iter()
            .map(crate::timegrid::format_clock)
            .collect(),
    }))
}
