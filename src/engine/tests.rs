use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use ulid::Ulid;

use super::*;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::timegrid::{Minutes, TimeRange};

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("fieldbook_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn new_engine(name: &str) -> Engine {
    Engine::new(test_wal_path(name), Arc::new(NotifyHub::new())).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> DateKey {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn field_spec() -> FieldSpec {
    FieldSpec {
        name: Some("Main Pitch".into()),
        hours: None, // 08:00–23:00
        price_per_hour_cents: 4000,
        allowed_durations_min: vec![60, 90, 120, 180],
    }
}

fn request(field_id: Ulid, date: &str, start: &str, duration: f64) -> CreateBookingRequest {
    CreateBookingRequest {
        field_id,
        user_name: "Dana".into(),
        user_email: "dana@example.com".into(),
        user_phone: "+15550100".into(),
        date: date.into(),
        start_time: start.into(),
        duration,
        idempotency_key: None,
    }
}

fn slot(view: &DayAvailability, start: Minutes) -> SlotStatus {
    *view.slots.iter().find(|s| s.start == start).expect("slot on grid")
}

// ── Field CRUD ───────────────────────────────────────────

#[tokio::test]
async fn create_and_get_field() {
    let engine = new_engine("create_field.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();

    let info = engine.get_field_info(id).await.unwrap();
    assert_eq!(info.name.as_deref(), Some("Main Pitch"));
    assert_eq!(info.hours, OperatingHours::default());
    assert!(info.active);
    assert!(info.blocked_dates.is_empty());
}

#[tokio::test]
async fn duplicate_field_rejected() {
    let engine = new_engine("dup_field.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    let result = engine.create_field(id, field_spec()).await;
    assert!(matches!(result, Err(EngineError::AlreadyExists(_))));
}

#[tokio::test]
async fn field_with_invalid_hours_rejected() {
    let engine = new_engine("bad_hours.wal");
    let mut s = field_spec();
    s.hours = Some(OperatingHours { open: 1380, close: 480 });
    let result = engine.create_field(Ulid::new(), s).await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn update_field_deactivates() {
    let engine = new_engine("update_field.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    engine
        .update_field(
            id,
            FieldPatch {
                active: Some(false),
                ..FieldPatch::default()
            },
        )
        .await
        .unwrap();

    let info = engine.get_field_info(id).await.unwrap();
    assert!(!info.active);

    let result = engine.create_booking(request(id, "2025-06-01", "10:00", 1.0)).await;
    assert!(matches!(result, Err(EngineError::FieldInactive(_))));
}

#[tokio::test]
async fn delete_field_removes_state() {
    let engine = new_engine("delete_field.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    let receipt = engine
        .create_booking(request(id, "2025-06-01", "10:00", 1.0))
        .await
        .unwrap();

    engine.delete_field(id).await.unwrap();
    assert!(matches!(
        engine.get_field_info(id).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        engine.get_booking(receipt.booking_id).await,
        Err(EngineError::NotFound(_))
    ));
}

// ── Booking creation ─────────────────────────────────────

#[tokio::test]
async fn booking_happy_path() {
    let engine = new_engine("happy_path.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();

    let receipt = engine
        .create_booking(request(id, "2025-06-01", "10:00", 2.0))
        .await
        .unwrap();
    assert_eq!(receipt.status, BookingStatus::Pending);

    let booking = engine.get_booking(receipt.booking_id).await.unwrap();
    assert_eq!(booking.range, TimeRange::new(600, 720));
    assert_eq!(booking.duration_min, 120);
    assert_eq!(booking.total_cents, 8000); // 2h * 4000c
    assert_eq!(booking.customer.name, "Dana");
}

#[tokio::test]
async fn booking_unknown_field_not_found() {
    let engine = new_engine("unknown_field.wal");
    let result = engine
        .create_booking(request(Ulid::new(), "2025-06-01", "10:00", 1.0))
        .await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn booking_validation_precedes_storage() {
    // Duration 13h is rejected before the (nonexistent) field is even
    // looked up — validation errors, not NotFound.
    let engine = new_engine("validation_first.wal");
    let result = engine
        .create_booking(request(Ulid::new(), "2025-06-01", "10:00", 13.0))
        .await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn booking_rejects_malformed_input() {
    let engine = new_engine("malformed.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();

    for (date, start, duration) in [
        ("2025-6-1", "10:00", 1.0),   // unpadded date
        ("2025-06-01", "10:15", 1.0), // off-grid start
        ("2025-06-01", "25:00", 1.0), // bad clock
        ("2025-06-01", "10:00", 0.0), // zero duration
        ("2025-06-01", "10:00", 0.75), // not a 30-minute multiple
        ("2025-06-01", "10:00", -1.0),
    ] {
        let result = engine.create_booking(request(id, date, start, duration)).await;
        assert!(
            matches!(result, Err(EngineError::Validation(_))),
            "({date}, {start}, {duration}) should fail validation"
        );
    }

    let mut req = request(id, "2025-06-01", "10:00", 1.0);
    req.user_email = "   ".into();
    let result = engine.create_booking(req).await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn overlapping_booking_conflicts() {
    // Scenario: existing booking 10:00–12:00; a 11:00 2h request overlaps
    // at 11:00–12:00.
    let engine = new_engine("overlap.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    engine
        .create_booking(request(id, "2025-06-01", "10:00", 2.0))
        .await
        .unwrap();

    let result = engine
        .create_booking(request(id, "2025-06-01", "11:00", 2.0))
        .await;
    assert!(matches!(
        result,
        Err(EngineError::Conflict(ConflictKind::OverlapsBooking(_)))
    ));
}

#[tokio::test]
async fn back_to_back_bookings_do_not_conflict() {
    let engine = new_engine("back_to_back.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    engine
        .create_booking(request(id, "2025-06-01", "10:00", 2.0))
        .await
        .unwrap();

    // Starts exactly at the previous booking's end.
    engine
        .create_booking(request(id, "2025-06-01", "12:00", 1.0))
        .await
        .unwrap();
}

#[tokio::test]
async fn booking_outside_hours_conflicts() {
    let engine = new_engine("outside_hours.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();

    // 22:00 + 2h overflows the 23:00 close; rejected, not truncated.
    let result = engine
        .create_booking(request(id, "2025-06-01", "22:00", 2.0))
        .await;
    assert!(matches!(
        result,
        Err(EngineError::Conflict(ConflictKind::OutsideHours))
    ));
}

#[tokio::test]
async fn booking_on_blocked_date_conflicts() {
    let engine = new_engine("blocked_date.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    engine.block_dates(id, vec![date(2025, 6, 1)]).await.unwrap();

    let result = engine
        .create_booking(request(id, "2025-06-01", "10:00", 1.0))
        .await;
    assert!(matches!(
        result,
        Err(EngineError::Conflict(ConflictKind::DateBlocked))
    ));
}

#[tokio::test]
async fn booking_over_blocked_slot_conflicts() {
    let engine = new_engine("blocked_slot.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    // Block 10:30–11:00; the 10:00–11:00 request partially overlaps it.
    engine
        .block_time_slots(id, date(2025, 6, 1), vec![630])
        .await
        .unwrap();

    let result = engine
        .create_booking(request(id, "2025-06-01", "10:00", 1.0))
        .await;
    assert!(matches!(
        result,
        Err(EngineError::Conflict(ConflictKind::SlotBlocked))
    ));
}

#[tokio::test]
async fn cross_midnight_booking_is_validation_error() {
    let engine = new_engine("cross_midnight.wal");
    let id = Ulid::new();
    let mut s = field_spec();
    s.hours = Some(OperatingHours { open: 480, close: 1440 });
    engine.create_field(id, s).await.unwrap();

    // 23:00 + 1h ends exactly at midnight — allowed.
    engine
        .create_booking(request(id, "2025-06-01", "23:00", 1.0))
        .await
        .unwrap();

    // 23:00 + 2h would cross midnight — malformed, not a conflict.
    let result = engine
        .create_booking(request(id, "2025-06-02", "23:00", 2.0))
        .await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

// ── Idempotency ──────────────────────────────────────────

#[tokio::test]
async fn duplicate_submission_rejected_with_original_id() {
    let engine = new_engine("idempotency.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();

    let mut req = request(id, "2025-06-01", "10:00", 1.0);
    req.idempotency_key = Some("retry-abc".into());
    let receipt = engine.create_booking(req.clone()).await.unwrap();

    // Retried submission for a different slot but the same key: still a
    // duplicate, carrying the original booking id.
    req.start_time = "14:00".into();
    let result = engine.create_booking(req).await;
    match result {
        Err(EngineError::DuplicateSubmission(original)) => {
            assert_eq!(original, receipt.booking_id)
        }
        other => panic!("expected DuplicateSubmission, got {other:?}"),
    }
}

// ── Availability ─────────────────────────────────────────

#[tokio::test]
async fn availability_reflects_bookings() {
    // Scenario: open 08:00–23:00, booking 10:00–12:00 confirmed; 1h query
    // marks 10:00/11:00 booked, 09:00/12:00 available.
    let engine = new_engine("avail_bookings.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    let receipt = engine
        .create_booking(request(id, "2025-06-01", "10:00", 2.0))
        .await
        .unwrap();
    engine
        .set_booking_status(receipt.booking_id, BookingStatus::Confirmed)
        .await
        .unwrap();

    let view = engine
        .availability(id, date(2025, 6, 1), Some(60))
        .await
        .unwrap();
    assert!(slot(&view, 600).is_booked);
    assert!(slot(&view, 660).is_booked);
    assert!(slot(&view, 540).is_available);
    assert!(slot(&view, 720).is_available);
    assert_eq!(view.booked_ranges, vec![TimeRange::new(600, 720)]);
}

#[tokio::test]
async fn availability_on_blocked_date() {
    // Scenario: a blocked date reports every slot blocked even with zero
    // bookings.
    let engine = new_engine("avail_blocked_date.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    engine.block_dates(id, vec![date(2025, 6, 1)]).await.unwrap();

    let view = engine
        .availability(id, date(2025, 6, 1), None)
        .await
        .unwrap();
    assert!(!view.slots.is_empty());
    assert!(view.slots.iter().all(|s| s.is_blocked && !s.is_available));
    assert!(view.slots.iter().all(|s| !s.is_booked));
}

#[tokio::test]
async fn availability_duration_sensitivity() {
    let engine = new_engine("avail_duration.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    engine
        .create_booking(request(id, "2025-06-01", "10:00", 2.0))
        .await
        .unwrap();

    let d = date(2025, 6, 1);
    let one = engine.availability(id, d, Some(60)).await.unwrap();
    let two = engine.availability(id, d, Some(120)).await.unwrap();
    // 09:00 fits one hour but a two-hour request runs into the booking.
    assert!(slot(&one, 540).is_available);
    assert!(!slot(&two, 540).is_available);
}

#[tokio::test]
async fn availability_unknown_field_not_found() {
    let engine = new_engine("avail_missing.wal");
    let result = engine.availability(Ulid::new(), date(2025, 6, 1), None).await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

// ── Blocking ─────────────────────────────────────────────

#[tokio::test]
async fn blocking_dates_is_idempotent() {
    let engine = new_engine("block_idempotent.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();

    let d = date(2025, 6, 1);
    engine.block_dates(id, vec![d]).await.unwrap();
    engine.block_dates(id, vec![d]).await.unwrap();

    let info = engine.get_field_info(id).await.unwrap();
    assert_eq!(info.blocked_dates, vec![d]);

    engine.unblock_dates(id, vec![d]).await.unwrap();
    let info = engine.get_field_info(id).await.unwrap();
    assert!(info.blocked_dates.is_empty());
}

#[tokio::test]
async fn unblocking_slots_empties_the_date_entry() {
    let engine = new_engine("unblock_empties.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();

    let d = date(2025, 6, 1);
    engine.block_time_slots(id, d, vec![600, 630]).await.unwrap();
    assert_eq!(engine.blocked_slots_for(id, d).await.unwrap(), vec![600, 630]);

    engine.unblock_time_slots(id, d, vec![600, 630]).await.unwrap();
    assert!(engine.blocked_slots_for(id, d).await.unwrap().is_empty());

    // The 10:00 slot is bookable again.
    engine
        .create_booking(request(id, "2025-06-01", "10:00", 1.0))
        .await
        .unwrap();
}

#[tokio::test]
async fn unblocking_unknown_date_is_noop() {
    let engine = new_engine("unblock_noop.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    engine
        .unblock_time_slots(id, date(2025, 6, 1), vec![600])
        .await
        .unwrap();
}

#[tokio::test]
async fn blocking_over_existing_booking_is_allowed() {
    // Policy: blocking prevents future bookings, it does not cancel
    // existing ones.
    let engine = new_engine("block_over_booking.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    let receipt = engine
        .create_booking(request(id, "2025-06-01", "10:00", 1.0))
        .await
        .unwrap();

    engine.block_dates(id, vec![date(2025, 6, 1)]).await.unwrap();

    let booking = engine.get_booking(receipt.booking_id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
}

#[tokio::test]
async fn misaligned_slots_rejected() {
    let engine = new_engine("bad_slots.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    let result = engine.block_time_slots(id, date(2025, 6, 1), vec![615]).await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

// ── Booking lifecycle ────────────────────────────────────

#[tokio::test]
async fn cancelling_reopens_the_slot() {
    let engine = new_engine("cancel_reopens.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    let receipt = engine
        .create_booking(request(id, "2025-06-01", "10:00", 1.0))
        .await
        .unwrap();

    engine.cancel_booking(receipt.booking_id).await.unwrap();

    // Same slot books again; the cancelled record stays for audit.
    engine
        .create_booking(request(id, "2025-06-01", "10:00", 1.0))
        .await
        .unwrap();
    let all = engine.bookings_for(id, Some(date(2025, 6, 1))).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(
        all.iter().filter(|b| b.status == BookingStatus::Cancelled).count(),
        1
    );
}

#[tokio::test]
async fn illegal_status_transitions_rejected() {
    let engine = new_engine("bad_transition.wal");
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();
    let receipt = engine
        .create_booking(request(id, "2025-06-01", "10:00", 1.0))
        .await
        .unwrap();
    let bid = receipt.booking_id;

    // Pending → Completed skips confirmation.
    let result = engine.set_booking_status(bid, BookingStatus::Completed).await;
    assert!(matches!(result, Err(EngineError::Validation(_))));

    engine.set_booking_status(bid, BookingStatus::Confirmed).await.unwrap();
    engine.set_booking_status(bid, BookingStatus::Completed).await.unwrap();

    // Completed is terminal.
    let result = engine.set_booking_status(bid, BookingStatus::Cancelled).await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

// ── Concurrency ──────────────────────────────────────────

#[tokio::test]
async fn concurrent_identical_bookings_one_wins() {
    // Scenario: two concurrent requests for the same field, date, start and
    // duration — exactly one gets a booking id, the other a conflict.
    let engine = Arc::new(new_engine("race_two.wal"));
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();

    let e1 = engine.clone();
    let e2 = engine.clone();
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { e1.create_booking(request(id, "2025-06-01", "10:00", 1.0)).await }),
        tokio::spawn(async move { e2.create_booking(request(id, "2025-06-01", "10:00", 1.0)).await }),
    );
    let results = [r1.unwrap(), r2.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser,
        Err(EngineError::Conflict(ConflictKind::OverlapsBooking(_)))
    ));
}

#[tokio::test]
async fn concurrent_swarm_preserves_non_overlap() {
    let engine = Arc::new(new_engine("race_swarm.wal"));
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let e = engine.clone();
        tasks.push(tokio::spawn(async move {
            e.create_booking(request(id, "2025-06-01", "10:00", 2.0)).await
        }));
    }
    let mut ok = 0;
    for t in tasks {
        if t.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 1);

    // The persisted non-cancelled ranges are pairwise non-overlapping.
    let bookings = engine.bookings_for(id, Some(date(2025, 6, 1))).await.unwrap();
    let active: Vec<_> = bookings.iter().filter(|b| b.is_active()).collect();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn concurrent_disjoint_slots_all_succeed() {
    let engine = Arc::new(new_engine("race_disjoint.wal"));
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();

    let starts = ["08:00", "10:00", "12:00", "14:00"];
    let mut tasks = Vec::new();
    for start in starts {
        let e = engine.clone();
        tasks.push(tokio::spawn(async move {
            e.create_booking(request(id, "2025-06-01", start, 2.0)).await
        }));
    }
    for t in tasks {
        t.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn concurrent_different_dates_all_succeed() {
    let engine = Arc::new(new_engine("race_dates.wal"));
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();

    let dates = ["2025-06-01", "2025-06-02", "2025-06-03"];
    let mut tasks = Vec::new();
    for d in dates {
        let e = engine.clone();
        tasks.push(tokio::spawn(async move {
            e.create_booking(request(id, d, "10:00", 1.0)).await
        }));
    }
    for t in tasks {
        t.await.unwrap().unwrap();
    }
}

// ── Durability ───────────────────────────────────────────

#[tokio::test]
async fn replay_restores_state() {
    let path = test_wal_path("replay_restore.wal");
    let id = Ulid::new();
    let d = date(2025, 6, 1);

    let (kept, cancelled) = {
        let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new())).unwrap();
        engine.create_field(id, field_spec()).await.unwrap();
        engine.block_dates(id, vec![date(2025, 7, 1)]).await.unwrap();
        engine.block_time_slots(id, d, vec![870]).await.unwrap(); // 14:30

        let kept = engine
            .create_booking(request(id, "2025-06-01", "10:00", 2.0))
            .await
            .unwrap()
            .booking_id;
        let cancelled = engine
            .create_booking(request(id, "2025-06-01", "12:00", 1.0))
            .await
            .unwrap()
            .booking_id;
        engine.cancel_booking(cancelled).await.unwrap();
        (kept, cancelled)
    };

    let engine = Engine::new(path, Arc::new(NotifyHub::new())).unwrap();

    let info = engine.get_field_info(id).await.unwrap();
    assert_eq!(info.blocked_dates, vec![date(2025, 7, 1)]);

    assert_eq!(engine.blocked_slots_for(id, d).await.unwrap(), vec![870]);

    let booking = engine.get_booking(kept).await.unwrap();
    assert_eq!(booking.range, TimeRange::new(600, 720));
    let booking = engine.get_booking(cancelled).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);

    // The cancelled slot is bookable again after replay.
    engine
        .create_booking(request(id, "2025-06-01", "12:00", 1.0))
        .await
        .unwrap();
    // The kept booking still conflicts after replay.
    let result = engine
        .create_booking(request(id, "2025-06-01", "10:00", 1.0))
        .await;
    assert!(matches!(
        result,
        Err(EngineError::Conflict(ConflictKind::OverlapsBooking(_)))
    ));
}

#[tokio::test]
async fn replay_restores_idempotency_index() {
    let path = test_wal_path("replay_idempotency.wal");
    let id = Ulid::new();

    let original = {
        let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new())).unwrap();
        engine.create_field(id, field_spec()).await.unwrap();
        let mut req = request(id, "2025-06-01", "10:00", 1.0);
        req.idempotency_key = Some("replayed-key".into());
        engine.create_booking(req).await.unwrap().booking_id
    };

    let engine = Engine::new(path, Arc::new(NotifyHub::new())).unwrap();
    let mut req = request(id, "2025-06-01", "14:00", 1.0);
    req.idempotency_key = Some("replayed-key".into());
    match engine.create_booking(req).await {
        Err(EngineError::DuplicateSubmission(bid)) => assert_eq!(bid, original),
        other => panic!("expected DuplicateSubmission, got {other:?}"),
    }
}

#[tokio::test]
async fn compaction_preserves_state() {
    let path = test_wal_path("compact_state.wal");
    let id = Ulid::new();
    let d = date(2025, 6, 1);

    let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new())).unwrap();
    engine.create_field(id, field_spec()).await.unwrap();
    // Churn the blocked set, then book.
    for _ in 0..5 {
        engine.block_dates(id, vec![date(2025, 7, 1)]).await.unwrap();
        engine.unblock_dates(id, vec![date(2025, 7, 1)]).await.unwrap();
    }
    let receipt = engine
        .create_booking(request(id, "2025-06-01", "10:00", 1.0))
        .await
        .unwrap();
    engine
        .set_booking_status(receipt.booking_id, BookingStatus::Confirmed)
        .await
        .unwrap();

    engine.compact_wal().await.unwrap();
    assert_eq!(engine.wal_appends_since_compact().await, 0);
    drop(engine);

    let engine = Engine::new(path, Arc::new(NotifyHub::new())).unwrap();
    let booking = engine.get_booking(receipt.booking_id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.range, TimeRange::new(600, 660));
    assert!(engine.get_field_info(id).await.unwrap().blocked_dates.is_empty());

    let view = engine.availability(id, d, Some(60)).await.unwrap();
    assert!(slot(&view, 600).is_booked);
}

// ── Domain events ────────────────────────────────────────

#[tokio::test]
async fn booking_creation_emits_event() {
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(test_wal_path("emits_event.wal"), notify.clone()).unwrap();
    let id = Ulid::new();
    engine.create_field(id, field_spec()).await.unwrap();

    let mut rx = notify.subscribe(id);
    let receipt = engine
        .create_booking(request(id, "2025-06-01", "10:00", 1.0))
        .await
        .unwrap();

    let event = rx.recv().await.unwrap();
    match event {
        Event::BookingCreated { booking } => assert_eq!(booking.id, receipt.booking_id),
        other => panic!("expected BookingCreated, got {other:?}"),
    }
}
