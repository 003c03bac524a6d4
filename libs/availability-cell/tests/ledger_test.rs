use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Duration;
use rand::{seq::SliceRandom, Rng};
use uuid::Uuid;

use availability_cell::{AvailabilityError, AvailabilityLedger, BusyKind, MIN_LEAVE_NOTICE_DAYS};
use shared_utils::test_utils::{clock_at_epoch, slot_after_days, test_epoch};

fn ledger() -> Arc<AvailabilityLedger> {
    Arc::new(AvailabilityLedger::new(clock_at_epoch()))
}

#[tokio::test]
async fn hold_then_promote_occupies_slot() {
    let ledger = ledger();
    let doctor_id = Uuid::new_v4();
    let (start, end) = slot_after_days(1);

    let hold_id = ledger
        .place_hold(doctor_id, start, end, Some(Uuid::new_v4()))
        .await
        .expect("hold should be placed");

    let outcome = ledger.promote(hold_id).await.expect("promotion should succeed");
    assert_eq!(outcome.interval_id, hold_id);
    assert!(outcome.displaced.is_empty());

    let intervals = ledger.query(doctor_id, start, end).await;
    assert_eq!(intervals.len(), 1);
    assert_eq!(intervals[0].kind, BusyKind::Appointment);
}

#[tokio::test]
async fn overlapping_holds_are_permitted() {
    let ledger = ledger();
    let doctor_id = Uuid::new_v4();
    let (start, end) = slot_after_days(1);

    ledger.place_hold(doctor_id, start, end, None).await.expect("first hold");
    ledger.place_hold(doctor_id, start, end, None).await.expect("second hold");

    assert_eq!(ledger.query(doctor_id, start, end).await.len(), 2);
}

#[tokio::test]
async fn hold_rejected_over_confirmed_appointment() {
    let ledger = ledger();
    let doctor_id = Uuid::new_v4();
    let (start, end) = slot_after_days(1);

    let hold_id = ledger.place_hold(doctor_id, start, end, None).await.expect("hold");
    ledger.promote(hold_id).await.expect("promotion");

    let result = ledger
        .place_hold(doctor_id, start + Duration::minutes(30), end + Duration::minutes(30), None)
        .await;
    assert_matches!(result, Err(AvailabilityError::Conflict));
}

#[tokio::test]
async fn second_promotion_of_overlapping_hold_loses() {
    let ledger = ledger();
    let doctor_id = Uuid::new_v4();
    let (start, end) = slot_after_days(1);

    let first = ledger.place_hold(doctor_id, start, end, None).await.expect("first hold");
    let second = ledger.place_hold(doctor_id, start, end, None).await.expect("second hold");

    let outcome = ledger.promote(first).await.expect("first promotion wins");
    assert_eq!(outcome.displaced.len(), 1);
    assert_eq!(outcome.displaced[0].id, second);

    // The losing hold was invalidated; promoting it is a conflict.
    assert_matches!(ledger.promote(second).await, Err(AvailabilityError::Conflict));

    let appointments: Vec<_> = ledger
        .query(doctor_id, start, end)
        .await
        .into_iter()
        .filter(|i| i.kind == BusyKind::Appointment)
        .collect();
    assert_eq!(appointments.len(), 1);
}

#[tokio::test]
async fn concurrent_promotions_have_exactly_one_winner() {
    let ledger = ledger();
    let doctor_id = Uuid::new_v4();
    let (start, end) = slot_after_days(1);

    let mut holds = Vec::new();
    for _ in 0..8 {
        holds.push(ledger.place_hold(doctor_id, start, end, None).await.expect("hold"));
    }

    let mut handles = Vec::new();
    for hold_id in holds {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move { ledger.promote(hold_id).await }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("task").is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn randomized_hold_promote_never_double_books() {
    let ledger = ledger();
    let doctor_id = Uuid::new_v4();
    let base = test_epoch() + Duration::days(1);

    // Random interleaving of holds and promotions over a small grid of
    // mutually overlapping slots.
    let mut rng = rand::thread_rng();
    let mut handles = Vec::new();
    for _ in 0..40 {
        let offset_minutes = *[0i64, 15, 30, 45].choose(&mut rng).unwrap();
        let duration_minutes = rng.gen_range(30..90);
        let start = base + Duration::minutes(offset_minutes);
        let end = start + Duration::minutes(duration_minutes);
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            if let Ok(hold_id) = ledger.place_hold(doctor_id, start, end, None).await {
                let _ = ledger.promote(hold_id).await;
            }
        }));
    }
    for handle in handles {
        handle.await.expect("task");
    }

    let appointments: Vec<_> = ledger
        .query(doctor_id, base - Duration::hours(1), base + Duration::hours(4))
        .await
        .into_iter()
        .filter(|i| i.kind == BusyKind::Appointment)
        .collect();

    for a in &appointments {
        for b in &appointments {
            if a.id != b.id {
                assert!(
                    !a.overlaps(b.start, b.end),
                    "two confirmed appointments overlap: {:?} and {:?}",
                    a,
                    b
                );
            }
        }
    }
}

#[tokio::test]
async fn release_is_idempotent() {
    let ledger = ledger();
    let doctor_id = Uuid::new_v4();
    let (start, end) = slot_after_days(1);

    let hold_id = ledger.place_hold(doctor_id, start, end, None).await.expect("hold");
    ledger.release(hold_id).await;
    ledger.release(hold_id).await;

    assert!(ledger.query(doctor_id, start, end).await.is_empty());
}

#[tokio::test]
async fn release_by_ref_removes_the_linked_interval() {
    let ledger = ledger();
    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let (start, end) = slot_after_days(1);

    ledger
        .place_hold(doctor_id, start, end, Some(appointment_id))
        .await
        .expect("hold");
    ledger.release_by_ref(appointment_id).await;
    ledger.release_by_ref(appointment_id).await;

    assert!(ledger.query(doctor_id, start, end).await.is_empty());
}

#[tokio::test]
async fn leave_inside_notice_window_is_rejected_with_earliest_date() {
    let ledger = ledger();
    let doctor_id = Uuid::new_v4();
    let (start, end) = slot_after_days(2);

    let result = ledger.block_leave(doctor_id, start, end, Some("conference".into())).await;
    let earliest = test_epoch() + Duration::days(MIN_LEAVE_NOTICE_DAYS);
    assert_matches!(result, Err(AvailabilityError::LeadTime { earliest_start }) => {
        assert_eq!(earliest_start, earliest);
    });
}

#[tokio::test]
async fn leave_at_exactly_three_days_is_accepted() {
    let ledger = ledger();
    let doctor_id = Uuid::new_v4();
    let (start, end) = slot_after_days(MIN_LEAVE_NOTICE_DAYS);

    let leave_id = ledger
        .block_leave(doctor_id, start, end, None)
        .await
        .expect("leave at the boundary should be accepted");

    let intervals = ledger.query(doctor_id, start, end).await;
    assert_eq!(intervals.len(), 1);
    assert_eq!(intervals[0].id, leave_id);
    assert_eq!(intervals[0].kind, BusyKind::Leave);
}

#[tokio::test]
async fn leave_coexists_with_booked_appointment() {
    let ledger = ledger();
    let doctor_id = Uuid::new_v4();
    let (start, end) = slot_after_days(4);

    let hold_id = ledger.place_hold(doctor_id, start, end, None).await.expect("hold");
    ledger.promote(hold_id).await.expect("promotion");

    ledger
        .block_leave(doctor_id, start - Duration::hours(2), end + Duration::hours(2), None)
        .await
        .expect("leave may coexist with an existing appointment");

    assert_eq!(ledger.query(doctor_id, start, end).await.len(), 2);
}

#[tokio::test]
async fn query_orders_by_start_then_kind() {
    let ledger = ledger();
    let (start, end) = slot_after_days(MIN_LEAVE_NOTICE_DAYS);

    // An appointment dominates a leave at the same slot.
    let doctor_a = Uuid::new_v4();
    ledger.block_leave(doctor_a, start, end, None).await.expect("leave");
    let winner = ledger.place_hold(doctor_a, start, end, None).await.expect("winner hold");
    ledger.promote(winner).await.expect("promotion");

    let kinds: Vec<BusyKind> = ledger
        .query(doctor_a, start, end)
        .await
        .iter()
        .map(|i| i.kind)
        .collect();
    assert_eq!(kinds, vec![BusyKind::Appointment, BusyKind::Leave]);

    // A hold dominates a leave at the same slot.
    let doctor_b = Uuid::new_v4();
    ledger.block_leave(doctor_b, start, end, None).await.expect("leave");
    ledger.place_hold(doctor_b, start, end, None).await.expect("hold");

    let kinds: Vec<BusyKind> = ledger
        .query(doctor_b, start, end)
        .await
        .iter()
        .map(|i| i.kind)
        .collect();
    assert_eq!(kinds, vec![BusyKind::Hold, BusyKind::Leave]);
}

#[tokio::test]
async fn invalid_range_is_rejected() {
    let ledger = ledger();
    let doctor_id = Uuid::new_v4();
    let (start, _) = slot_after_days(1);

    let result = ledger.place_hold(doctor_id, start, start, None).await;
    assert_matches!(result, Err(AvailabilityError::InvalidInterval(_)));
}
