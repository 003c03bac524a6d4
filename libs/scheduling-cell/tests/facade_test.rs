use std::sync::Arc;
use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use chrono::Duration;
use uuid::Uuid;

use appointment_cell::{
    AppointmentError, AppointmentService, AppointmentStatus, AppointmentStore,
    InMemoryAppointmentStore,
};
use availability_cell::{AvailabilityLedger, BusyKind};
use dispatch_cell::{
    Ambulance, AmbulanceStatus, ConversionOverrides, DispatchEngine, EmergencyPriority,
    EmergencyStatus, GeoLocation, InMemoryAmbulanceFleet, InMemoryEmergencyStore,
    SubmitEmergencyRequest,
};
use scheduling_cell::{
    BlockDoctorTimeRequest, BookAppointmentRequest, SchedulingFacade,
};
use shared_gateways::{
    InMemoryStaffDirectory, NotificationEvent, RecordingNotifier, StaffMember, StaffType,
};
use shared_models::actor::Actor;
use shared_utils::clock::ManualClock;
use shared_utils::test_utils::{clock_at_epoch, slot_after_days, test_epoch, TestConfig};

struct Fixture {
    facade: SchedulingFacade,
    clock: Arc<ManualClock>,
    ledger: Arc<AvailabilityLedger>,
    store: Arc<InMemoryAppointmentStore>,
    fleet: Arc<InMemoryAmbulanceFleet>,
    directory: Arc<InMemoryStaffDirectory>,
    notifier: Arc<RecordingNotifier>,
    clinic_id: Uuid,
}

impl Fixture {
    fn new() -> Self {
        let config = TestConfig::default().to_arc();
        let clock = clock_at_epoch();
        let ledger = Arc::new(AvailabilityLedger::new(clock.clone()));
        let store = Arc::new(InMemoryAppointmentStore::new());
        let appointments = AppointmentService::new(store.clone(), ledger.clone(), clock.clone());
        let fleet = Arc::new(InMemoryAmbulanceFleet::new());
        let dispatch = DispatchEngine::new(
            Arc::new(InMemoryEmergencyStore::new()),
            fleet.clone(),
            clock.clone(),
        );
        let directory = Arc::new(InMemoryStaffDirectory::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let facade = SchedulingFacade::new(
            config,
            ledger.clone(),
            appointments,
            dispatch,
            directory.clone(),
            notifier.clone(),
        );

        Self {
            facade,
            clock,
            ledger,
            store,
            fleet,
            directory,
            notifier,
            clinic_id: Uuid::new_v4(),
        }
    }

    async fn ambulance(&self, clinic_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.fleet
            .add(Ambulance {
                id,
                clinic_id,
                status: AmbulanceStatus::Available,
                license_plate: format!("AMB-{}", &id.to_string()[..8]),
            })
            .await;
        id
    }

    fn booking(&self, patient_id: Uuid, doctor_id: Uuid) -> BookAppointmentRequest {
        let (start, end) = slot_after_days(1);
        BookAppointmentRequest {
            patient_id,
            doctor_id,
            clinic_id: self.clinic_id,
            scheduled_start: start,
            scheduled_end: end,
            symptoms: Some("migraine".to_string()),
            notes: None,
        }
    }

    fn emergency(&self, patient_id: Uuid) -> SubmitEmergencyRequest {
        SubmitEmergencyRequest {
            patient_id,
            location: GeoLocation {
                latitude: 52.52,
                longitude: 13.405,
                address: Some("Invalidenstrasse 43".to_string()),
            },
            priority: EmergencyPriority::Critical,
            clinic_id: Some(self.clinic_id),
        }
    }

    /// Let the fire-and-forget notification tasks run.
    async fn drain_notifications(&self) -> Vec<NotificationEvent> {
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        self.notifier.delivered().await
    }
}

#[tokio::test]
async fn end_to_end_emergency_becomes_confirmed_appointment() {
    let fx = Fixture::new();
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let ambulance_id = fx.ambulance(fx.clinic_id).await;
    let mut events = fx.facade.subscribe_dispatch_events();

    // Submit and dispatch.
    let emergency = fx.facade.submit_emergency(fx.emergency(patient_id)).await.expect("submit");
    assert_eq!(emergency.status, EmergencyStatus::Pending);

    let assigned = fx
        .facade
        .assign_emergency(emergency.id, ambulance_id, Some(doctor_id))
        .await
        .expect("assign");
    assert_eq!(assigned.status, EmergencyStatus::Assigned);

    // Doctor acknowledges without changing state.
    let confirmed = fx
        .facade
        .confirm_emergency_doctor(emergency.id, doctor_id)
        .await
        .expect("doctor confirm");
    assert_eq!(confirmed.status, EmergencyStatus::Assigned);
    assert!(confirmed.doctor_acknowledged_at.is_some());

    // External progress signals.
    fx.facade
        .update_emergency_progress(emergency.id, EmergencyStatus::EnRoute, None)
        .await
        .expect("en route");
    fx.facade
        .update_emergency_progress(emergency.id, EmergencyStatus::Arrived, None)
        .await
        .expect("arrived");

    // Conversion: same pre-assigned doctor, so the appointment confirms
    // immediately.
    let (start, _) = slot_after_days(1);
    let appointment = fx
        .facade
        .convert_emergency_to_appointment(
            emergency.id,
            ConversionOverrides {
                appointment_time: Some(start),
                duration_minutes: Some(40),
                ..ConversionOverrides::default()
            },
        )
        .await
        .expect("conversion");

    assert_eq!(appointment.status, AppointmentStatus::Confirmed);
    assert_eq!(appointment.patient_id, patient_id);
    assert_eq!(appointment.doctor_id, doctor_id);
    assert_eq!(appointment.source_emergency_id, Some(emergency.id));

    // The emergency is linked but not advanced by the conversion.
    let after = fx.facade.dispatch().get(emergency.id).await.expect("get");
    assert_eq!(after.status, EmergencyStatus::Arrived);
    assert_eq!(after.converted_appointment_id, Some(appointment.id));

    // The change feed saw every lifecycle move.
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event.status);
    }
    assert_eq!(
        seen,
        vec![
            EmergencyStatus::Pending,
            EmergencyStatus::Assigned,
            EmergencyStatus::EnRoute,
            EmergencyStatus::Arrived,
        ]
    );

    // The assignment notification went out.
    let delivered = fx.drain_notifications().await;
    assert!(delivered
        .iter()
        .any(|e| matches!(e, NotificationEvent::EmergencyAssigned { emergency_id, .. } if *emergency_id == emergency.id)));
}

#[tokio::test]
async fn conversion_to_a_different_doctor_stays_pending() {
    let fx = Fixture::new();
    let doctor_id = Uuid::new_v4();
    let other_doctor = Uuid::new_v4();
    let ambulance_id = fx.ambulance(fx.clinic_id).await;

    let emergency = fx.facade.submit_emergency(fx.emergency(Uuid::new_v4())).await.expect("submit");
    fx.facade
        .assign_emergency(emergency.id, ambulance_id, Some(doctor_id))
        .await
        .expect("assign");
    fx.facade
        .update_emergency_progress(emergency.id, EmergencyStatus::EnRoute, None)
        .await
        .expect("en route");
    fx.facade
        .update_emergency_progress(emergency.id, EmergencyStatus::Arrived, None)
        .await
        .expect("arrived");

    let appointment = fx
        .facade
        .convert_emergency_to_appointment(
            emergency.id,
            ConversionOverrides {
                doctor_id: Some(other_doctor),
                ..ConversionOverrides::default()
            },
        )
        .await
        .expect("conversion");

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.doctor_id, other_doctor);
}

#[tokio::test]
async fn booking_is_blocked_by_leave_and_foreign_holds() {
    let fx = Fixture::new();
    let doctor_id = Uuid::new_v4();

    // Leave blocks the whole window.
    let (leave_start, leave_end) = slot_after_days(4);
    fx.facade
        .block_doctor_time(
            doctor_id,
            BlockDoctorTimeRequest {
                start: leave_start,
                end: leave_end,
                reason: Some("conference".to_string()),
            },
        )
        .await
        .expect("leave");

    let mut inside_leave = fx.booking(Uuid::new_v4(), doctor_id);
    inside_leave.scheduled_start = leave_start;
    inside_leave.scheduled_end = leave_end;
    assert_matches!(
        fx.facade.book_appointment(inside_leave).await,
        Err(AppointmentError::Conflict)
    );

    // Another patient's hold blocks the slot; the holder's own repeat
    // request does not.
    let holder = Uuid::new_v4();
    fx.facade.book_appointment(fx.booking(holder, doctor_id)).await.expect("first booking");
    assert_matches!(
        fx.facade.book_appointment(fx.booking(Uuid::new_v4(), doctor_id)).await,
        Err(AppointmentError::Conflict)
    );
    fx.facade
        .book_appointment(fx.booking(holder, doctor_id))
        .await
        .expect("own hold does not block the same patient");
}

#[tokio::test]
async fn losing_a_slot_race_notifies_the_displaced_patient() {
    let fx = Fixture::new();
    let doctor_id = Uuid::new_v4();
    let winner_patient = Uuid::new_v4();
    let loser_patient = Uuid::new_v4();

    let winner = fx.facade.book_appointment(fx.booking(winner_patient, doctor_id)).await.expect("winner");

    // A rival who passed the free-slot check concurrently and already
    // holds the same slot: hold and record written directly, as the
    // booking path would have under the race.
    let rival = {
        let request = fx.booking(loser_patient, doctor_id);
        let rival_id = Uuid::new_v4();
        let hold_id = fx
            .ledger
            .place_hold(doctor_id, request.scheduled_start, request.scheduled_end, Some(rival_id))
            .await
            .expect("rival hold");
        let record = appointment_cell::Appointment {
            id: rival_id,
            patient_id: loser_patient,
            doctor_id,
            clinic_id: request.clinic_id,
            scheduled_start: request.scheduled_start,
            scheduled_end: request.scheduled_end,
            status: AppointmentStatus::Pending,
            symptoms: None,
            notes: None,
            rejection_reason: None,
            cancellation_reason: None,
            busy_ref: Some(hold_id),
            source_emergency_id: None,
            created_at: test_epoch(),
            updated_at: test_epoch(),
        };
        fx.store.insert(record.clone()).await.expect("rival record");
        record
    };

    fx.facade
        .transition_appointment(winner.id, Actor::Doctor(doctor_id), AppointmentStatus::Confirmed, None)
        .await
        .expect("confirm");

    let delivered = fx.drain_notifications().await;
    assert!(delivered.iter().any(|e| matches!(
        e,
        NotificationEvent::AppointmentConfirmed { appointment_id, .. } if *appointment_id == winner.id
    )));
    assert!(delivered.iter().any(|e| matches!(
        e,
        NotificationEvent::SlotLost { appointment_id, patient_id, .. }
            if *appointment_id == rival.id && *patient_id == loser_patient
    )));

    // The loser's later confirmation attempt finds the slot gone.
    assert_matches!(
        fx.facade
            .transition_appointment(rival.id, Actor::Doctor(doctor_id), AppointmentStatus::Confirmed, None)
            .await,
        Err(AppointmentError::Conflict)
    );
}

#[tokio::test]
async fn leave_reports_coexisting_confirmed_appointments() {
    let fx = Fixture::new();
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    // Book and confirm a slot five days out.
    let (start, end) = slot_after_days(5);
    let mut request = fx.booking(patient_id, doctor_id);
    request.scheduled_start = start;
    request.scheduled_end = end;
    let appointment = fx.facade.book_appointment(request).await.expect("booking");
    fx.facade
        .transition_appointment(appointment.id, Actor::Doctor(doctor_id), AppointmentStatus::Confirmed, None)
        .await
        .expect("confirm");

    // Leave over the same window is accepted but flags the coexistence.
    let blocked = fx
        .facade
        .block_doctor_time(
            doctor_id,
            BlockDoctorTimeRequest {
                start: start - Duration::hours(4),
                end: end + Duration::hours(4),
                reason: None,
            },
        )
        .await
        .expect("leave");

    assert_eq!(blocked.coexisting_appointments.len(), 1);
    assert_eq!(blocked.coexisting_appointments[0].kind, BusyKind::Appointment);
    assert_eq!(blocked.coexisting_appointments[0].ref_id, Some(appointment.id));
}

#[tokio::test]
async fn expiry_sweep_clears_stale_pending_bookings() {
    let fx = Fixture::new();
    let doctor_id = Uuid::new_v4();

    let appointment = fx.facade.book_appointment(fx.booking(Uuid::new_v4(), doctor_id)).await.expect("booking");
    fx.clock.advance(Duration::hours(25));

    let expired = fx.facade.expire_stale_bookings().await.expect("sweep");
    assert_eq!(expired, vec![appointment.id]);

    let stored = fx.facade.get_appointment(appointment.id).await.expect("get");
    assert_eq!(stored.status, AppointmentStatus::Expired);

    // The hold is gone; the slot books again.
    assert!(fx
        .facade
        .doctor_schedule(doctor_id, test_epoch(), test_epoch() + Duration::days(2))
        .await
        .is_empty());
}

#[tokio::test]
async fn candidates_scope_ambulances_and_accumulate_the_doctor_feed() {
    let fx = Fixture::new();
    let ambulance_here = fx.ambulance(fx.clinic_id).await;
    let _ambulance_elsewhere = fx.ambulance(Uuid::new_v4()).await;

    for i in 0..3 {
        fx.directory
            .add_member(StaffMember {
                id: Uuid::new_v4(),
                staff_type: StaffType::Doctor,
                first_name: format!("Doc{i}"),
                last_name: "Example".to_string(),
                is_available: true,
            })
            .await;
    }
    fx.directory
        .add_member(StaffMember {
            id: Uuid::new_v4(),
            staff_type: StaffType::Nurse,
            first_name: "Nia".to_string(),
            last_name: "Example".to_string(),
            is_available: true,
        })
        .await;

    let emergency = fx.facade.submit_emergency(fx.emergency(Uuid::new_v4())).await.expect("submit");
    let candidates = fx.facade.dispatch_candidates(emergency.id).await.expect("candidates");

    assert_eq!(candidates.ambulances.len(), 1);
    assert_eq!(candidates.ambulances[0].id, ambulance_here);
    assert_eq!(candidates.doctors.len(), 3);
    assert!(candidates
        .doctors
        .iter()
        .all(|d| d.staff_type == StaffType::Doctor));
}
