// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, NewAppointment};
use crate::services::lifecycle::{self, LedgerEffect};
use crate::store::AppointmentStore;
use availability_cell::{AvailabilityError, AvailabilityLedger, BusyInterval};
use shared_models::actor::Actor;
use shared_utils::clock::Clock;
use shared_utils::locks::KeyedMutex;

/// Result of a successful transition. `displaced` carries the competing
/// holds invalidated by a promotion; their owners must be told they lost
/// the slot (the caller's job, not this service's).
#[derive(Debug)]
pub struct TransitionOutcome {
    pub appointment: Appointment,
    pub displaced: Vec<BusyInterval>,
}

/// Owns appointment records and drives them through the lifecycle table,
/// keeping the availability ledger in step. Transitions serialize per
/// appointment id.
pub struct AppointmentService {
    store: Arc<dyn AppointmentStore>,
    ledger: Arc<AvailabilityLedger>,
    clock: Arc<dyn Clock>,
    transition_locks: KeyedMutex<Uuid>,
}

impl AppointmentService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        ledger: Arc<AvailabilityLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ledger,
            clock,
            transition_locks: KeyedMutex::new(),
        }
    }

    pub fn ledger(&self) -> &AvailabilityLedger {
        &self.ledger
    }

    pub fn store(&self) -> &dyn AppointmentStore {
        self.store.as_ref()
    }

    pub fn clock_now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Create a booking request: a HOLD on the doctor's calendar plus a
    /// Pending appointment record. The hold is released again if the
    /// record cannot be written.
    pub async fn create(&self, new: NewAppointment) -> Result<Appointment, AppointmentError> {
        let now = self.clock.now();
        if new.scheduled_end <= new.scheduled_start {
            return Err(AppointmentError::InvalidTime(
                "appointment end must be after its start".to_string(),
            ));
        }
        if new.scheduled_start <= now {
            return Err(AppointmentError::InvalidTime(
                "appointment must be scheduled for a future time".to_string(),
            ));
        }

        let appointment_id = Uuid::new_v4();
        let hold_id = self
            .ledger
            .place_hold(
                new.doctor_id,
                new.scheduled_start,
                new.scheduled_end,
                Some(appointment_id),
            )
            .await
            .map_err(map_ledger_error)?;

        let appointment = Appointment {
            id: appointment_id,
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            clinic_id: new.clinic_id,
            scheduled_start: new.scheduled_start,
            scheduled_end: new.scheduled_end,
            status: AppointmentStatus::Pending,
            symptoms: new.symptoms,
            notes: new.notes,
            rejection_reason: None,
            cancellation_reason: None,
            busy_ref: Some(hold_id),
            source_emergency_id: new.source_emergency_id,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.store.insert(appointment.clone()).await {
            warn!("Appointment insert failed, releasing hold {}: {}", hold_id, e);
            self.ledger.release(hold_id).await;
            return Err(AppointmentError::CollaboratorUnavailable(e.to_string()));
        }

        info!(
            "Appointment {} created pending for doctor {} [{} - {})",
            appointment.id, appointment.doctor_id, appointment.scheduled_start, appointment.scheduled_end
        );
        Ok(appointment)
    }

    /// Apply one lifecycle transition. Checks the table, the actor's role
    /// and their ownership of the appointment, then applies the ledger
    /// effect before persisting the new status.
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        target: AppointmentStatus,
        reason: Option<String>,
    ) -> Result<TransitionOutcome, AppointmentError> {
        let _guard = self.transition_locks.lock(&appointment_id).await;

        let mut appointment = self
            .store
            .fetch(appointment_id)
            .await
            .map_err(|e| AppointmentError::CollaboratorUnavailable(e.to_string()))?
            .ok_or(AppointmentError::NotFound)?;

        let effect = lifecycle::validate(appointment.status, actor.role(), target)?;
        check_ownership(&appointment, actor)?;

        let mut displaced = Vec::new();
        match effect {
            LedgerEffect::PromoteHold => {
                let hold_id = appointment.busy_ref.ok_or_else(|| {
                    warn!(
                        "Appointment {} is pending without a hold; refusing to confirm",
                        appointment.id
                    );
                    AppointmentError::Conflict
                })?;
                let outcome = self.ledger.promote(hold_id).await.map_err(map_ledger_error)?;
                displaced = outcome.displaced;
            }
            LedgerEffect::ReleaseInterval => {
                if let Some(interval_id) = appointment.busy_ref.take() {
                    self.ledger.release(interval_id).await;
                }
            }
            LedgerEffect::NoChange => {}
        }

        let from = appointment.status;
        appointment.status = target;
        appointment.updated_at = self.clock.now();
        match target {
            AppointmentStatus::Rejected => appointment.rejection_reason = reason,
            AppointmentStatus::CancelledByDoctor | AppointmentStatus::CancelledByPatient => {
                appointment.cancellation_reason = reason
            }
            _ => {}
        }

        self.store
            .update(appointment.clone())
            .await
            .map_err(|e| AppointmentError::CollaboratorUnavailable(e.to_string()))?;

        debug!("Appointment {} moved {} -> {}", appointment.id, from, target);
        Ok(TransitionOutcome {
            appointment,
            displaced,
        })
    }
}

fn check_ownership(appointment: &Appointment, actor: Actor) -> Result<(), AppointmentError> {
    match actor {
        Actor::Doctor(id) if id != appointment.doctor_id => Err(AppointmentError::PermissionDenied),
        Actor::Patient(id) if id != appointment.patient_id => {
            Err(AppointmentError::PermissionDenied)
        }
        _ => Ok(()),
    }
}

fn map_ledger_error(err: AvailabilityError) -> AppointmentError {
    match err {
        AvailabilityError::Conflict => AppointmentError::Conflict,
        AvailabilityError::InvalidInterval(msg) => AppointmentError::InvalidTime(msg),
        // Lead time never arises from hold/promote paths.
        AvailabilityError::LeadTime { .. } => AppointmentError::Conflict,
    }
}
