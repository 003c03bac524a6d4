// libs/dispatch-cell/src/services/assignment.rs
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    transition_allowed, AppointmentSeed, ConversionOverrides, DispatchError, EmergencyFilter,
    EmergencyRequest, EmergencyStatus, SubmitEmergencyRequest,
};
use crate::services::events::DispatchEventStream;
use crate::services::triage;
use crate::store::{AmbulanceFleet, EmergencyStore};
use shared_utils::clock::Clock;
use shared_utils::locks::KeyedMutex;

/// Default length of a consult booked out of an emergency when the caller
/// does not override it.
const DEFAULT_CONVERSION_DURATION_MINUTES: i64 = 30;
/// How far ahead the converted consult is scheduled by default.
const DEFAULT_CONVERSION_LEAD_MINUTES: i64 = 30;

/// Owns emergency lifecycles: submission, escalation, resource assignment
/// and the conversion seed. All mutations serialize per emergency id; the
/// ambulance claim is a compare-and-set owned by the fleet.
pub struct DispatchEngine {
    store: Arc<dyn EmergencyStore>,
    fleet: Arc<dyn AmbulanceFleet>,
    clock: Arc<dyn Clock>,
    events: DispatchEventStream,
    emergency_locks: KeyedMutex<Uuid>,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<dyn EmergencyStore>,
        fleet: Arc<dyn AmbulanceFleet>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            fleet,
            clock,
            events: DispatchEventStream::new(),
            emergency_locks: KeyedMutex::new(),
        }
    }

    pub fn events(&self) -> &DispatchEventStream {
        &self.events
    }

    pub fn fleet(&self) -> &dyn AmbulanceFleet {
        self.fleet.as_ref()
    }

    pub async fn submit(
        &self,
        request: SubmitEmergencyRequest,
    ) -> Result<EmergencyRequest, DispatchError> {
        let now = self.clock.now();
        let emergency = EmergencyRequest {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            location: request.location,
            priority: request.priority,
            status: EmergencyStatus::Pending,
            clinic_id: request.clinic_id,
            ambulance_id: None,
            doctor_id: None,
            created_at: now,
            dispatched_at: None,
            doctor_acknowledged_at: None,
            converted_appointment_id: None,
            cancellation_reason: None,
        };

        self.store
            .insert(emergency.clone())
            .await
            .map_err(|e| DispatchError::CollaboratorUnavailable(e.to_string()))?;

        info!(
            "Emergency {} submitted for patient {} at priority {:?}",
            emergency.id, emergency.patient_id, emergency.priority
        );
        self.events
            .publish(emergency.id, emergency.status, emergency.priority, now);
        Ok(emergency)
    }

    /// Escalation hook for the external unattended-case timer.
    pub async fn escalate(&self, emergency_id: Uuid) -> Result<EmergencyRequest, DispatchError> {
        self.advance(emergency_id, EmergencyStatus::NeedsAttention, None)
            .await
    }

    /// Triage-ordered listing: escalated cases first, then newest.
    pub async fn list(
        &self,
        filter: EmergencyFilter,
    ) -> Result<Vec<EmergencyRequest>, DispatchError> {
        let mut emergencies = self
            .store
            .list(filter)
            .await
            .map_err(|e| DispatchError::CollaboratorUnavailable(e.to_string()))?;
        triage::sort_for_triage(&mut emergencies);
        Ok(emergencies)
    }

    pub async fn get(&self, emergency_id: Uuid) -> Result<EmergencyRequest, DispatchError> {
        self.store
            .fetch(emergency_id)
            .await
            .map_err(|e| DispatchError::CollaboratorUnavailable(e.to_string()))?
            .ok_or(DispatchError::NotFound)
    }

    /// Assign an ambulance (and optionally a doctor) to an emergency.
    /// The ambulance claim happens at assignment time against live fleet
    /// state; a candidate listing served earlier proves nothing.
    pub async fn assign(
        &self,
        emergency_id: Uuid,
        ambulance_id: Uuid,
        doctor_id: Option<Uuid>,
    ) -> Result<EmergencyRequest, DispatchError> {
        let _guard = self.emergency_locks.lock(&emergency_id).await;

        let mut emergency = self.get(emergency_id).await?;
        if !matches!(
            emergency.status,
            EmergencyStatus::Pending | EmergencyStatus::NeedsAttention
        ) {
            return Err(DispatchError::InvalidTransition {
                from: emergency.status,
                to: EmergencyStatus::Assigned,
            });
        }

        let reserved = self
            .fleet
            .try_reserve(ambulance_id)
            .await
            .map_err(|e| DispatchError::CollaboratorUnavailable(e.to_string()))?;
        if !reserved {
            debug!(
                "Ambulance {} lost to a concurrent dispatch for emergency {}",
                ambulance_id, emergency_id
            );
            return Err(DispatchError::AmbulanceUnavailable);
        }

        let now = self.clock.now();
        emergency.status = EmergencyStatus::Assigned;
        emergency.ambulance_id = Some(ambulance_id);
        emergency.doctor_id = doctor_id;
        emergency.dispatched_at = Some(now);

        if let Err(e) = self.store.update(emergency.clone()).await {
            warn!(
                "Assignment of emergency {} failed to persist; returning ambulance {}: {}",
                emergency_id, ambulance_id, e
            );
            if let Err(release_err) = self.fleet.release(ambulance_id).await {
                warn!("Ambulance {} release also failed: {}", ambulance_id, release_err);
            }
            return Err(DispatchError::CollaboratorUnavailable(e.to_string()));
        }

        info!(
            "Emergency {} assigned ambulance {} doctor {:?}",
            emergency_id, ambulance_id, doctor_id
        );
        self.events
            .publish(emergency.id, emergency.status, emergency.priority, now);
        Ok(emergency)
    }

    /// Record that the assigned doctor is aware of the dispatch. Does not
    /// change status: awareness and arrival are different facts.
    pub async fn doctor_confirm(
        &self,
        emergency_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<EmergencyRequest, DispatchError> {
        let _guard = self.emergency_locks.lock(&emergency_id).await;

        let mut emergency = self.get(emergency_id).await?;
        if !matches!(
            emergency.status,
            EmergencyStatus::Assigned | EmergencyStatus::EnRoute | EmergencyStatus::Arrived
        ) {
            return Err(DispatchError::ConfirmationUnavailable(emergency.status));
        }
        if let Some(assigned) = emergency.doctor_id {
            if assigned != doctor_id {
                return Err(DispatchError::PermissionDenied);
            }
        }

        emergency.doctor_acknowledged_at = Some(self.clock.now());
        self.store
            .update(emergency.clone())
            .await
            .map_err(|e| DispatchError::CollaboratorUnavailable(e.to_string()))?;

        debug!("Doctor {} acknowledged emergency {}", doctor_id, emergency_id);
        Ok(emergency)
    }

    /// Table-checked progress transition (EnRoute, Arrived, Completed,
    /// Cancelled). Terminal moves hand the ambulance back to the fleet
    /// before committing.
    pub async fn advance(
        &self,
        emergency_id: Uuid,
        target: EmergencyStatus,
        reason: Option<String>,
    ) -> Result<EmergencyRequest, DispatchError> {
        let _guard = self.emergency_locks.lock(&emergency_id).await;

        let mut emergency = self.get(emergency_id).await?;
        if !transition_allowed(emergency.status, target) {
            return Err(DispatchError::InvalidTransition {
                from: emergency.status,
                to: target,
            });
        }

        if target.is_terminal() {
            if let Some(ambulance_id) = emergency.ambulance_id {
                self.fleet
                    .release(ambulance_id)
                    .await
                    .map_err(|e| DispatchError::CollaboratorUnavailable(e.to_string()))?;
            }
        }

        let now = self.clock.now();
        let from = emergency.status;
        emergency.status = target;
        if target == EmergencyStatus::Cancelled {
            emergency.cancellation_reason = reason;
        }

        self.store
            .update(emergency.clone())
            .await
            .map_err(|e| DispatchError::CollaboratorUnavailable(e.to_string()))?;

        info!("Emergency {} moved {} -> {}", emergency_id, from, target);
        self.events
            .publish(emergency.id, emergency.status, emergency.priority, now);
        Ok(emergency)
    }

    /// Build the appointment seed for an emergency that has arrived or
    /// concluded. The emergency itself stays where it is.
    pub async fn appointment_seed(
        &self,
        emergency_id: Uuid,
        overrides: ConversionOverrides,
    ) -> Result<AppointmentSeed, DispatchError> {
        let emergency = self.get(emergency_id).await?;
        if !matches!(
            emergency.status,
            EmergencyStatus::Arrived | EmergencyStatus::Completed
        ) {
            return Err(DispatchError::ConversionUnavailable(emergency.status));
        }

        let start = overrides
            .appointment_time
            .unwrap_or_else(|| self.clock.now() + Duration::minutes(DEFAULT_CONVERSION_LEAD_MINUTES));
        let duration = Duration::minutes(
            overrides
                .duration_minutes
                .unwrap_or(DEFAULT_CONVERSION_DURATION_MINUTES),
        );
        let doctor_id = overrides.doctor_id.or(emergency.doctor_id);
        let doctor_preassigned =
            doctor_id.is_some() && doctor_id == emergency.doctor_id;

        // Clinic falls back to the responding ambulance's home clinic.
        let mut clinic_id = overrides.clinic_id.or(emergency.clinic_id);
        if clinic_id.is_none() {
            if let Some(ambulance_id) = emergency.ambulance_id {
                clinic_id = self
                    .fleet
                    .fetch(ambulance_id)
                    .await
                    .map_err(|e| DispatchError::CollaboratorUnavailable(e.to_string()))?
                    .map(|a| a.clinic_id);
            }
        }

        Ok(AppointmentSeed {
            emergency_id,
            patient_id: emergency.patient_id,
            doctor_id,
            clinic_id,
            scheduled_start: start,
            scheduled_end: start + duration,
            symptoms: overrides.symptoms,
            doctor_preassigned,
        })
    }

    /// Record the appointment created from this emergency. Lookup linkage
    /// only; the emergency's status is untouched.
    pub async fn mark_converted(
        &self,
        emergency_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<EmergencyRequest, DispatchError> {
        let _guard = self.emergency_locks.lock(&emergency_id).await;

        let mut emergency = self.get(emergency_id).await?;
        emergency.converted_appointment_id = Some(appointment_id);
        self.store
            .update(emergency.clone())
            .await
            .map_err(|e| DispatchError::CollaboratorUnavailable(e.to_string()))?;
        Ok(emergency)
    }
}
