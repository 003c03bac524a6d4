// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use appointment_cell::{AppointmentError, AppointmentStatus};
use availability_cell::BusyInterval;
use dispatch_cell::{Ambulance, DispatchError, EmergencyStatus};
use shared_gateways::StaffMember;
use shared_models::actor::Actor;

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionAppointmentRequest {
    pub actor: Actor,
    pub target: AppointmentStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDoctorTimeRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignEmergencyRequest {
    pub ambulance_id: Uuid,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmEmergencyRequest {
    pub doctor_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyProgressRequest {
    pub target: EmergencyStatus,
    pub reason: Option<String>,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

/// Result of filing a leave block. `coexisting_appointments` are bookings
/// already confirmed inside the leave window; the leave does not cancel
/// them, and the caller is expected to surface the overlap.
#[derive(Debug, Clone, Serialize)]
pub struct LeaveBlocked {
    pub leave_id: Uuid,
    pub coexisting_appointments: Vec<BusyInterval>,
}

/// Candidate resources for one emergency: live-available ambulances scoped
/// to the emergency's clinic when known, and the accumulated doctor feed.
/// Advisory only; assignment re-checks everything against live state.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchCandidates {
    pub ambulances: Vec<Ambulance>,
    pub doctors: Vec<StaffMember>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

/// Emergency-to-appointment conversion crosses two state machines; either
/// side's refusal surfaces unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Appointment(#[from] AppointmentError),

    #[error("Converted appointment needs a doctor; none was assigned or provided")]
    NoDoctor,

    #[error("Converted appointment needs a clinic; none could be resolved")]
    ClinicUnresolved,
}
