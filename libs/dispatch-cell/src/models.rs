// libs/dispatch-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// EMERGENCY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyStatus {
    Pending,
    NeedsAttention,
    Assigned,
    EnRoute,
    Arrived,
    Completed,
    Cancelled,
}

impl EmergencyStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EmergencyStatus::Completed | EmergencyStatus::Cancelled)
    }
}

impl fmt::Display for EmergencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmergencyStatus::Pending => write!(f, "pending"),
            EmergencyStatus::NeedsAttention => write!(f, "needs_attention"),
            EmergencyStatus::Assigned => write!(f, "assigned"),
            EmergencyStatus::EnRoute => write!(f, "en_route"),
            EmergencyStatus::Arrived => write!(f, "arrived"),
            EmergencyStatus::Completed => write!(f, "completed"),
            EmergencyStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The closed set of legal emergency moves. Cancellation is reachable from
/// every non-terminal state; everything else advances one step.
pub fn transition_allowed(from: EmergencyStatus, to: EmergencyStatus) -> bool {
    use EmergencyStatus::*;
    matches!(
        (from, to),
        (Pending, NeedsAttention)
            | (Pending, Assigned)
            | (NeedsAttention, Assigned)
            | (Assigned, EnRoute)
            | (EnRoute, Arrived)
            | (Arrived, Completed)
    ) || (to == Cancelled && !from.is_terminal())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyRequest {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub location: GeoLocation,
    pub priority: EmergencyPriority,
    pub status: EmergencyStatus,
    pub clinic_id: Option<Uuid>,
    pub ambulance_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    /// When the assigned doctor acknowledged the dispatch. Awareness only;
    /// arrival is a separate signal.
    pub doctor_acknowledged_at: Option<DateTime<Utc>>,
    /// Appointment created from this emergency, if any. Lookup only; the
    /// appointment runs its own lifecycle.
    pub converted_appointment_id: Option<Uuid>,
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ambulance {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub status: AmbulanceStatus,
    pub license_plate: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbulanceStatus {
    Available,
    EnRoute,
    Busy,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitEmergencyRequest {
    pub patient_id: Uuid,
    pub location: GeoLocation,
    pub priority: EmergencyPriority,
    pub clinic_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmergencyFilter {
    pub status: Option<EmergencyStatus>,
    pub clinic_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Caller-supplied overrides for the appointment created from an
/// emergency. Anything absent is seeded from the emergency itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionOverrides {
    pub appointment_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub doctor_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub symptoms: Option<String>,
}

/// Everything the appointment side needs to create the follow-on booking.
/// Producing a seed does not advance or close the emergency.
#[derive(Debug, Clone)]
pub struct AppointmentSeed {
    pub emergency_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub symptoms: Option<String>,
    /// True when the seed's doctor is the one already assigned to the
    /// emergency; the caller's confirmation policy keys off this.
    pub doctor_preassigned: bool,
}

/// Change feed entry published on every emergency lifecycle move.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchEvent {
    pub emergency_id: Uuid,
    pub status: EmergencyStatus,
    pub priority: EmergencyPriority,
    pub at: DateTime<Utc>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum DispatchError {
    #[error("Emergency not found")]
    NotFound,

    #[error("Transition from {from} to {to} is not allowed")]
    InvalidTransition {
        from: EmergencyStatus,
        to: EmergencyStatus,
    },

    #[error("Ambulance is no longer available")]
    AmbulanceUnavailable,

    #[error("Doctor confirmation is not open while the emergency is {0}")]
    ConfirmationUnavailable(EmergencyStatus),

    #[error("An appointment can only be created once the response has arrived; emergency is {0}")]
    ConversionUnavailable(EmergencyStatus),

    #[error("Actor is not entitled to this operation")]
    PermissionDenied,

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),
}
