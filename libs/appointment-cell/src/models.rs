// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
    /// Stored for the doctor/admin surface only; patients receive a generic
    /// notice instead of this text.
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    /// Ledger interval currently occupying the slot: a HOLD before
    /// confirmation, the APPOINTMENT interval after, nothing once the slot
    /// has been consumed or released.
    pub busy_ref: Option<Uuid>,
    /// Set when this appointment was created from an emergency.
    pub source_emergency_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    CheckedIn,
    InProgress,
    Review,
    Completed,
    Rejected,
    CancelledByDoctor,
    CancelledByPatient,
    NoShow,
    Expired,
}

/// Every status, in declaration order. Drives exhaustive transition checks.
pub const ALL_STATUSES: [AppointmentStatus; 11] = [
    AppointmentStatus::Pending,
    AppointmentStatus::Confirmed,
    AppointmentStatus::CheckedIn,
    AppointmentStatus::InProgress,
    AppointmentStatus::Review,
    AppointmentStatus::Completed,
    AppointmentStatus::Rejected,
    AppointmentStatus::CancelledByDoctor,
    AppointmentStatus::CancelledByPatient,
    AppointmentStatus::NoShow,
    AppointmentStatus::Expired,
];

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed
                | AppointmentStatus::Rejected
                | AppointmentStatus::CancelledByDoctor
                | AppointmentStatus::CancelledByPatient
                | AppointmentStatus::NoShow
                | AppointmentStatus::Expired
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::CheckedIn => write!(f, "checked_in"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Review => write!(f, "review"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
            AppointmentStatus::CancelledByDoctor => write!(f, "cancelled_by_doctor"),
            AppointmentStatus::CancelledByPatient => write!(f, "cancelled_by_patient"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
            AppointmentStatus::Expired => write!(f, "expired"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
    pub source_emergency_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Transition from {from} to {to} is not allowed")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Actor is not entitled to this transition")]
    PermissionDenied,

    #[error("Appointment slot is no longer available")]
    Conflict,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),
}
