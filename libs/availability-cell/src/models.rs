// libs/availability-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Minimum notice, in calendar days, a doctor must give before a leave
/// block takes effect. Protects patients who already hold bookings inside
/// the window.
pub const MIN_LEAVE_NOTICE_DAYS: i64 = 3;

// ==============================================================================
// BUSY INTERVALS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyKind {
    Appointment,
    Hold,
    Leave,
}

impl BusyKind {
    /// Fixed rendering priority: an appointment semantically dominates a
    /// hold, which dominates leave, at the same slot.
    pub fn render_rank(&self) -> u8 {
        match self {
            BusyKind::Appointment => 0,
            BusyKind::Hold => 1,
            BusyKind::Leave => 2,
        }
    }
}

impl fmt::Display for BusyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusyKind::Appointment => write!(f, "appointment"),
            BusyKind::Hold => write!(f, "hold"),
            BusyKind::Leave => write!(f, "leave"),
        }
    }
}

/// One occupied stretch of a doctor's calendar, half-open `[start, end)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusyInterval {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub kind: BusyKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub reason: Option<String>,
    /// Back-reference to the appointment or leave request that created the
    /// interval. Lookup only; the referenced record owns its own lifecycle.
    pub ref_id: Option<Uuid>,
}

impl BusyInterval {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// Result of promoting a HOLD: the interval now occupying the slot as an
/// APPOINTMENT, plus every other HOLD that overlapped it and was
/// invalidated. Their owners lost the race and must be told so by the
/// caller.
#[derive(Debug, Clone)]
pub struct PromotionOutcome {
    pub interval_id: Uuid,
    pub displaced: Vec<BusyInterval>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Interval conflicts with an existing appointment")]
    Conflict,

    #[error("Leave requires {MIN_LEAVE_NOTICE_DAYS} days notice; earliest valid start is {earliest_start}")]
    LeadTime { earliest_start: DateTime<Utc> },

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),
}
