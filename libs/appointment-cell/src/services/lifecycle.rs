// libs/appointment-cell/src/services/lifecycle.rs
//
// The appointment lifecycle as one closed, table-driven function. Every
// legal move is a match arm carrying its ledger effect; anything else is
// rejected before any state is touched.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, ALL_STATUSES};
use shared_models::actor::ActorRole;

/// How long an unconfirmed booking may sit in `Pending` before the
/// external timer is expected to expire it.
pub const PENDING_TTL_HOURS: i64 = 24;

/// What a transition does to the availability ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    /// The HOLD placed at booking time becomes the APPOINTMENT interval.
    PromoteHold,
    /// The occupying interval is removed and the slot freed.
    ReleaseInterval,
    /// The interval stays as it is.
    NoChange,
}

/// The transition table. `None` means the move is not in the table for
/// this actor role; use [`reachable`] to distinguish a forbidden actor
/// from an unreachable target.
pub fn transition_rule(
    from: AppointmentStatus,
    role: ActorRole,
    to: AppointmentStatus,
) -> Option<LedgerEffect> {
    use AppointmentStatus::*;
    use LedgerEffect::*;

    match (from, role, to) {
        (Pending, ActorRole::Doctor, Confirmed) => Some(PromoteHold),
        (Pending, ActorRole::Doctor, Rejected) => Some(ReleaseInterval),
        (Pending, ActorRole::Patient, CancelledByPatient) => Some(ReleaseInterval),
        (Pending, ActorRole::System, Expired) => Some(ReleaseInterval),
        (Pending, ActorRole::Doctor, NoShow) => Some(ReleaseInterval),

        (Confirmed, ActorRole::Doctor, CheckedIn) => Some(NoChange),
        (Confirmed, ActorRole::Doctor, CancelledByDoctor) => Some(ReleaseInterval),
        (Confirmed, ActorRole::Patient, CancelledByPatient) => Some(ReleaseInterval),
        (Confirmed, ActorRole::Doctor, NoShow) => Some(ReleaseInterval),

        (CheckedIn, ActorRole::Doctor, InProgress) => Some(NoChange),
        (CheckedIn, ActorRole::Doctor, NoShow) => Some(ReleaseInterval),

        // Consultation time has been consumed; the slot no longer blocks
        // the calendar.
        (InProgress, ActorRole::Doctor, Review) => Some(ReleaseInterval),

        (Review, ActorRole::Doctor, Completed) => Some(NoChange),

        _ => None,
    }
}

/// Whether any actor may move `from` to `to`.
pub fn reachable(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    [ActorRole::Patient, ActorRole::Doctor, ActorRole::System]
        .into_iter()
        .any(|role| transition_rule(from, role, to).is_some())
}

/// Targets currently legal for this actor role. Drives UI affordances.
pub fn valid_targets(from: AppointmentStatus, role: ActorRole) -> Vec<AppointmentStatus> {
    ALL_STATUSES
        .into_iter()
        .filter(|to| transition_rule(from, role, *to).is_some())
        .collect()
}

/// Validate a requested transition and return its ledger effect.
pub fn validate(
    from: AppointmentStatus,
    role: ActorRole,
    to: AppointmentStatus,
) -> Result<LedgerEffect, AppointmentError> {
    debug!("Validating transition {} -> {} as {}", from, to, role);

    if let Some(effect) = transition_rule(from, role, to) {
        return Ok(effect);
    }

    if reachable(from, to) {
        warn!("Transition {} -> {} refused for role {}", from, to, role);
        return Err(AppointmentError::PermissionDenied);
    }

    warn!("Invalid transition attempted: {} -> {}", from, to);
    Err(AppointmentError::InvalidTransition { from, to })
}

/// Predicate for the external expiry timer: an unconfirmed booking past
/// its TTL should be moved to `Expired` via a System transition.
pub fn should_expire(appointment: &Appointment, now: DateTime<Utc>) -> bool {
    appointment.status == AppointmentStatus::Pending
        && now > appointment.created_at + Duration::hours(PENDING_TTL_HOURS)
}
