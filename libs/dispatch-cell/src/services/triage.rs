// libs/dispatch-cell/src/services/triage.rs
use std::cmp::Ordering;

use crate::models::{EmergencyRequest, EmergencyStatus};

/// The triage ordering contract: escalated cases surface before everything
/// else no matter how old they are; within a tier the newest submission
/// comes first. Safety-critical display contract, reproduce exactly.
pub fn triage_order(a: &EmergencyRequest, b: &EmergencyRequest) -> Ordering {
    let a_escalated = a.status == EmergencyStatus::NeedsAttention;
    let b_escalated = b.status == EmergencyStatus::NeedsAttention;

    b_escalated
        .cmp(&a_escalated)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

pub fn sort_for_triage(emergencies: &mut [EmergencyRequest]) {
    emergencies.sort_by(triage_order);
}
