// libs/availability-cell/src/services/ledger.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    AvailabilityError, BusyInterval, BusyKind, PromotionOutcome, MIN_LEAVE_NOTICE_DAYS,
};
use shared_utils::clock::Clock;
use shared_utils::locks::KeyedMutex;

/// Per-doctor calendar of busy intervals. All mutations serialize on the
/// doctor's key; independent doctors never contend. Reads take a snapshot.
pub struct AvailabilityLedger {
    clock: Arc<dyn Clock>,
    doctor_locks: KeyedMutex<Uuid>,
    calendars: RwLock<HashMap<Uuid, Vec<BusyInterval>>>,
    /// interval id -> doctor id, so interval-addressed operations can find
    /// the right calendar without scanning.
    owners: RwLock<HashMap<Uuid, Uuid>>,
}

impl AvailabilityLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            doctor_locks: KeyedMutex::new(),
            calendars: RwLock::new(HashMap::new()),
            owners: RwLock::new(HashMap::new()),
        }
    }

    /// Tentatively reserve `[start, end)` for a booking in flight. Rejected
    /// only when a confirmed APPOINTMENT already occupies the slot;
    /// overlapping holds are legal and race to promotion.
    pub async fn place_hold(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        ref_id: Option<Uuid>,
    ) -> Result<Uuid, AvailabilityError> {
        validate_range(start, end)?;
        let _guard = self.doctor_locks.lock(&doctor_id).await;

        {
            let calendars = self.calendars.read().await;
            if let Some(intervals) = calendars.get(&doctor_id) {
                if has_appointment_overlap(intervals, start, end, None) {
                    debug!("Hold rejected for doctor {}: appointment overlap", doctor_id);
                    return Err(AvailabilityError::Conflict);
                }
            }
        }

        let interval = BusyInterval {
            id: Uuid::new_v4(),
            doctor_id,
            kind: BusyKind::Hold,
            start,
            end,
            reason: None,
            ref_id,
        };
        let hold_id = interval.id;

        self.insert(interval).await;
        debug!("Hold {} placed for doctor {} [{} - {})", hold_id, doctor_id, start, end);
        Ok(hold_id)
    }

    /// Convert a HOLD into the confirmed APPOINTMENT interval. The overlap
    /// check runs again under the doctor's lock: of several holds racing
    /// for one slot, the first promotion wins and every other overlapping
    /// hold is invalidated and returned for the caller to signal.
    ///
    /// A hold that no longer exists lost an earlier race; promoting it is a
    /// conflict, not a missing resource.
    pub async fn promote(&self, hold_id: Uuid) -> Result<PromotionOutcome, AvailabilityError> {
        let doctor_id = match self.owners.read().await.get(&hold_id).copied() {
            Some(doctor_id) => doctor_id,
            None => return Err(AvailabilityError::Conflict),
        };

        let _guard = self.doctor_locks.lock(&doctor_id).await;
        let mut calendars = self.calendars.write().await;
        let intervals = calendars.entry(doctor_id).or_default();

        let (start, end) = match intervals.iter().find(|i| i.id == hold_id) {
            Some(hold) if hold.kind == BusyKind::Hold => (hold.start, hold.end),
            _ => return Err(AvailabilityError::Conflict),
        };

        if has_appointment_overlap(intervals, start, end, Some(hold_id)) {
            warn!("Promotion of hold {} lost to a confirmed appointment", hold_id);
            return Err(AvailabilityError::Conflict);
        }

        let mut displaced = Vec::new();
        intervals.retain(|i| {
            let losing_hold = i.kind == BusyKind::Hold && i.id != hold_id && i.overlaps(start, end);
            if losing_hold {
                displaced.push(i.clone());
            }
            !losing_hold
        });

        if let Some(hold) = intervals.iter_mut().find(|i| i.id == hold_id) {
            hold.kind = BusyKind::Appointment;
        }

        drop(calendars);

        let mut owners = self.owners.write().await;
        for loser in &displaced {
            owners.remove(&loser.id);
        }
        drop(owners);

        debug!(
            "Hold {} promoted for doctor {}; {} competing hold(s) displaced",
            hold_id,
            doctor_id,
            displaced.len()
        );
        Ok(PromotionOutcome {
            interval_id: hold_id,
            displaced,
        })
    }

    /// Remove an interval. Idempotent: releasing an unknown or
    /// already-released id is a no-op.
    pub async fn release(&self, interval_id: Uuid) {
        let doctor_id = match self.owners.read().await.get(&interval_id).copied() {
            Some(doctor_id) => doctor_id,
            None => return,
        };

        let _guard = self.doctor_locks.lock(&doctor_id).await;
        let mut calendars = self.calendars.write().await;
        if let Some(intervals) = calendars.get_mut(&doctor_id) {
            intervals.retain(|i| i.id != interval_id);
        }
        drop(calendars);
        self.owners.write().await.remove(&interval_id);
        debug!("Interval {} released for doctor {}", interval_id, doctor_id);
    }

    /// Remove whatever interval was created for `ref_id`. Idempotent.
    pub async fn release_by_ref(&self, ref_id: Uuid) {
        let interval_id = {
            let calendars = self.calendars.read().await;
            calendars
                .values()
                .flatten()
                .find(|i| i.ref_id == Some(ref_id))
                .map(|i| i.id)
        };
        if let Some(interval_id) = interval_id {
            self.release(interval_id).await;
        }
    }

    /// File a leave block. Leave must start at least
    /// `MIN_LEAVE_NOTICE_DAYS` calendar days from now; it may coexist with
    /// appointments already booked inside the window (the caller is
    /// responsible for surfacing that coexistence).
    pub async fn block_leave(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<Uuid, AvailabilityError> {
        validate_range(start, end)?;

        let earliest_start = self.clock.now() + Duration::days(MIN_LEAVE_NOTICE_DAYS);
        if start < earliest_start {
            debug!(
                "Leave rejected for doctor {}: starts {} before earliest {}",
                doctor_id, start, earliest_start
            );
            return Err(AvailabilityError::LeadTime { earliest_start });
        }

        let _guard = self.doctor_locks.lock(&doctor_id).await;
        let interval = BusyInterval {
            id: Uuid::new_v4(),
            doctor_id,
            kind: BusyKind::Leave,
            start,
            end,
            reason,
            ref_id: None,
        };
        let leave_id = interval.id;
        self.insert(interval).await;
        debug!("Leave {} filed for doctor {} [{} - {})", leave_id, doctor_id, start, end);
        Ok(leave_id)
    }

    /// Every interval touching `[range_start, range_end)`, sorted by start
    /// with ties broken appointment < hold < leave.
    pub async fn query(
        &self,
        doctor_id: Uuid,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Vec<BusyInterval> {
        let calendars = self.calendars.read().await;
        let mut result: Vec<BusyInterval> = calendars
            .get(&doctor_id)
            .map(|intervals| {
                intervals
                    .iter()
                    .filter(|i| i.overlaps(range_start, range_end))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        result.sort_by_key(|i| (i.start, i.kind.render_rank()));
        result
    }

    /// Intervals overlapping `[start, end)`, unordered. Building block for
    /// the façade's bookability decision.
    pub async fn overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<BusyInterval> {
        let calendars = self.calendars.read().await;
        calendars
            .get(&doctor_id)
            .map(|intervals| {
                intervals
                    .iter()
                    .filter(|i| i.overlaps(start, end))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn insert(&self, interval: BusyInterval) {
        self.owners
            .write()
            .await
            .insert(interval.id, interval.doctor_id);
        self.calendars
            .write()
            .await
            .entry(interval.doctor_id)
            .or_default()
            .push(interval);
    }
}

fn validate_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AvailabilityError> {
    if end <= start {
        return Err(AvailabilityError::InvalidInterval(
            "end must be after start".to_string(),
        ));
    }
    Ok(())
}

fn has_appointment_overlap(
    intervals: &[BusyInterval],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> bool {
    intervals
        .iter()
        .any(|i| i.kind == BusyKind::Appointment && Some(i.id) != exclude && i.overlaps(start, end))
}
