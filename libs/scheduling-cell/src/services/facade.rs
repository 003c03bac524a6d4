// libs/scheduling-cell/src/services/facade.rs
//
// The orchestration façade: the one component external callers reach.
// Sequences the availability ledger, the appointment state machine and
// the dispatch engine, and enforces the invariants that cross them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use appointment_cell::{
    lifecycle, Appointment, AppointmentError, AppointmentFilter, AppointmentService,
    AppointmentStatus, InMemoryAppointmentStore, NewAppointment,
};
use availability_cell::{AvailabilityError, AvailabilityLedger, BusyInterval, BusyKind};
use dispatch_cell::{
    ConversionOverrides, DispatchEngine, DispatchError, DispatchEvent, EmergencyFilter,
    EmergencyRequest, EmergencyStatus, InMemoryAmbulanceFleet, InMemoryEmergencyStore,
    SubmitEmergencyRequest,
};
use shared_config::AppConfig;
use shared_gateways::{
    HttpStaffDirectory, InMemoryStaffDirectory, NotificationEvent, NotificationSink,
    StaffDirectory, StaffType, TracingNotifier,
};
use shared_models::actor::Actor;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{
    BlockDoctorTimeRequest, BookAppointmentRequest, ConversionError, DispatchCandidates,
    LeaveBlocked,
};

pub struct SchedulingFacade {
    config: Arc<AppConfig>,
    ledger: Arc<AvailabilityLedger>,
    appointments: AppointmentService,
    dispatch: DispatchEngine,
    directory: Arc<dyn StaffDirectory>,
    notifier: Arc<dyn NotificationSink>,
}

impl SchedulingFacade {
    pub fn new(
        config: Arc<AppConfig>,
        ledger: Arc<AvailabilityLedger>,
        appointments: AppointmentService,
        dispatch: DispatchEngine,
        directory: Arc<dyn StaffDirectory>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            ledger,
            appointments,
            dispatch,
            directory,
            notifier,
        }
    }

    /// Assemble a façade over the in-process reference collaborators. The
    /// staff directory goes over HTTP when configured.
    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ledger = Arc::new(AvailabilityLedger::new(clock.clone()));
        let appointments = AppointmentService::new(
            Arc::new(InMemoryAppointmentStore::new()),
            ledger.clone(),
            clock.clone(),
        );
        let dispatch = DispatchEngine::new(
            Arc::new(InMemoryEmergencyStore::new()),
            Arc::new(InMemoryAmbulanceFleet::new()),
            clock,
        );
        let directory: Arc<dyn StaffDirectory> = if config.is_staff_directory_configured() {
            Arc::new(HttpStaffDirectory::new(&config))
        } else {
            Arc::new(InMemoryStaffDirectory::new())
        };

        Self::new(
            config,
            ledger,
            appointments,
            dispatch,
            directory,
            Arc::new(TracingNotifier),
        )
    }

    pub fn dispatch(&self) -> &DispatchEngine {
        &self.dispatch
    }

    // ==========================================================================
    // APPOINTMENTS
    // ==========================================================================

    /// Book a slot: free-slot check, HOLD, Pending appointment. A slot is
    /// bookable only when no appointment, no leave and no other patient's
    /// hold overlaps it.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        self.ensure_bookable(
            request.doctor_id,
            request.patient_id,
            request.scheduled_start,
            request.scheduled_end,
        )
        .await?;

        self.appointments
            .create(NewAppointment {
                patient_id: request.patient_id,
                doctor_id: request.doctor_id,
                clinic_id: request.clinic_id,
                scheduled_start: request.scheduled_start,
                scheduled_end: request.scheduled_end,
                symptoms: request.symptoms,
                notes: request.notes,
                source_emergency_id: None,
            })
            .await
    }

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .store()
            .fetch(id)
            .await
            .map_err(|e| AppointmentError::CollaboratorUnavailable(e.to_string()))?
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn search_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.appointments
            .store()
            .list(filter)
            .await
            .map_err(|e| AppointmentError::CollaboratorUnavailable(e.to_string()))
    }

    /// Run one lifecycle transition and its follow-on signals: a
    /// confirmation notifies the patient and tells every displaced hold's
    /// owner that their slot is gone.
    pub async fn transition_appointment(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        target: AppointmentStatus,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let outcome = self
            .appointments
            .transition(appointment_id, actor, target, reason)
            .await?;

        if target == AppointmentStatus::Confirmed {
            self.notify(NotificationEvent::AppointmentConfirmed {
                appointment_id: outcome.appointment.id,
                patient_id: outcome.appointment.patient_id,
                doctor_id: outcome.appointment.doctor_id,
                scheduled_start: outcome.appointment.scheduled_start,
            });
        }

        for lost in &outcome.displaced {
            self.notify_slot_lost(lost).await;
        }

        Ok(outcome.appointment)
    }

    /// Expiry sweep for the external timer: every Pending booking past its
    /// TTL is moved to Expired. Returns the ids that expired.
    pub async fn expire_stale_bookings(&self) -> Result<Vec<Uuid>, AppointmentError> {
        let now = self.appointments.clock_now();
        let pending = self
            .appointments
            .store()
            .list(AppointmentFilter {
                status: Some(AppointmentStatus::Pending),
                ..AppointmentFilter::default()
            })
            .await
            .map_err(|e| AppointmentError::CollaboratorUnavailable(e.to_string()))?;

        let mut expired = Vec::new();
        for appointment in pending {
            if !lifecycle::should_expire(&appointment, now) {
                continue;
            }
            match self
                .appointments
                .transition(appointment.id, Actor::System, AppointmentStatus::Expired, None)
                .await
            {
                Ok(_) => expired.push(appointment.id),
                // Raced with a concurrent confirm or cancel; nothing to do.
                Err(AppointmentError::InvalidTransition { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        if !expired.is_empty() {
            info!("Expired {} stale pending booking(s)", expired.len());
        }
        Ok(expired)
    }

    // ==========================================================================
    // DOCTOR CALENDAR
    // ==========================================================================

    /// File a leave block and report the confirmed appointments it will
    /// coexist with. The leave cancels nothing; surfacing the overlap is
    /// the caller's job.
    pub async fn block_doctor_time(
        &self,
        doctor_id: Uuid,
        request: BlockDoctorTimeRequest,
    ) -> Result<LeaveBlocked, AvailabilityError> {
        let leave_id = self
            .ledger
            .block_leave(doctor_id, request.start, request.end, request.reason)
            .await?;

        let coexisting_appointments: Vec<BusyInterval> = self
            .ledger
            .overlapping(doctor_id, request.start, request.end)
            .await
            .into_iter()
            .filter(|i| i.kind == BusyKind::Appointment)
            .collect();

        if !coexisting_appointments.is_empty() {
            info!(
                "Leave {} for doctor {} overlaps {} confirmed appointment(s)",
                leave_id,
                doctor_id,
                coexisting_appointments.len()
            );
        }

        Ok(LeaveBlocked {
            leave_id,
            coexisting_appointments,
        })
    }

    pub async fn doctor_schedule(
        &self,
        doctor_id: Uuid,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Vec<BusyInterval> {
        self.ledger.query(doctor_id, range_start, range_end).await
    }

    // ==========================================================================
    // EMERGENCIES
    // ==========================================================================

    pub async fn submit_emergency(
        &self,
        request: SubmitEmergencyRequest,
    ) -> Result<EmergencyRequest, DispatchError> {
        self.dispatch.submit(request).await
    }

    pub async fn escalate_emergency(
        &self,
        emergency_id: Uuid,
    ) -> Result<EmergencyRequest, DispatchError> {
        self.dispatch.escalate(emergency_id).await
    }

    pub async fn list_emergencies(
        &self,
        filter: EmergencyFilter,
    ) -> Result<Vec<EmergencyRequest>, DispatchError> {
        self.dispatch.list(filter).await
    }

    /// Candidate resources for an emergency: live-available ambulances
    /// (clinic-scoped when the emergency has one) and the doctor feed,
    /// accumulated page by page up to the configured bound.
    pub async fn dispatch_candidates(
        &self,
        emergency_id: Uuid,
    ) -> Result<DispatchCandidates, DispatchError> {
        let emergency = self.dispatch.get(emergency_id).await?;

        let ambulances = self
            .dispatch
            .fleet()
            .list_available(emergency.clinic_id)
            .await
            .map_err(|e| DispatchError::CollaboratorUnavailable(e.to_string()))?;

        let mut doctors = Vec::new();
        for page in 0..self.config.max_staff_pages {
            let staff_page = self
                .directory
                .available_staff(StaffType::Doctor, page, self.config.staff_page_size)
                .await
                .map_err(|e| DispatchError::CollaboratorUnavailable(e.to_string()))?;
            doctors.extend(staff_page.members);
            if !staff_page.has_more {
                break;
            }
        }

        Ok(DispatchCandidates {
            ambulances,
            doctors,
        })
    }

    pub async fn assign_emergency(
        &self,
        emergency_id: Uuid,
        ambulance_id: Uuid,
        doctor_id: Option<Uuid>,
    ) -> Result<EmergencyRequest, DispatchError> {
        let emergency = self
            .dispatch
            .assign(emergency_id, ambulance_id, doctor_id)
            .await?;

        self.notify(NotificationEvent::EmergencyAssigned {
            emergency_id: emergency.id,
            patient_id: emergency.patient_id,
            ambulance_id,
            doctor_id,
        });
        Ok(emergency)
    }

    pub async fn confirm_emergency_doctor(
        &self,
        emergency_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<EmergencyRequest, DispatchError> {
        self.dispatch.doctor_confirm(emergency_id, doctor_id).await
    }

    pub async fn update_emergency_progress(
        &self,
        emergency_id: Uuid,
        target: EmergencyStatus,
        reason: Option<String>,
    ) -> Result<EmergencyRequest, DispatchError> {
        self.dispatch.advance(emergency_id, target, reason).await
    }

    /// Create the follow-on appointment for an arrived or concluded
    /// emergency. Policy: when the appointment goes to the doctor already
    /// assigned to the response, it is confirmed on the spot; any other
    /// doctor gets it as a Pending request to confirm themselves. The
    /// emergency itself is linked but never advanced here.
    pub async fn convert_emergency_to_appointment(
        &self,
        emergency_id: Uuid,
        overrides: ConversionOverrides,
    ) -> Result<Appointment, ConversionError> {
        let seed = self.dispatch.appointment_seed(emergency_id, overrides).await?;
        let doctor_id = seed.doctor_id.ok_or(ConversionError::NoDoctor)?;
        let clinic_id = seed.clinic_id.ok_or(ConversionError::ClinicUnresolved)?;

        let mut appointment = self
            .appointments
            .create(NewAppointment {
                patient_id: seed.patient_id,
                doctor_id,
                clinic_id,
                scheduled_start: seed.scheduled_start,
                scheduled_end: seed.scheduled_end,
                symptoms: seed.symptoms,
                notes: None,
                source_emergency_id: Some(emergency_id),
            })
            .await?;

        if seed.doctor_preassigned {
            match self
                .appointments
                .transition(
                    appointment.id,
                    Actor::Doctor(doctor_id),
                    AppointmentStatus::Confirmed,
                    None,
                )
                .await
            {
                Ok(outcome) => {
                    appointment = outcome.appointment;
                    for lost in &outcome.displaced {
                        self.notify_slot_lost(lost).await;
                    }
                }
                // Someone else took the slot between hold and confirm; the
                // appointment stays pending for rescheduling.
                Err(AppointmentError::Conflict) => {
                    warn!(
                        "Converted appointment {} could not be auto-confirmed; slot contended",
                        appointment.id
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.dispatch.mark_converted(emergency_id, appointment.id).await?;
        info!(
            "Emergency {} converted to appointment {} ({})",
            emergency_id, appointment.id, appointment.status
        );
        Ok(appointment)
    }

    pub fn subscribe_dispatch_events(&self) -> broadcast::Receiver<DispatchEvent> {
        self.dispatch.events().subscribe()
    }

    // ==========================================================================
    // PRIVATE HELPERS
    // ==========================================================================

    /// Cross-entity free-slot rule. The ledger only knows intervals; holds
    /// are resolved to their appointments to tell a rival's hold from the
    /// requesting patient's own.
    async fn ensure_bookable(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        for interval in self.ledger.overlapping(doctor_id, start, end).await {
            match interval.kind {
                BusyKind::Appointment | BusyKind::Leave => {
                    return Err(AppointmentError::Conflict);
                }
                BusyKind::Hold => {
                    let Some(ref_id) = interval.ref_id else {
                        return Err(AppointmentError::Conflict);
                    };
                    let holder = self
                        .appointments
                        .store()
                        .fetch(ref_id)
                        .await
                        .map_err(|e| AppointmentError::CollaboratorUnavailable(e.to_string()))?;
                    match holder {
                        Some(appointment) if appointment.patient_id == patient_id => {}
                        Some(_) => return Err(AppointmentError::Conflict),
                        None => {
                            // An interval with no backing appointment is an
                            // invariant breach, not a guessable state.
                            tracing::error!(
                                "Hold {} references missing appointment {}",
                                interval.id,
                                ref_id
                            );
                            return Err(AppointmentError::CollaboratorUnavailable(
                                "schedule state inconsistent".to_string(),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn notify_slot_lost(&self, lost: &BusyInterval) {
        let Some(ref_id) = lost.ref_id else {
            return;
        };
        match self.appointments.store().fetch(ref_id).await {
            Ok(Some(appointment)) => {
                self.notify(NotificationEvent::SlotLost {
                    appointment_id: appointment.id,
                    patient_id: appointment.patient_id,
                    doctor_id: appointment.doctor_id,
                    scheduled_start: appointment.scheduled_start,
                });
            }
            Ok(None) => warn!("Displaced hold {} references missing appointment {}", lost.id, ref_id),
            Err(e) => warn!("Could not resolve displaced hold {}: {}", lost.id, e),
        }
    }

    /// Fire-and-forget delivery; a failure is logged and never blocks the
    /// transition that produced the event.
    fn notify(&self, event: NotificationEvent) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(event).await {
                warn!("Notification delivery failed: {}", e);
            }
        });
    }
}
