// libs/scheduling-cell/src/handlers.rs
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use appointment_cell::{AppointmentError, AppointmentFilter};
use availability_cell::AvailabilityError;
use chrono::{DateTime, Utc};
use dispatch_cell::{
    ConversionOverrides, DispatchError, EmergencyFilter, SubmitEmergencyRequest,
};
use shared_models::error::AppError;

use crate::models::{
    AssignEmergencyRequest, BlockDoctorTimeRequest, BookAppointmentRequest,
    ConfirmEmergencyRequest, ConversionError, EmergencyProgressRequest,
    TransitionAppointmentRequest,
};
use crate::services::facade::SchedulingFacade;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct ScheduleRangeQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(facade): State<Arc<SchedulingFacade>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = facade
        .book_appointment(request)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Booking requested; awaiting doctor confirmation"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(facade): State<Arc<SchedulingFacade>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = facade
        .get_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(facade): State<Arc<SchedulingFacade>>,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<Value>, AppError> {
    let appointments = facade
        .search_appointments(filter)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn transition_appointment(
    State(facade): State<Arc<SchedulingFacade>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<TransitionAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = facade
        .transition_appointment(appointment_id, request.actor, request.target, request.reason)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// Hook for the external expiry timer.
#[axum::debug_handler]
pub async fn expire_stale_bookings(
    State(facade): State<Arc<SchedulingFacade>>,
) -> Result<Json<Value>, AppError> {
    let expired = facade
        .expire_stale_bookings()
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "expired": expired
    })))
}

// ==============================================================================
// DOCTOR CALENDAR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn block_doctor_time(
    State(facade): State<Arc<SchedulingFacade>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<BlockDoctorTimeRequest>,
) -> Result<Json<Value>, AppError> {
    let blocked = facade
        .block_doctor_time(doctor_id, request)
        .await
        .map_err(map_availability_error)?;

    let message = if blocked.coexisting_appointments.is_empty() {
        "Leave recorded"
    } else {
        "Leave recorded; existing bookings in this window remain and need attention"
    };

    Ok(Json(json!({
        "success": true,
        "leave_id": blocked.leave_id,
        "coexisting_appointments": blocked.coexisting_appointments,
        "message": message
    })))
}

#[axum::debug_handler]
pub async fn doctor_schedule(
    State(facade): State<Arc<SchedulingFacade>>,
    Path(doctor_id): Path<Uuid>,
    Query(range): Query<ScheduleRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let intervals = facade.doctor_schedule(doctor_id, range.from, range.to).await;

    Ok(Json(json!({
        "success": true,
        "doctor_id": doctor_id,
        "intervals": intervals
    })))
}

// ==============================================================================
// EMERGENCY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn submit_emergency(
    State(facade): State<Arc<SchedulingFacade>>,
    Json(request): Json<SubmitEmergencyRequest>,
) -> Result<Json<Value>, AppError> {
    let emergency = facade
        .submit_emergency(request)
        .await
        .map_err(map_dispatch_error)?;

    Ok(Json(json!({
        "success": true,
        "emergency": emergency
    })))
}

#[axum::debug_handler]
pub async fn list_emergencies(
    State(facade): State<Arc<SchedulingFacade>>,
    Query(filter): Query<EmergencyFilter>,
) -> Result<Json<Value>, AppError> {
    let emergencies = facade
        .list_emergencies(filter)
        .await
        .map_err(map_dispatch_error)?;

    Ok(Json(json!({
        "success": true,
        "count": emergencies.len(),
        "emergencies": emergencies
    })))
}

/// Escalation hook for the external unattended-case timer.
#[axum::debug_handler]
pub async fn escalate_emergency(
    State(facade): State<Arc<SchedulingFacade>>,
    Path(emergency_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let emergency = facade
        .escalate_emergency(emergency_id)
        .await
        .map_err(map_dispatch_error)?;

    Ok(Json(json!({
        "success": true,
        "emergency": emergency
    })))
}

#[axum::debug_handler]
pub async fn dispatch_candidates(
    State(facade): State<Arc<SchedulingFacade>>,
    Path(emergency_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let candidates = facade
        .dispatch_candidates(emergency_id)
        .await
        .map_err(map_dispatch_error)?;

    Ok(Json(json!({
        "success": true,
        "candidates": candidates
    })))
}

#[axum::debug_handler]
pub async fn assign_emergency(
    State(facade): State<Arc<SchedulingFacade>>,
    Path(emergency_id): Path<Uuid>,
    Json(request): Json<AssignEmergencyRequest>,
) -> Result<Json<Value>, AppError> {
    let emergency = facade
        .assign_emergency(emergency_id, request.ambulance_id, request.doctor_id)
        .await
        .map_err(map_dispatch_error)?;

    Ok(Json(json!({
        "success": true,
        "emergency": emergency
    })))
}

#[axum::debug_handler]
pub async fn confirm_emergency_doctor(
    State(facade): State<Arc<SchedulingFacade>>,
    Path(emergency_id): Path<Uuid>,
    Json(request): Json<ConfirmEmergencyRequest>,
) -> Result<Json<Value>, AppError> {
    let emergency = facade
        .confirm_emergency_doctor(emergency_id, request.doctor_id)
        .await
        .map_err(map_dispatch_error)?;

    Ok(Json(json!({
        "success": true,
        "emergency": emergency
    })))
}

#[axum::debug_handler]
pub async fn update_emergency_progress(
    State(facade): State<Arc<SchedulingFacade>>,
    Path(emergency_id): Path<Uuid>,
    Json(request): Json<EmergencyProgressRequest>,
) -> Result<Json<Value>, AppError> {
    let emergency = facade
        .update_emergency_progress(emergency_id, request.target, request.reason)
        .await
        .map_err(map_dispatch_error)?;

    Ok(Json(json!({
        "success": true,
        "emergency": emergency
    })))
}

#[axum::debug_handler]
pub async fn convert_emergency(
    State(facade): State<Arc<SchedulingFacade>>,
    Path(emergency_id): Path<Uuid>,
    Json(overrides): Json<ConversionOverrides>,
) -> Result<Json<Value>, AppError> {
    let appointment = facade
        .convert_emergency_to_appointment(emergency_id, overrides)
        .await
        .map_err(map_conversion_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// Live dispatch change feed as server-sent events. Replaces client-side
/// refresh timers: the engine is the single source of change.
pub async fn emergency_events(
    State(facade): State<Arc<SchedulingFacade>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = facade.subscribe_dispatch_events();

    let stream = futures::stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => match Event::default().event("dispatch").json_data(&event) {
                    Ok(sse_event) => return Some((Ok(sse_event), receiver)),
                    Err(_) => continue,
                },
                // A slow consumer skips what it missed and keeps going.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

// Invalid transitions are safe to report verbatim; conflicts reach the
// patient as a generic notice, never the stored reason text.

fn map_appointment_error(err: AppointmentError) -> AppError {
    match err {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::InvalidTransition { .. } => AppError::BadRequest(err.to_string()),
        AppointmentError::PermissionDenied => AppError::Forbidden(err.to_string()),
        AppointmentError::Conflict => {
            AppError::Conflict("This slot is no longer available".to_string())
        }
        AppointmentError::InvalidTime(msg) => AppError::ValidationError(msg),
        AppointmentError::CollaboratorUnavailable(msg) => AppError::ExternalService(msg),
    }
}

fn map_availability_error(err: AvailabilityError) -> AppError {
    match err {
        AvailabilityError::Conflict => {
            AppError::Conflict("This slot is no longer available".to_string())
        }
        AvailabilityError::LeadTime { .. } => AppError::BadRequest(err.to_string()),
        AvailabilityError::InvalidInterval(msg) => AppError::ValidationError(msg),
    }
}

fn map_dispatch_error(err: DispatchError) -> AppError {
    match err {
        DispatchError::NotFound => AppError::NotFound("Emergency not found".to_string()),
        DispatchError::InvalidTransition { .. } => AppError::BadRequest(err.to_string()),
        DispatchError::AmbulanceUnavailable => AppError::Conflict(err.to_string()),
        DispatchError::ConfirmationUnavailable(_) | DispatchError::ConversionUnavailable(_) => {
            AppError::BadRequest(err.to_string())
        }
        DispatchError::PermissionDenied => AppError::Forbidden(err.to_string()),
        DispatchError::CollaboratorUnavailable(msg) => AppError::ExternalService(msg),
    }
}

fn map_conversion_error(err: ConversionError) -> AppError {
    match err {
        ConversionError::Dispatch(inner) => map_dispatch_error(inner),
        ConversionError::Appointment(inner) => map_appointment_error(inner),
        ConversionError::NoDoctor | ConversionError::ClinicUnresolved => {
            AppError::BadRequest(err.to_string())
        }
    }
}
