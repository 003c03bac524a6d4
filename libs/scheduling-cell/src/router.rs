// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::facade::SchedulingFacade;

pub fn scheduling_routes(state: Arc<SchedulingFacade>) -> Router {
    Router::new()
        // Appointment lifecycle
        .route(
            "/appointments",
            post(handlers::book_appointment).get(handlers::search_appointments),
        )
        .route("/appointments/{appointment_id}", get(handlers::get_appointment))
        .route(
            "/appointments/{appointment_id}/transition",
            post(handlers::transition_appointment),
        )
        .route("/appointments/expire-stale", post(handlers::expire_stale_bookings))
        // Doctor calendar
        .route("/doctors/{doctor_id}/schedule", get(handlers::doctor_schedule))
        .route("/doctors/{doctor_id}/leave", post(handlers::block_doctor_time))
        // Emergency dispatch
        .route(
            "/emergencies",
            post(handlers::submit_emergency).get(handlers::list_emergencies),
        )
        .route("/emergencies/events", get(handlers::emergency_events))
        .route("/emergencies/{emergency_id}/escalate", post(handlers::escalate_emergency))
        .route("/emergencies/{emergency_id}/candidates", get(handlers::dispatch_candidates))
        .route("/emergencies/{emergency_id}/assign", post(handlers::assign_emergency))
        .route("/emergencies/{emergency_id}/confirm", post(handlers::confirm_emergency_doctor))
        .route("/emergencies/{emergency_id}/progress", post(handlers::update_emergency_progress))
        .route("/emergencies/{emergency_id}/convert", post(handlers::convert_emergency))
        .with_state(state)
}
