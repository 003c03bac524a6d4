use std::sync::Arc;

use axum::{routing::get, Router};

use scheduling_cell::{scheduling_routes, SchedulingFacade};

pub fn create_router(facade: Arc<SchedulingFacade>) -> Router {
    Router::new()
        .route("/", get(|| async { "Meridian Clinic scheduling API is running!" }))
        .nest("/scheduling", scheduling_routes(facade))
}
