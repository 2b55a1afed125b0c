// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::services::{AppointmentLifecycleService, LifecycleSweeper};

pub fn appointment_routes(lifecycle: Arc<AppointmentLifecycleService>) -> Router {
    Router::new()
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .with_state(lifecycle)
}

pub fn sweep_routes(sweeper: Arc<LifecycleSweeper>) -> Router {
    Router::new()
        .route("/run", post(handlers::run_sweep))
        .route("/latest", get(handlers::get_latest_sweep))
        .with_state(sweeper)
}
