use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::{appointment_routes, sweep_routes};
use appointment_cell::services::{AppointmentLifecycleService, LifecycleSweeper};
use doctor_cell::router::doctor_routes;
use doctor_cell::services::availability::AvailabilityService;

pub fn create_router(
    lifecycle: Arc<AppointmentLifecycleService>,
    sweeper: Arc<LifecycleSweeper>,
    availability: Arc<AvailabilityService>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduler is running!" }))
        .nest("/appointments", appointment_routes(lifecycle))
        .nest("/sweeps", sweep_routes(sweeper))
        .nest("/doctors", doctor_routes(availability))
}
