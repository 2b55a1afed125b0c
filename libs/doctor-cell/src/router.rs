use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use crate::handlers;
use crate::services::availability::AvailabilityService;

pub fn doctor_routes(service: Arc<AvailabilityService>) -> Router {
    Router::new()
        .route("/{doctor_id}/availability/{date}/slots", get(handlers::get_bookable_slots))
        .with_state(service)
}
