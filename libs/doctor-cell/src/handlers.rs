use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{DoctorAvailabilityResponse, DoctorError};
use crate::services::availability::AvailabilityService;

pub async fn get_bookable_slots(
    State(service): State<Arc<AvailabilityService>>,
    Path((doctor_id, date)): Path<(Uuid, NaiveDate)>,
) -> Result<Json<DoctorAvailabilityResponse>, AppError> {
    let available_slots = service
        .get_bookable_slots(doctor_id, date, Utc::now())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(DoctorAvailabilityResponse {
        doctor_id,
        date,
        available_slots,
    }))
}

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::InvalidAvailability(msg) => AppError::ValidationError(msg),
        DoctorError::DatabaseError(msg) => AppError::Database(msg),
    }
}
