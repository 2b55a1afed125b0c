// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{Appointment, AppointmentError, CancelAppointmentRequest, SweepReport, TransitionOutcome};
use crate::services::{AppointmentLifecycleService, LifecycleSweeper};

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

pub async fn get_appointment(
    State(lifecycle): State<Arc<AppointmentLifecycleService>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = lifecycle
        .get_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(appointment))
}

pub async fn confirm_appointment(
    State(lifecycle): State<Arc<AppointmentLifecycleService>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    transition_response(lifecycle.confirm(appointment_id).await)
}

pub async fn cancel_appointment(
    State(lifecycle): State<Arc<AppointmentLifecycleService>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    transition_response(
        lifecycle
            .cancel(appointment_id, request.cancelled_by, &request.reason)
            .await,
    )
}

pub async fn complete_appointment(
    State(lifecycle): State<Arc<AppointmentLifecycleService>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    transition_response(lifecycle.complete(appointment_id, Utc::now()).await)
}

// ==============================================================================
// SWEEP HANDLERS
// ==============================================================================

pub async fn run_sweep(State(sweeper): State<Arc<LifecycleSweeper>>) -> Json<SweepReport> {
    Json(sweeper.run_at(Utc::now()).await)
}

pub async fn get_latest_sweep(
    State(sweeper): State<Arc<LifecycleSweeper>>,
) -> Result<Json<SweepReport>, AppError> {
    sweeper
        .last_report()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No sweep has run yet".to_string()))
}

// ==============================================================================
// HELPERS
// ==============================================================================

fn transition_response(result: Result<TransitionOutcome, AppointmentError>) -> Result<Json<Value>, AppError> {
    match result {
        Ok(outcome) => Ok(Json(json!({
            "applied": outcome.is_applied(),
            "result": outcome
        }))),
        // Benign: reported, not failed.
        Err(e @ AppointmentError::InvalidTransition { .. }) => Ok(Json(json!({
            "applied": false,
            "reason": e.to_string()
        }))),
        Err(e) => Err(map_appointment_error(e)),
    }
}

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound(e.to_string()),
        AppointmentError::InvalidTransition { .. } => AppError::BadRequest(e.to_string()),
        AppointmentError::PreconditionStale => AppError::Conflict(e.to_string()),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::InvalidSchedule(msg) => AppError::Internal(msg),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        AppointmentError::Timeout { .. } => AppError::Timeout(e.to_string()),
    }
}
