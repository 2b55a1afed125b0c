use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::TimeWindow;

pub const DEFAULT_SLOT_GRANULARITY_MINUTES: i64 = 15;

/// Longest appointment the booking flow accepts. Bookings that start this far
/// before a working window can still overlap it.
pub const MAX_APPOINTMENT_MINUTES: i64 = 240;

/// Working window for one doctor on one date, as stored by the booking side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Explicit slot list when the doctor curated one; otherwise the full grid applies.
    #[serde(default)]
    pub available_slots: Option<Vec<DateTime<Utc>>>,
}

impl AvailabilityWindow {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }
}

/// A Pending or Confirmed appointment occupying part of a doctor's day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedInterval {
    pub date_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: String,
}

impl BookedInterval {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::starting_at(self.date_time, Duration::minutes(self.duration_minutes.max(0) as i64))
    }

    /// Only live bookings consume slots.
    pub fn is_active(&self) -> bool {
        matches!(self.status.as_str(), "pending" | "confirmed")
    }
}

/// A doctor's bookable slots for one date after reconciliation with bookings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAvailability {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub available_slots: BTreeSet<DateTime<Utc>>,
}

impl DoctorAvailability {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAvailabilityResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub available_slots: Vec<AvailableSlot>,
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Invalid availability: {0}")]
    InvalidAvailability(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
