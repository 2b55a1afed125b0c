use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    AvailabilityWindow, AvailableSlot, BookedInterval, DoctorAvailability, DoctorError,
    DEFAULT_SLOT_GRANULARITY_MINUTES, MAX_APPOINTMENT_MINUTES,
};
use crate::services::slots::{build_availability, is_bookable};

/// Reads a doctor's working window and live bookings and turns them into slots.
pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
    granularity_minutes: i64,
}

impl AvailabilityService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            granularity_minutes: DEFAULT_SLOT_GRANULARITY_MINUTES,
        }
    }

    pub fn with_granularity(supabase: Arc<SupabaseClient>, granularity_minutes: i64) -> Self {
        Self { supabase, granularity_minutes }
    }

    pub fn granularity_minutes(&self) -> i64 {
        self.granularity_minutes
    }

    /// Reconciled availability for one date, `None` when the doctor has no window.
    pub async fn get_doctor_availability(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DoctorAvailability>, DoctorError> {
        let stored = match self.get_availability_window(doctor_id, date).await? {
            Some(stored) => stored,
            None => return Ok(None),
        };

        if stored.window().is_empty() {
            debug!("Doctor {} has an empty working window on {}", doctor_id, date);
        }

        let bookings = self.get_booked_intervals(doctor_id, &stored).await?;
        Ok(Some(build_availability(&stored, &bookings, self.granularity_minutes)))
    }

    /// Slots still bookable after `now`, in chronological order.
    pub async fn get_bookable_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<AvailableSlot>, DoctorError> {
        let availability = match self.get_doctor_availability(doctor_id, date).await? {
            Some(availability) => availability,
            None => return Ok(vec![]),
        };

        let slot_length = Duration::minutes(self.granularity_minutes);
        let slots = availability
            .available_slots
            .iter()
            .copied()
            .filter(|slot| is_bookable(*slot, &availability.available_slots, now))
            .map(|slot| AvailableSlot {
                start_time: slot,
                end_time: slot + slot_length,
                duration_minutes: self.granularity_minutes as i32,
            })
            .collect();

        Ok(slots)
    }

    pub async fn is_slot_bookable(
        &self,
        doctor_id: Uuid,
        slot: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, DoctorError> {
        match self.get_doctor_availability(doctor_id, slot.date_naive()).await? {
            Some(availability) => Ok(is_bookable(slot, &availability.available_slots, now)),
            None => Ok(false),
        }
    }

    // Private helper methods

    async fn get_availability_window(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<AvailabilityWindow>, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_availabilities?doctor_id=eq.{}&date=eq.{}&limit=1",
            doctor_id, date
        );

        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(self.supabase.service_token()), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => {
                let window = serde_json::from_value(row)
                    .map_err(|e| DoctorError::InvalidAvailability(e.to_string()))?;
                Ok(Some(window))
            }
            None => {
                debug!("No availability stored for doctor {} on {}", doctor_id, date);
                Ok(None)
            }
        }
    }

    async fn get_booked_intervals(
        &self,
        doctor_id: Uuid,
        stored: &AvailabilityWindow,
    ) -> Result<Vec<BookedInterval>, DoctorError> {
        let from = stored.start_time - Duration::minutes(MAX_APPOINTMENT_MINUTES);
        let path = format!(
            "/rest/v1/appointments?select=date_time,duration_minutes,status&doctor_id=eq.{}&status=in.(pending,confirmed)&date_time=gte.{}&date_time=lt.{}",
            doctor_id,
            urlencoding::encode(&from.to_rfc3339_opts(SecondsFormat::Secs, true)),
            urlencoding::encode(&stored.end_time.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );

        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(self.supabase.service_token()), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let bookings = result
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<BookedInterval>(row) {
                Ok(booking) => Some(booking),
                Err(e) => {
                    warn!("Skipping unreadable booking row for doctor {}: {}", doctor_id, e);
                    None
                }
            })
            .collect();

        Ok(bookings)
    }
}
