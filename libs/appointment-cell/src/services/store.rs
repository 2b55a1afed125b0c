use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError, AppointmentPatch, AppointmentQuery, Precondition};

/// Persistence seam for everything the lifecycle touches.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// `Err(NotFound)` when no record has this id.
    async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError>;

    async fn find_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, AppointmentError>;

    /// Atomic compare-and-set. `Ok(None)` when the record no longer satisfies
    /// `precondition`; nothing is written in that case.
    async fn update_if(
        &self,
        id: Uuid,
        precondition: &Precondition,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// The user's registered push token, if any.
    async fn push_token(&self, user_id: Uuid) -> Result<Option<String>, AppointmentError>;
}

fn timestamp(instant: DateTime<Utc>) -> String {
    urlencoding::encode(&instant.to_rfc3339_opts(SecondsFormat::Secs, true)).into_owned()
}

/// PostgREST filter string for a window query, ordered by start time.
pub fn query_filters(query: &AppointmentQuery) -> String {
    let upper = if query.closed { "lte" } else { "lt" };
    format!(
        "status=eq.{}&date_time=gte.{}&date_time={}.{}&order=date_time.asc",
        query.status,
        timestamp(query.window.start),
        upper,
        timestamp(query.window.end)
    )
}

/// PostgREST filter string carrying a write precondition.
pub fn precondition_filters(id: Uuid, precondition: &Precondition) -> String {
    let mut filters = format!("id=eq.{}&status=eq.{}", id, precondition.status);
    if let Some(sent) = precondition.reminder_sent_one_hour {
        filters.push_str(&format!("&reminder_sent_one_hour=eq.{}", sent));
    }
    if let Some(sent) = precondition.reminder_sent_five_minutes {
        filters.push_str(&format!("&reminder_sent_five_minutes=eq.{}", sent));
    }
    match precondition.comments.as_deref() {
        // A missing note may be stored as NULL or as an empty string.
        Some("") => filters.push_str("&or=(comments.is.null,comments.eq.)"),
        Some(comments) => filters.push_str(&format!("&comments=eq.{}", urlencoding::encode(comments))),
        None => {}
    }
    filters
}

/// Store adapter over the Supabase REST API.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    io_timeout: Duration,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>, io_timeout: Duration) -> Self {
        Self { supabase, io_timeout }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, AppointmentError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match timeout(self.io_timeout, call).await {
            Ok(result) => result.map_err(|e| AppointmentError::DatabaseError(e.to_string())),
            Err(_) => Err(AppointmentError::Timeout {
                timeout_ms: self.io_timeout.as_millis() as u64,
            }),
        }
    }

    fn parse_rows(rows: Vec<Value>) -> Vec<Appointment> {
        rows.into_iter()
            .filter_map(|row| match serde_json::from_value::<Appointment>(row) {
                Ok(appointment) => Some(appointment),
                Err(e) => {
                    warn!("Skipping unreadable appointment row: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);

        let result: Vec<Value> = self
            .bounded(self.supabase.request(Method::GET, &path, Some(self.supabase.service_token()), None))
            .await?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row).map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    async fn find_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?{}", query_filters(query));
        debug!("Querying {} appointments in {} .. {}", query.status, query.window.start, query.window.end);

        let result: Vec<Value> = self
            .bounded(self.supabase.request(Method::GET, &path, Some(self.supabase.service_token()), None))
            .await?;

        Ok(Self::parse_rows(result))
    }

    async fn update_if(
        &self,
        id: Uuid,
        precondition: &Precondition,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?{}", precondition_filters(id, precondition));
        let body = serde_json::to_value(patch).map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let result: Vec<Value> = self
            .bounded(self.supabase.request_with_headers(
                Method::PATCH,
                &path,
                Some(self.supabase.service_token()),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            ))
            .await?;

        // An empty representation means the filters matched nothing.
        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| AppointmentError::DatabaseError(e.to_string())),
            None => {
                debug!("Conditional update on appointment {} matched no rows", id);
                Ok(None)
            }
        }
    }

    async fn push_token(&self, user_id: Uuid) -> Result<Option<String>, AppointmentError> {
        let path = format!("/rest/v1/users?id=eq.{}&select=fcm_token", user_id);

        let result: Vec<Value> = self
            .bounded(self.supabase.request(Method::GET, &path, Some(self.supabase.service_token()), None))
            .await?;

        Ok(result
            .first()
            .and_then(|row| row["fcm_token"].as_str())
            .map(str::to_string))
    }
}
