use std::sync::Arc;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub fcm_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            fcm_base_url: "http://localhost:54322/v1".to_string(),
        }
    }
}

impl TestConfig {
    /// Points both the store and the push provider at one mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            fcm_base_url: format!("{}/v1", uri),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            fcm_project_id: "test-project".to_string(),
            fcm_access_token: "test-fcm-token".to_string(),
            fcm_base_url: self.fcm_base_url.clone(),
            io_timeout_seconds: 2,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn appointment_response(
        id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        date_time: DateTime<Utc>,
        status: &str,
    ) -> Value {
        json!({
            "id": id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "date_time": rfc3339(date_time),
            "appointment_type": "GeneralConsultation",
            "duration_minutes": 30,
            "status": status,
            "reminder_sent_one_hour": false,
            "reminder_sent_five_minutes": false,
            "comments": ""
        })
    }

    pub fn user_response(id: Uuid, fcm_token: Option<&str>) -> Value {
        json!({
            "id": id,
            "fcm_token": fcm_token
        })
    }

    pub fn availability_response(
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Value {
        json!({
            "doctor_id": doctor_id,
            "date": date.to_string(),
            "start_time": rfc3339(start_time),
            "end_time": rfc3339(end_time)
        })
    }

    pub fn booked_interval_response(date_time: DateTime<Utc>, duration_minutes: i32, status: &str) -> Value {
        json!({
            "date_time": rfc3339(date_time),
            "duration_minutes": duration_minutes,
            "status": status
        })
    }

    pub fn fcm_success_response(project_id: &str) -> Value {
        json!({
            "name": format!("projects/{}/messages/0:1500415314455276%31bd1c9631bd1c96", project_id)
        })
    }

    pub fn fcm_unregistered_response() -> Value {
        json!({
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND",
                "details": [{
                    "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                    "errorCode": "UNREGISTERED"
                }]
            }
        })
    }
}
