use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate};
use wiremock::matchers::{method, path, query_param};

use doctor_cell::services::availability::AvailabilityService;
use shared_database::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 20, hour, minute, 0).unwrap()
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 20).unwrap()
}

async fn service_for(mock_server: &MockServer) -> AvailabilityService {
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let supabase = Arc::new(SupabaseClient::new(&config).unwrap());
    AvailabilityService::new(supabase)
}

async fn mount_window(mock_server: &MockServer, doctor_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availabilities"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("date", "eq.2025-06-20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_response(doctor_id, date(), at(9, 0), at(11, 0))
        ])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn returns_future_slots_minus_bookings() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    mount_window(&mock_server, doctor_id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("status", "in.(pending,confirmed)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::booked_interval_response(at(10, 0), 30, "confirmed")
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    let slots = service.get_bookable_slots(doctor_id, date(), at(9, 20)).await.unwrap();

    let starts: Vec<_> = slots.iter().map(|slot| slot.start_time).collect();
    assert_eq!(starts, vec![at(9, 30), at(9, 45), at(10, 30), at(10, 45)]);
    assert!(slots.iter().all(|slot| slot.duration_minutes == 15));
    assert_eq!(slots[0].end_time, at(9, 45));
}

#[tokio::test]
async fn missing_window_means_no_availability() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availabilities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;

    assert!(service.get_doctor_availability(doctor_id, date()).await.unwrap().is_none());
    assert!(service.get_bookable_slots(doctor_id, date(), at(8, 0)).await.unwrap().is_empty());
    assert!(!service.is_slot_bookable(doctor_id, at(9, 0), at(8, 0)).await.unwrap());
}

#[tokio::test]
async fn slot_bookability_checks_listing() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    mount_window(&mock_server, doctor_id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::booked_interval_response(at(9, 15), 15, "pending")
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;

    assert!(service.is_slot_bookable(doctor_id, at(9, 0), at(8, 0)).await.unwrap());
    assert!(!service.is_slot_bookable(doctor_id, at(9, 15), at(8, 0)).await.unwrap());
    assert!(!service.is_slot_bookable(doctor_id, at(9, 5), at(8, 0)).await.unwrap());
}

#[tokio::test]
async fn store_failure_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availabilities"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    let result = service.get_doctor_availability(Uuid::new_v4(), date()).await;

    assert!(matches!(result, Err(doctor_cell::DoctorError::DatabaseError(_))));
}
