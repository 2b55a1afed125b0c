use reqwest::Method;
use serde_json::{json, Value};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wiremock::matchers::{header, method, path, query_param};

use shared_config::AppConfig;
use shared_database::SupabaseClient;

fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_service_role_key: "test-service-key".to_string(),
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn sends_api_key_and_bearer_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.pending"))
        .and(header("apikey", "test-anon-key"))
        .and(header("authorization", "Bearer test-service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "a1"}])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::new(&config_for(&mock_server)).unwrap();
    let rows: Vec<Value> = client
        .request(
            Method::GET,
            "/rest/v1/appointments?status=eq.pending",
            Some(client.service_token()),
            None,
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "a1");
}

#[tokio::test]
async fn representation_header_is_forwarded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::new(&config_for(&mock_server)).unwrap();
    let rows: Vec<Value> = client
        .request_with_headers(
            Method::PATCH,
            "/rest/v1/appointments?id=eq.a1",
            Some(client.service_token()),
            Some(json!({"status": "confirmed"})),
            Some(SupabaseClient::representation_headers()),
        )
        .await
        .unwrap();

    assert!(rows.is_empty());
}

#[tokio::test]
async fn maps_auth_failures_to_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::new(&config_for(&mock_server)).unwrap();
    let result: anyhow::Result<Vec<Value>> = client
        .request(Method::GET, "/rest/v1/users", None, None)
        .await;

    let message = result.unwrap_err().to_string();
    assert!(message.contains("Authentication error"), "got: {}", message);
}
