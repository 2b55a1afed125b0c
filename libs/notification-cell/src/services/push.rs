use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use shared_config::AppConfig;

use crate::error::NotificationError;
use crate::models::NotificationRequest;

/// A push provider that can deliver to a device token.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// `Err(InvalidToken)` when the provider says the token is dead,
    /// `Err(NotificationDeliveryFailed)` for any other refusal.
    async fn push(&self, token: &str, request: &NotificationRequest) -> Result<(), NotificationError>;
}

/// Firebase Cloud Messaging HTTP v1 client.
/// POST {base}/projects/{project}/messages:send
pub struct FcmPushClient {
    client: Client,
    project_id: String,
    access_token: String,
    base_url: String,
}

impl FcmPushClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_push_configured() {
            return Err(NotificationError::NotConfigured);
        }

        let client = Client::builder()
            .timeout(config.io_timeout())
            .build()
            .map_err(|e| NotificationError::NotificationDeliveryFailed(e.to_string()))?;

        Ok(Self {
            client,
            project_id: config.fcm_project_id.clone(),
            access_token: config.fcm_access_token.clone(),
            base_url: config.fcm_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn message_body(token: &str, request: &NotificationRequest) -> Value {
        json!({
            "message": {
                "token": token,
                "notification": {
                    "title": request.title,
                    "body": request.body
                },
                "data": {
                    "type": request.notification_type.to_string(),
                    "appointment_id": request.related_appointment_id.to_string()
                }
            }
        })
    }

    fn is_token_rejection(status: u16, body: &str) -> bool {
        if status == 404 {
            return true;
        }

        let parsed: Value = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };

        parsed["error"]["details"]
            .as_array()
            .map(|details| {
                details.iter().any(|detail| {
                    matches!(
                        detail["errorCode"].as_str(),
                        Some("UNREGISTERED") | Some("INVALID_ARGUMENT")
                    )
                })
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl PushProvider for FcmPushClient {
    async fn push(&self, token: &str, request: &NotificationRequest) -> Result<(), NotificationError> {
        let url = format!("{}/projects/{}/messages:send", self.base_url, self.project_id);
        debug!("Sending {} push for appointment {}", request.notification_type, request.related_appointment_id);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .json(&Self::message_body(token, request))
            .send()
            .await
            .map_err(|e| NotificationError::NotificationDeliveryFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| NotificationError::NotificationDeliveryFailed(e.to_string()))?;

        if Self::is_token_rejection(status.as_u16(), &response_text) {
            warn!("FCM rejected token for user {}: {}", request.user_id, status);
            return Err(NotificationError::InvalidToken);
        }

        error!("FCM send failed: {} - {}", status, response_text);
        Err(NotificationError::NotificationDeliveryFailed(format!(
            "HTTP {}: {}",
            status, response_text
        )))
    }
}
