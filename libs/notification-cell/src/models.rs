use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Confirmation,
    Reminder,
    Cancellation,
    Feedback,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationType::Confirmation => write!(f, "confirmation"),
            NotificationType::Reminder => write!(f, "reminder"),
            NotificationType::Cancellation => write!(f, "cancellation"),
            NotificationType::Feedback => write!(f, "feedback"),
        }
    }
}

/// One message for one recipient. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub user_id: Uuid,
    pub token: Option<String>,
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub related_appointment_id: Uuid,
}

impl NotificationRequest {
    /// The push credential, if one is usable.
    pub fn push_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    MissingToken,
    PushDisabled,
    InvalidToken,
    ProviderError,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DeliveryOutcome {
    Delivered,
    DeliveredViaFallback { reason: FallbackReason },
}

/// Durable record the app shows on next open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InAppNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub related_appointment_id: Uuid,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl InAppNotification {
    pub fn from_request(request: &NotificationRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            title: request.title.clone(),
            body: request.body.clone(),
            notification_type: request.notification_type,
            related_appointment_id: request.related_appointment_id,
            is_read: false,
            created_at,
        }
    }
}

/// Tally of send attempts, merged across a batch or a sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySummary {
    pub delivered: u32,
    pub via_fallback: u32,
    pub failed: u32,
}

impl DeliverySummary {
    pub fn record(&mut self, outcome: Option<DeliveryOutcome>) {
        match outcome {
            Some(DeliveryOutcome::Delivered) => self.delivered += 1,
            Some(DeliveryOutcome::DeliveredViaFallback { .. }) => self.via_fallback += 1,
            None => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: DeliverySummary) {
        self.delivered += other.delivered;
        self.via_fallback += other.via_fallback;
        self.failed += other.failed;
    }

    pub fn total(&self) -> u32 {
        self.delivered + self.via_fallback + self.failed
    }
}
