use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::error::NotificationError;
use crate::models::InAppNotification;

/// Durable per-user notification sink used when push is unavailable.
#[async_trait]
pub trait InAppNotificationSink: Send + Sync {
    async fn record(&self, notification: InAppNotification) -> Result<(), NotificationError>;
}

/// Writes fallback records to the `notifications` table.
pub struct SupabaseInbox {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseInbox {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl InAppNotificationSink for SupabaseInbox {
    async fn record(&self, notification: InAppNotification) -> Result<(), NotificationError> {
        let body = serde_json::to_value(&notification)?;

        let _: Vec<Value> = self.supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/notifications",
                Some(self.supabase.service_token()),
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(|e| NotificationError::FallbackWriteFailed(e.to_string()))?;

        debug!("Stored in-app notification {} for user {}", notification.id, notification.user_id);
        Ok(())
    }
}

/// Process-local sink, for tests and local runs without a store.
#[derive(Default)]
pub struct InMemoryInbox {
    notifications: RwLock<Vec<InAppNotification>>,
}

impl InMemoryInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<InAppNotification> {
        self.notifications.read().await.clone()
    }

    pub async fn for_user(&self, user_id: Uuid) -> Vec<InAppNotification> {
        self.notifications
            .read()
            .await
            .iter()
            .filter(|notification| notification.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.notifications.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notifications.read().await.is_empty()
    }
}

#[async_trait]
impl InAppNotificationSink for InMemoryInbox {
    async fn record(&self, notification: InAppNotification) -> Result<(), NotificationError> {
        self.notifications.write().await.push(notification);
        Ok(())
    }
}
