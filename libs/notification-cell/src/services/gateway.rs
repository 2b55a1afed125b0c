use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::error::NotificationError;
use crate::models::{
    DeliveryOutcome, DeliverySummary, FallbackReason, InAppNotification, NotificationRequest,
};
use crate::services::inbox::InAppNotificationSink;
use crate::services::push::PushProvider;

/// Push first, durable in-app record otherwise.
///
/// Both outcomes count as delivered. The only error a caller sees is a failed
/// fallback write, and even that is meant to be logged rather than acted on.
pub struct NotificationGateway {
    push: Option<Arc<dyn PushProvider>>,
    inbox: Arc<dyn InAppNotificationSink>,
    io_timeout: Duration,
}

impl NotificationGateway {
    pub fn new(
        push: Option<Arc<dyn PushProvider>>,
        inbox: Arc<dyn InAppNotificationSink>,
        io_timeout: Duration,
    ) -> Self {
        if push.is_none() {
            warn!("Push provider not configured - notifications will use in-app fallback only");
        }

        Self { push, inbox, io_timeout }
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id, kind = %request.notification_type))]
    pub async fn send(&self, request: &NotificationRequest) -> Result<DeliveryOutcome, NotificationError> {
        let reason = match (self.push.as_ref(), request.push_token()) {
            (None, _) => FallbackReason::PushDisabled,
            (Some(_), None) => FallbackReason::MissingToken,
            (Some(push), Some(token)) => match self.push_with_timeout(push.as_ref(), token, request).await {
                Ok(()) => {
                    debug!("Push delivered for appointment {}", request.related_appointment_id);
                    return Ok(DeliveryOutcome::Delivered);
                }
                Err(NotificationError::InvalidToken) => FallbackReason::InvalidToken,
                Err(NotificationError::Timeout { .. }) => FallbackReason::Timeout,
                Err(e) => {
                    warn!("Push failed, falling back to in-app record: {}", e);
                    FallbackReason::ProviderError
                }
            },
        };

        self.write_fallback(request).await?;

        info!(
            "Notification for appointment {} stored in-app ({:?})",
            request.related_appointment_id, reason
        );
        Ok(DeliveryOutcome::DeliveredViaFallback { reason })
    }

    /// Send and swallow: a failed fallback write is logged and reported as `None`.
    pub async fn deliver(&self, request: &NotificationRequest) -> Option<DeliveryOutcome> {
        match self.send(request).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(
                    "Notification for user {} on appointment {} lost: {}",
                    request.user_id, request.related_appointment_id, e
                );
                None
            }
        }
    }

    /// Independent sends, all in flight at once.
    pub async fn deliver_all(&self, requests: &[NotificationRequest]) -> DeliverySummary {
        let outcomes = join_all(requests.iter().map(|request| self.deliver(request))).await;

        let mut summary = DeliverySummary::default();
        for outcome in outcomes {
            summary.record(outcome);
        }
        summary
    }

    // Private helper methods

    async fn push_with_timeout(
        &self,
        push: &dyn PushProvider,
        token: &str,
        request: &NotificationRequest,
    ) -> Result<(), NotificationError> {
        match timeout(self.io_timeout, push.push(token, request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Push timed out after {:?}", self.io_timeout);
                Err(NotificationError::Timeout {
                    timeout_ms: self.io_timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn write_fallback(&self, request: &NotificationRequest) -> Result<(), NotificationError> {
        let record = InAppNotification::from_request(request, Utc::now());

        match timeout(self.io_timeout, self.inbox.record(record)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(NotificationError::FallbackWriteFailed(msg))) => {
                Err(NotificationError::FallbackWriteFailed(msg))
            }
            Ok(Err(e)) => Err(NotificationError::FallbackWriteFailed(e.to_string())),
            Err(_) => Err(NotificationError::FallbackWriteFailed(format!(
                "timed out after {:?}",
                self.io_timeout
            ))),
        }
    }
}
