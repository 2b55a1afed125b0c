use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use notification_cell::*;

#[derive(Clone, Copy)]
enum PushBehaviour {
    Accept,
    RejectToken,
    Fail,
    Hang,
}

struct FakePush {
    behaviour: PushBehaviour,
    calls: Mutex<Vec<String>>,
}

impl FakePush {
    fn new(behaviour: PushBehaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PushProvider for FakePush {
    async fn push(&self, token: &str, _request: &NotificationRequest) -> Result<(), NotificationError> {
        self.calls.lock().await.push(token.to_string());
        match self.behaviour {
            PushBehaviour::Accept => Ok(()),
            PushBehaviour::RejectToken => Err(NotificationError::InvalidToken),
            PushBehaviour::Fail => Err(NotificationError::NotificationDeliveryFailed("HTTP 503".to_string())),
            PushBehaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        }
    }
}

struct BrokenInbox;

#[async_trait]
impl InAppNotificationSink for BrokenInbox {
    async fn record(&self, _notification: InAppNotification) -> Result<(), NotificationError> {
        Err(NotificationError::FallbackWriteFailed("store unavailable".to_string()))
    }
}

fn request(token: Option<&str>) -> NotificationRequest {
    NotificationRequest {
        user_id: Uuid::new_v4(),
        token: token.map(str::to_string),
        title: "Appointment in 1 hour".to_string(),
        body: "Your appointment starts at 10:00.".to_string(),
        notification_type: NotificationType::Reminder,
        related_appointment_id: Uuid::new_v4(),
    }
}

fn gateway(push: Option<Arc<FakePush>>, inbox: Arc<dyn InAppNotificationSink>) -> NotificationGateway {
    NotificationGateway::new(
        push.map(|p| p as Arc<dyn PushProvider>),
        inbox,
        Duration::from_millis(200),
    )
}

#[tokio::test]
async fn push_success_skips_fallback() {
    let push = FakePush::new(PushBehaviour::Accept);
    let inbox = Arc::new(InMemoryInbox::new());
    let gateway = gateway(Some(push.clone()), inbox.clone());

    let outcome = tokio_test::assert_ok!(gateway.send(&request(Some("device-token"))).await);

    assert_eq!(outcome, DeliveryOutcome::Delivered);
    assert_eq!(*push.calls.lock().await, vec!["device-token".to_string()]);
    assert!(inbox.is_empty().await);
}

#[tokio::test]
async fn missing_token_falls_back_without_push_attempt() {
    let push = FakePush::new(PushBehaviour::Accept);
    let inbox = Arc::new(InMemoryInbox::new());
    let gateway = gateway(Some(push.clone()), inbox.clone());
    let request = request(None);

    let outcome = gateway.send(&request).await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::DeliveredViaFallback { reason: FallbackReason::MissingToken });
    assert!(push.calls.lock().await.is_empty());

    let stored = inbox.for_user(request.user_id).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, request.title);
    assert_eq!(stored[0].notification_type, NotificationType::Reminder);
    assert_eq!(stored[0].related_appointment_id, request.related_appointment_id);
    assert!(!stored[0].is_read);
}

#[tokio::test]
async fn blank_token_counts_as_missing() {
    let push = FakePush::new(PushBehaviour::Accept);
    let inbox = Arc::new(InMemoryInbox::new());
    let gateway = gateway(Some(push.clone()), inbox.clone());

    let outcome = gateway.send(&request(Some("   "))).await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::DeliveredViaFallback { reason: FallbackReason::MissingToken });
    assert!(push.calls.lock().await.is_empty());
    assert_eq!(inbox.len().await, 1);
}

#[tokio::test]
async fn rejected_token_falls_back() {
    let inbox = Arc::new(InMemoryInbox::new());
    let gateway = gateway(Some(FakePush::new(PushBehaviour::RejectToken)), inbox.clone());

    let outcome = gateway.send(&request(Some("stale-token"))).await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::DeliveredViaFallback { reason: FallbackReason::InvalidToken });
    assert_eq!(inbox.len().await, 1);
}

#[tokio::test]
async fn provider_error_falls_back() {
    let inbox = Arc::new(InMemoryInbox::new());
    let gateway = gateway(Some(FakePush::new(PushBehaviour::Fail)), inbox.clone());

    let outcome = gateway.send(&request(Some("device-token"))).await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::DeliveredViaFallback { reason: FallbackReason::ProviderError });
    assert_eq!(inbox.len().await, 1);
}

#[tokio::test]
async fn slow_push_times_out_into_fallback() {
    let inbox = Arc::new(InMemoryInbox::new());
    let gateway = gateway(Some(FakePush::new(PushBehaviour::Hang)), inbox.clone());

    let outcome = gateway.send(&request(Some("device-token"))).await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::DeliveredViaFallback { reason: FallbackReason::Timeout });
    assert_eq!(inbox.len().await, 1);
}

#[tokio::test]
async fn disabled_push_always_uses_inbox() {
    let inbox = Arc::new(InMemoryInbox::new());
    let gateway = gateway(None, inbox.clone());

    let outcome = gateway.send(&request(Some("device-token"))).await.unwrap();

    assert_eq!(outcome, DeliveryOutcome::DeliveredViaFallback { reason: FallbackReason::PushDisabled });
    assert_eq!(inbox.len().await, 1);
}

#[tokio::test]
async fn broken_inbox_is_the_only_hard_error() {
    let gateway = gateway(Some(FakePush::new(PushBehaviour::Fail)), Arc::new(BrokenInbox));

    let result = gateway.send(&request(Some("device-token"))).await;
    assert_matches!(result, Err(NotificationError::FallbackWriteFailed(_)));

    // Push success never touches the inbox
    let gateway = self::gateway(Some(FakePush::new(PushBehaviour::Accept)), Arc::new(BrokenInbox));
    assert_matches!(gateway.send(&request(Some("device-token"))).await, Ok(DeliveryOutcome::Delivered));
}

#[tokio::test]
async fn deliver_all_tallies_each_outcome() {
    let push = FakePush::new(PushBehaviour::Accept);
    let inbox = Arc::new(InMemoryInbox::new());
    let gateway = gateway(Some(push), inbox.clone());

    let summary = gateway
        .deliver_all(&[request(Some("a")), request(None), request(Some("b"))])
        .await;

    assert_eq!(summary, DeliverySummary { delivered: 2, via_fallback: 1, failed: 0 });
    assert_eq!(summary.total(), 3);

    let broken = self::gateway(None, Arc::new(BrokenInbox));
    let summary = broken.deliver_all(&[request(None), request(None)]).await;
    assert_eq!(summary, DeliverySummary { delivered: 0, via_fallback: 0, failed: 2 });
}
