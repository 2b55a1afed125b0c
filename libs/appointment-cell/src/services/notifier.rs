use std::sync::Arc;

use futures::future::join_all;
use tracing::warn;
use uuid::Uuid;

use notification_cell::{DeliverySummary, NotificationGateway, NotificationRequest, NotificationType};

use crate::models::{Appointment, CancelledBy, ReminderKind};
use crate::services::store::AppointmentStore;

/// One lifecycle event worth telling someone about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Confirmed,
    Reminder(ReminderKind),
    Cancelled { reason: String, by: CancelledBy },
    Feedback,
}

impl Notice {
    pub fn notification_type(&self) -> NotificationType {
        match self {
            Notice::Confirmed => NotificationType::Confirmation,
            Notice::Reminder(_) => NotificationType::Reminder,
            Notice::Cancelled { .. } => NotificationType::Cancellation,
            Notice::Feedback => NotificationType::Feedback,
        }
    }

    pub fn recipients(&self, appointment: &Appointment) -> Vec<Uuid> {
        match self {
            Notice::Confirmed | Notice::Feedback | Notice::Reminder(ReminderKind::OneHour) => {
                vec![appointment.patient_id]
            }
            // The party who cancelled is not told about it.
            Notice::Cancelled { by: CancelledBy::Patient, .. } => vec![appointment.doctor_id],
            Notice::Cancelled { by: CancelledBy::Doctor, .. } => vec![appointment.patient_id],
            Notice::Reminder(ReminderKind::FiveMinutes) | Notice::Cancelled { by: CancelledBy::System, .. } => {
                vec![appointment.patient_id, appointment.doctor_id]
            }
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Notice::Confirmed => "Appointment confirmed",
            Notice::Reminder(ReminderKind::OneHour) => "Appointment in 1 hour",
            Notice::Reminder(ReminderKind::FiveMinutes) => "Appointment in 5 minutes",
            Notice::Cancelled { .. } => "Appointment cancelled",
            Notice::Feedback => "How was your appointment?",
        }
    }

    pub fn body(&self, appointment: &Appointment) -> String {
        let at = appointment.date_time.format("%Y-%m-%d %H:%M UTC");
        match self {
            Notice::Confirmed => format!("Your appointment on {} has been confirmed.", at),
            Notice::Reminder(ReminderKind::OneHour) => {
                format!("Your appointment starts in about an hour, at {}.", at)
            }
            Notice::Reminder(ReminderKind::FiveMinutes) => {
                format!("Your appointment starts in a few minutes, at {}.", at)
            }
            Notice::Cancelled { reason, .. } => {
                format!("The appointment on {} was cancelled: {}", at, reason)
            }
            Notice::Feedback => "Tell us how your consultation went.".to_string(),
        }
    }
}

/// Turns lifecycle events into gateway sends, one per recipient.
pub struct AppointmentNotifier {
    store: Arc<dyn AppointmentStore>,
    gateway: Arc<NotificationGateway>,
}

impl AppointmentNotifier {
    pub fn new(store: Arc<dyn AppointmentStore>, gateway: Arc<NotificationGateway>) -> Self {
        Self { store, gateway }
    }

    pub async fn notify(&self, appointment: &Appointment, notice: &Notice) -> DeliverySummary {
        let recipients = notice.recipients(appointment);
        let tokens = join_all(recipients.iter().map(|user_id| self.resolve_token(*user_id))).await;

        let requests: Vec<NotificationRequest> = recipients
            .into_iter()
            .zip(tokens)
            .map(|(user_id, token)| NotificationRequest {
                user_id,
                token,
                title: notice.title().to_string(),
                body: notice.body(appointment),
                notification_type: notice.notification_type(),
                related_appointment_id: appointment.id,
            })
            .collect();

        self.gateway.deliver_all(&requests).await
    }

    // A failed lookup is treated as "no token" so the gateway falls back.
    async fn resolve_token(&self, user_id: Uuid) -> Option<String> {
        match self.store.push_token(user_id).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Push token lookup failed for user {}: {}", user_id, e);
                None
            }
        }
    }
}
