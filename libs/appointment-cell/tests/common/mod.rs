#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentStatus, AppointmentType, SweepSchedule};
use appointment_cell::services::{
    AppointmentLifecycleService, AppointmentNotifier, AppointmentStore, InMemoryAppointmentStore,
    LifecycleSweeper,
};
use notification_cell::{
    InMemoryInbox, NotificationError, NotificationGateway, NotificationRequest, NotificationType,
    PushProvider,
};

pub const CADENCE: Duration = Duration::from_secs(300);

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 20, 10, 0, 0).unwrap()
}

pub fn minutes(n: i64) -> chrono::Duration {
    chrono::Duration::minutes(n)
}

pub fn appointment(status: AppointmentStatus, date_time: DateTime<Utc>) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        doctor_id: Uuid::new_v4(),
        date_time,
        appointment_type: AppointmentType::GeneralConsultation,
        duration_minutes: AppointmentType::GeneralConsultation.default_duration_minutes(),
        status,
        reminder_sent_one_hour: false,
        reminder_sent_five_minutes: false,
        comments: String::new(),
    }
}

/// Push provider that accepts everything and remembers what it was given.
#[derive(Default)]
pub struct RecordingPush {
    pub sent: Mutex<Vec<NotificationRequest>>,
}

#[async_trait]
impl PushProvider for RecordingPush {
    async fn push(&self, _token: &str, request: &NotificationRequest) -> Result<(), NotificationError> {
        self.sent.lock().await.push(request.clone());
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<InMemoryAppointmentStore>,
    pub push: Arc<RecordingPush>,
    pub inbox: Arc<InMemoryInbox>,
    pub lifecycle: Arc<AppointmentLifecycleService>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryAppointmentStore::new());
        let push = Arc::new(RecordingPush::default());
        let inbox = Arc::new(InMemoryInbox::new());

        let gateway = Arc::new(NotificationGateway::new(
            Some(push.clone() as Arc<dyn PushProvider>),
            inbox.clone(),
            Duration::from_secs(1),
        ));
        let store_dyn: Arc<dyn AppointmentStore> = store.clone();
        let notifier = Arc::new(AppointmentNotifier::new(store_dyn.clone(), gateway));
        let lifecycle = Arc::new(AppointmentLifecycleService::new(store_dyn, notifier));

        Self { store, push, inbox, lifecycle }
    }

    pub fn sweeper(&self) -> LifecycleSweeper {
        LifecycleSweeper::new(
            self.store.clone(),
            self.lifecycle.clone(),
            SweepSchedule::default(),
            CADENCE,
            4,
        )
        .unwrap()
    }

    /// Stores the appointment and registers push tokens for both parties.
    pub async fn insert(&self, appointment: Appointment) -> Appointment {
        self.store
            .set_push_token(appointment.patient_id, format!("patient-{}", appointment.id))
            .await;
        self.store
            .set_push_token(appointment.doctor_id, format!("doctor-{}", appointment.id))
            .await;
        self.store.insert(appointment.clone()).await;
        appointment
    }

    /// Stores the appointment with no push tokens at all.
    pub async fn insert_without_tokens(&self, appointment: Appointment) -> Appointment {
        self.store.insert(appointment.clone()).await;
        appointment
    }

    pub async fn reload(&self, appointment: &Appointment) -> Appointment {
        self.store.snapshot(appointment.id).await.unwrap()
    }

    /// Every notification that reached someone, by push or in-app.
    pub async fn delivered(&self) -> Vec<(Uuid, NotificationType, Uuid)> {
        let mut all: Vec<(Uuid, NotificationType, Uuid)> = self
            .push
            .sent
            .lock()
            .await
            .iter()
            .map(|r| (r.user_id, r.notification_type, r.related_appointment_id))
            .collect();

        all.extend(
            self.inbox
                .all()
                .await
                .into_iter()
                .map(|n| (n.user_id, n.notification_type, n.related_appointment_id)),
        );
        all
    }

    pub async fn delivered_of(&self, kind: NotificationType) -> Vec<Uuid> {
        self.delivered()
            .await
            .into_iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(user, _, _)| user)
            .collect()
    }
}
