use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentPatch, AppointmentQuery, Precondition};
use crate::services::store::AppointmentStore;

/// Process-local store with the same compare-and-set semantics as the
/// PostgREST adapter. Used by tests and local runs.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    push_tokens: RwLock<HashMap<Uuid, String>>,
    failing_writes: RwLock<HashSet<Uuid>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, appointment: Appointment) {
        self.appointments.write().await.insert(appointment.id, appointment);
    }

    pub async fn set_push_token(&self, user_id: Uuid, token: impl Into<String>) {
        self.push_tokens.write().await.insert(user_id, token.into());
    }

    /// Every later write to `id` fails with a database error.
    pub async fn fail_writes_for(&self, id: Uuid) {
        self.failing_writes.write().await.insert(id);
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<Appointment> {
        self.appointments.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.snapshot(id).await.ok_or(AppointmentError::NotFound)
    }

    async fn find_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, AppointmentError> {
        let mut matching: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|appointment| query.matches(appointment))
            .cloned()
            .collect();

        matching.sort_by_key(|appointment| appointment.date_time);
        Ok(matching)
    }

    async fn update_if(
        &self,
        id: Uuid,
        precondition: &Precondition,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>, AppointmentError> {
        if self.failing_writes.read().await.contains(&id) {
            return Err(AppointmentError::DatabaseError(format!("write to {} rejected", id)));
        }

        // Check and write under one lock.
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&id) {
            Some(appointment) if precondition.holds_for(appointment) => {
                patch.apply_to(appointment);
                Ok(Some(appointment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn push_token(&self, user_id: Uuid) -> Result<Option<String>, AppointmentError> {
        Ok(self.push_tokens.read().await.get(&user_id).cloned())
    }
}
