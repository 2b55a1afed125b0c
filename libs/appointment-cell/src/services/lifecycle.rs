// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentPatch, AppointmentStatus, CancelledBy,
    LifecycleRules, Precondition, ReminderKind, TransitionOutcome,
};
use crate::services::notifier::{AppointmentNotifier, Notice};
use crate::services::store::AppointmentStore;

pub const AUTO_CANCEL_COMMENT: &str =
    "Automatically cancelled: the appointment was not confirmed by the doctor in time.";

/// The appointment state machine. Every transition, human or time-driven,
/// goes through a guard and then a single conditional write.
pub struct AppointmentLifecycleService {
    store: Arc<dyn AppointmentStore>,
    notifier: Arc<AppointmentNotifier>,
    rules: LifecycleRules,
}

impl AppointmentLifecycleService {
    pub fn new(store: Arc<dyn AppointmentStore>, notifier: Arc<AppointmentNotifier>) -> Self {
        Self::with_rules(store, notifier, LifecycleRules::default())
    }

    pub fn with_rules(
        store: Arc<dyn AppointmentStore>,
        notifier: Arc<AppointmentNotifier>,
        rules: LifecycleRules,
    ) -> Self {
        Self { store, notifier, rules }
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !self.get_valid_transitions(current_status).contains(&new_status) {
            debug!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidTransition {
                from: current_status,
                to: new_status,
            });
        }
        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
            AppointmentStatus::Confirmed => vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store.get_appointment(id).await
    }

    // ==========================================================================
    // HUMAN-TRIGGERED TRANSITIONS
    // ==========================================================================

    pub async fn confirm(&self, id: Uuid) -> Result<TransitionOutcome, AppointmentError> {
        let appointment = self.store.get_appointment(id).await?;
        self.confirm_appointment(&appointment).await
    }

    /// Pending -> Confirmed, then a confirmation to the patient.
    #[instrument(skip(self, appointment), fields(appointment_id = %appointment.id))]
    pub async fn confirm_appointment(&self, appointment: &Appointment) -> Result<TransitionOutcome, AppointmentError> {
        if let Some(unchanged) = self.guard(appointment, AppointmentStatus::Confirmed)? {
            return Ok(unchanged);
        }

        self.commit(
            appointment,
            Precondition::status(appointment.status),
            AppointmentPatch::status(AppointmentStatus::Confirmed),
            Notice::Confirmed,
        )
        .await
    }

    pub async fn cancel(
        &self,
        id: Uuid,
        cancelled_by: CancelledBy,
        reason: &str,
    ) -> Result<TransitionOutcome, AppointmentError> {
        let appointment = self.store.get_appointment(id).await?;
        self.cancel_appointment(&appointment, cancelled_by, reason).await
    }

    /// Pending or Confirmed -> Cancelled. The reason lands in `comments` and
    /// the other party is told; a system cancel tells both.
    #[instrument(skip(self, appointment, reason), fields(appointment_id = %appointment.id, cancelled_by = %cancelled_by))]
    pub async fn cancel_appointment(
        &self,
        appointment: &Appointment,
        cancelled_by: CancelledBy,
        reason: &str,
    ) -> Result<TransitionOutcome, AppointmentError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppointmentError::ValidationError(
                "Cancellation reason is required".to_string(),
            ));
        }

        if let Some(unchanged) = self.guard(appointment, AppointmentStatus::Cancelled)? {
            return Ok(unchanged);
        }

        let note = format!("Cancelled by {}: {}", cancelled_by, reason);
        self.commit(
            appointment,
            Precondition::status(appointment.status).with_comments(appointment.comments.as_str()),
            AppointmentPatch::status(AppointmentStatus::Cancelled).with_comments(appointment.comments_with(&note)),
            Notice::Cancelled { reason: reason.to_string(), by: cancelled_by },
        )
        .await
    }

    // ==========================================================================
    // TIME-DRIVEN TRANSITIONS
    // ==========================================================================

    pub async fn complete(&self, id: Uuid, now: DateTime<Utc>) -> Result<TransitionOutcome, AppointmentError> {
        let appointment = self.store.get_appointment(id).await?;
        self.complete_appointment(&appointment, now).await
    }

    /// Confirmed -> Completed once the completion delay has passed, then a
    /// feedback request to the patient.
    #[instrument(skip(self, appointment), fields(appointment_id = %appointment.id))]
    pub async fn complete_appointment(
        &self,
        appointment: &Appointment,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppointmentError> {
        if let Some(unchanged) = self.guard(appointment, AppointmentStatus::Completed)? {
            return Ok(unchanged);
        }

        let due_at = self.rules.completion_due_at(appointment);
        if now < due_at {
            return Ok(TransitionOutcome::NotDue { due_at });
        }

        self.commit(
            appointment,
            Precondition::status(AppointmentStatus::Confirmed),
            AppointmentPatch::status(AppointmentStatus::Completed),
            Notice::Feedback,
        )
        .await
    }

    pub async fn auto_cancel(&self, id: Uuid, now: DateTime<Utc>) -> Result<TransitionOutcome, AppointmentError> {
        let appointment = self.store.get_appointment(id).await?;
        self.auto_cancel_appointment(&appointment, now).await
    }

    /// Pending -> Cancelled when the doctor has not confirmed by the decision
    /// deadline. Confirmed appointments are never auto-cancelled.
    #[instrument(skip(self, appointment), fields(appointment_id = %appointment.id))]
    pub async fn auto_cancel_appointment(
        &self,
        appointment: &Appointment,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppointmentError> {
        if appointment.status.is_terminal() {
            return Ok(TransitionOutcome::Unchanged { status: appointment.status });
        }
        if appointment.status != AppointmentStatus::Pending {
            return Err(AppointmentError::InvalidTransition {
                from: appointment.status,
                to: AppointmentStatus::Cancelled,
            });
        }

        let due_at = self.rules.auto_cancel_due_at(appointment);
        if now < due_at {
            return Ok(TransitionOutcome::NotDue { due_at });
        }

        self.commit(
            appointment,
            Precondition::status(AppointmentStatus::Pending).with_comments(appointment.comments.as_str()),
            AppointmentPatch::status(AppointmentStatus::Cancelled)
                .with_comments(appointment.comments_with(AUTO_CANCEL_COMMENT)),
            Notice::Cancelled {
                reason: "not confirmed in time".to_string(),
                by: CancelledBy::System,
            },
        )
        .await
    }

    /// Sets the reminder flag first and only notifies if this call flipped it.
    #[instrument(skip(self, appointment), fields(appointment_id = %appointment.id, kind = %kind))]
    pub async fn send_reminder(
        &self,
        appointment: &Appointment,
        kind: ReminderKind,
    ) -> Result<TransitionOutcome, AppointmentError> {
        let already_sent = match kind {
            ReminderKind::OneHour => appointment.reminder_sent_one_hour,
            ReminderKind::FiveMinutes => appointment.reminder_sent_five_minutes,
        };
        if already_sent || appointment.status != AppointmentStatus::Confirmed {
            return Ok(TransitionOutcome::Unchanged { status: appointment.status });
        }

        let (precondition, patch) = match kind {
            ReminderKind::OneHour => (
                Precondition::status(AppointmentStatus::Confirmed).with_one_hour_flag(false),
                AppointmentPatch { reminder_sent_one_hour: Some(true), ..AppointmentPatch::default() },
            ),
            ReminderKind::FiveMinutes => (
                Precondition::status(AppointmentStatus::Confirmed).with_five_minute_flag(false),
                AppointmentPatch { reminder_sent_five_minutes: Some(true), ..AppointmentPatch::default() },
            ),
        };

        self.commit(appointment, precondition, patch, Notice::Reminder(kind)).await
    }

    // Private helper methods

    /// `Some(Unchanged)` when there is nothing to do, `Err` when the target is
    /// unreachable from the current status, `None` to proceed.
    fn guard(
        &self,
        appointment: &Appointment,
        target: AppointmentStatus,
    ) -> Result<Option<TransitionOutcome>, AppointmentError> {
        if appointment.status == target || appointment.status.is_terminal() {
            debug!("Appointment {} already {}, nothing to do", appointment.id, appointment.status);
            return Ok(Some(TransitionOutcome::Unchanged { status: appointment.status }));
        }

        self.validate_status_transition(appointment.status, target)?;
        Ok(None)
    }

    async fn commit(
        &self,
        appointment: &Appointment,
        precondition: Precondition,
        patch: AppointmentPatch,
        notice: Notice,
    ) -> Result<TransitionOutcome, AppointmentError> {
        let updated = match self.store.update_if(appointment.id, &precondition, &patch).await? {
            Some(updated) => updated,
            None => {
                warn!("Appointment {} changed concurrently, skipping", appointment.id);
                return Err(AppointmentError::PreconditionStale);
            }
        };

        info!(
            "Appointment {} {} -> {}, sending {}",
            updated.id, appointment.status, updated.status, notice.notification_type()
        );

        let notifications = self.notifier.notify(&updated, &notice).await;

        Ok(TransitionOutcome::Applied {
            appointment: updated,
            notifications,
        })
    }
}
