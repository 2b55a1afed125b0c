use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::{Notify, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, PassReport, ReminderKind, SweepPass, SweepReport,
    SweepSchedule, TransitionOutcome,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::store::AppointmentStore;

/// Periodic job that applies time-driven transitions.
///
/// A run captures `now` once, runs every pass concurrently and fans out the
/// per-record work up to `max_concurrency`. Record failures are counted and
/// logged; they never stop the run or a sibling record.
pub struct LifecycleSweeper {
    store: Arc<dyn AppointmentStore>,
    lifecycle: Arc<AppointmentLifecycleService>,
    schedule: SweepSchedule,
    cadence: Duration,
    max_concurrency: usize,
    is_shutdown: RwLock<bool>,
    wake: Notify,
    last_report: RwLock<Option<SweepReport>>,
}

impl LifecycleSweeper {
    /// Fails with `InvalidSchedule` when a window could be skipped over by the cadence.
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        lifecycle: Arc<AppointmentLifecycleService>,
        schedule: SweepSchedule,
        cadence: Duration,
        max_concurrency: usize,
    ) -> Result<Self, AppointmentError> {
        schedule.validate(cadence)?;

        Ok(Self {
            store,
            lifecycle,
            schedule,
            cadence,
            max_concurrency: max_concurrency.max(1),
            is_shutdown: RwLock::new(false),
            wake: Notify::new(),
            last_report: RwLock::new(None),
        })
    }

    pub async fn last_report(&self) -> Option<SweepReport> {
        self.last_report.read().await.clone()
    }

    /// Tick until `shutdown` is called. A slow run delays the next tick
    /// rather than stacking runs, and a run in flight always finishes.
    pub async fn start(&self) {
        info!(
            "Starting lifecycle sweeper: every {:?}, up to {} records in flight",
            self.cadence, self.max_concurrency
        );

        let mut interval = tokio::time::interval(self.cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.wake.notified() => {}
            }

            if *self.is_shutdown.read().await {
                break;
            }

            self.run_at(Utc::now()).await;
        }

        info!("Lifecycle sweeper stopped");
    }

    pub async fn shutdown(&self) {
        info!("Initiating lifecycle sweeper shutdown");
        let mut is_shutdown = self.is_shutdown.write().await;
        *is_shutdown = true;
        // Stored as a permit if the loop is mid-run.
        self.wake.notify_one();
    }

    /// One full sweep as of `now`.
    #[instrument(skip(self))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> SweepReport {
        let started = Instant::now();
        let run_id = Uuid::new_v4();

        let (one_hour, five_minute, completion, auto_cancel, overdue) = tokio::join!(
            self.run_pass(SweepPass::OneHourReminder, now),
            self.run_pass(SweepPass::FiveMinuteReminder, now),
            self.run_pass(SweepPass::Completion, now),
            self.run_pass(SweepPass::AutoCancel, now),
            self.run_pass(SweepPass::OverdueCancel, now),
        );

        let report = SweepReport {
            run_id,
            now,
            passes: vec![one_hour, five_minute, completion, auto_cancel, overdue],
            duration_ms: started.elapsed().as_millis() as u64,
        };

        let notifications = report.notifications();
        info!(
            "Sweep {} finished in {}ms: {} transitions, {} notifications ({} via fallback, {} lost)",
            run_id,
            report.duration_ms,
            report.total_applied(),
            notifications.total(),
            notifications.via_fallback,
            notifications.failed
        );

        *self.last_report.write().await = Some(report.clone());
        report
    }

    // Private helper methods

    async fn run_pass(&self, pass: SweepPass, now: DateTime<Utc>) -> PassReport {
        let mut report = PassReport::new(pass);
        let query = self.schedule.query(pass, now);

        let candidates = match self.store.find_appointments(&query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("Sweep pass {} could not load candidates: {}", pass, e);
                report.query_error = Some(e.to_string());
                return report;
            }
        };

        report.counters.candidates = candidates.len() as u32;
        debug!("Sweep pass {}: {} candidates", pass, candidates.len());

        let results: Vec<Result<TransitionOutcome, AppointmentError>> = stream::iter(candidates)
            .map(|appointment| async move { self.process(pass, &appointment, now).await })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for result in results {
            match result {
                Ok(TransitionOutcome::Applied { notifications, .. }) => {
                    report.counters.applied += 1;
                    report.notifications.merge(notifications);
                }
                Ok(TransitionOutcome::Unchanged { .. }) => report.counters.unchanged += 1,
                Ok(TransitionOutcome::NotDue { .. }) => report.counters.not_due += 1,
                Err(AppointmentError::PreconditionStale) => report.counters.stale += 1,
                Err(AppointmentError::InvalidTransition { .. }) => report.counters.invalid += 1,
                Err(_) => report.counters.failed += 1,
            }
        }

        report
    }

    async fn process(
        &self,
        pass: SweepPass,
        appointment: &Appointment,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppointmentError> {
        let result = match pass {
            SweepPass::OneHourReminder => self.lifecycle.send_reminder(appointment, ReminderKind::OneHour).await,
            SweepPass::FiveMinuteReminder => {
                self.lifecycle.send_reminder(appointment, ReminderKind::FiveMinutes).await
            }
            SweepPass::Completion => self.lifecycle.complete_appointment(appointment, now).await,
            SweepPass::AutoCancel | SweepPass::OverdueCancel => {
                self.lifecycle.auto_cancel_appointment(appointment, now).await
            }
        };

        match &result {
            Err(AppointmentError::PreconditionStale) => {
                debug!("Pass {} skipped appointment {}: changed since read", pass, appointment.id);
            }
            Err(e @ AppointmentError::InvalidTransition { .. }) => {
                warn!("Pass {} skipped appointment {}: {}", pass, appointment.id, e);
            }
            Err(e) => {
                error!("Pass {} failed on appointment {}: {}", pass, appointment.id, e);
            }
            Ok(_) => {}
        }

        result
    }
}
