// libs/appointment-cell/src/models.rs
use std::fmt;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use notification_cell::DeliverySummary;
use shared_config::AppConfig;
use shared_models::{SweepWindow, TimeWindow};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date_time: DateTime<Utc>,
    pub appointment_type: AppointmentType,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub reminder_sent_one_hour: bool,
    #[serde(default)]
    pub reminder_sent_five_minutes: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub comments: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Appointment {
    /// Existing comments with `note` appended on its own line.
    pub fn comments_with(&self, note: &str) -> String {
        if self.comments.trim().is_empty() {
            note.to_string()
        } else {
            format!("{}\n{}", self.comments.trim_end(), note)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum AppointmentType {
    #[serde(alias = "initial_consultation", alias = "initial", alias = "new_patient")]
    InitialConsultation,

    #[serde(alias = "follow_up_consultation", alias = "follow_up", alias = "followup")]
    FollowUpConsultation,

    #[serde(alias = "general_consultation", alias = "consultation", alias = "general")]
    GeneralConsultation,

    #[serde(alias = "emergency_consultation", alias = "emergency", alias = "urgent")]
    EmergencyConsultation,

    #[serde(alias = "prescription_renewal", alias = "prescription")]
    PrescriptionRenewal,

    #[serde(alias = "specialty_consultation", alias = "specialist")]
    SpecialtyConsultation,
}

impl AppointmentType {
    pub fn default_duration_minutes(&self) -> i32 {
        match self {
            AppointmentType::InitialConsultation => 45,
            AppointmentType::FollowUpConsultation => 30,
            AppointmentType::GeneralConsultation => 30,
            AppointmentType::EmergencyConsultation => 15,
            AppointmentType::PrescriptionRenewal => 15,
            AppointmentType::SpecialtyConsultation => 60,
        }
    }
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::InitialConsultation => write!(f, "InitialConsultation"),
            AppointmentType::FollowUpConsultation => write!(f, "FollowUpConsultation"),
            AppointmentType::GeneralConsultation => write!(f, "GeneralConsultation"),
            AppointmentType::EmergencyConsultation => write!(f, "EmergencyConsultation"),
            AppointmentType::PrescriptionRenewal => write!(f, "PrescriptionRenewal"),
            AppointmentType::SpecialtyConsultation => write!(f, "SpecialtyConsultation"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Patient,
    Doctor,
    System,
}

impl fmt::Display for CancelledBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelledBy::Patient => write!(f, "patient"),
            CancelledBy::Doctor => write!(f, "doctor"),
            CancelledBy::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
    pub cancelled_by: CancelledBy,
}

// ==============================================================================
// STORE QUERY AND CONDITIONAL WRITE MODELS
// ==============================================================================

/// Appointments with one status whose `date_time` falls in a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppointmentQuery {
    pub status: AppointmentStatus,
    pub window: TimeWindow,
    /// `[start, end]` when true, `[start, end)` otherwise.
    pub closed: bool,
}

impl AppointmentQuery {
    pub fn closed(status: AppointmentStatus, window: TimeWindow) -> Self {
        Self { status, window, closed: true }
    }

    pub fn half_open(status: AppointmentStatus, window: TimeWindow) -> Self {
        Self { status, window, closed: false }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        appointment.status == self.status
            && if self.closed {
                self.window.contains_inclusive(appointment.date_time)
            } else {
                self.window.contains(appointment.date_time)
            }
    }
}

/// What must still hold in the store for a conditional write to land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
    pub status: AppointmentStatus,
    pub reminder_sent_one_hour: Option<bool>,
    pub reminder_sent_five_minutes: Option<bool>,
    /// Comments as read. Set whenever the write rewrites `comments`.
    pub comments: Option<String>,
}

impl Precondition {
    pub fn status(status: AppointmentStatus) -> Self {
        Self {
            status,
            reminder_sent_one_hour: None,
            reminder_sent_five_minutes: None,
            comments: None,
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    pub fn with_one_hour_flag(mut self, sent: bool) -> Self {
        self.reminder_sent_one_hour = Some(sent);
        self
    }

    pub fn with_five_minute_flag(mut self, sent: bool) -> Self {
        self.reminder_sent_five_minutes = Some(sent);
        self
    }

    pub fn holds_for(&self, appointment: &Appointment) -> bool {
        appointment.status == self.status
            && self
                .reminder_sent_one_hour
                .map_or(true, |sent| appointment.reminder_sent_one_hour == sent)
            && self
                .reminder_sent_five_minutes
                .map_or(true, |sent| appointment.reminder_sent_five_minutes == sent)
            && self
                .comments
                .as_ref()
                .map_or(true, |comments| &appointment.comments == comments)
    }
}

/// Fields a conditional write sets. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_sent_one_hour: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_sent_five_minutes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl AppointmentPatch {
    pub fn status(status: AppointmentStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    pub fn with_comments(mut self, comments: String) -> Self {
        self.comments = Some(comments);
        self
    }

    pub fn apply_to(&self, appointment: &mut Appointment) {
        if let Some(status) = self.status {
            appointment.status = status;
        }
        if let Some(sent) = self.reminder_sent_one_hour {
            appointment.reminder_sent_one_hour = sent;
        }
        if let Some(sent) = self.reminder_sent_five_minutes {
            appointment.reminder_sent_five_minutes = sent;
        }
        if let Some(comments) = &self.comments {
            appointment.comments = comments.clone();
        }
    }
}

// ==============================================================================
// LIFECYCLE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    OneHour,
    FiveMinutes,
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderKind::OneHour => write!(f, "one_hour"),
            ReminderKind::FiveMinutes => write!(f, "five_minutes"),
        }
    }
}

/// What a guarded transition did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TransitionOutcome {
    Applied {
        appointment: Appointment,
        notifications: DeliverySummary,
    },
    /// Already at or past the target, or terminal.
    Unchanged { status: AppointmentStatus },
    /// Valid source state but the deadline has not been reached.
    NotDue { due_at: DateTime<Utc> },
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

/// Deadlines for the time-driven transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleRules {
    /// Completion is due this long after `date_time`.
    pub completion_delay: Duration,
    /// A pending appointment is cancelled once it is this close to `date_time`.
    pub auto_cancel_lead: Duration,
}

impl Default for LifecycleRules {
    fn default() -> Self {
        Self {
            completion_delay: Duration::minutes(5),
            auto_cancel_lead: Duration::minutes(60),
        }
    }
}

impl LifecycleRules {
    pub fn completion_due_at(&self, appointment: &Appointment) -> DateTime<Utc> {
        appointment.date_time + self.completion_delay
    }

    pub fn auto_cancel_due_at(&self, appointment: &Appointment) -> DateTime<Utc> {
        appointment.date_time - self.auto_cancel_lead
    }
}

// ==============================================================================
// SWEEP MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepPass {
    OneHourReminder,
    FiveMinuteReminder,
    Completion,
    AutoCancel,
    OverdueCancel,
}

impl SweepPass {
    pub const ALL: [SweepPass; 5] = [
        SweepPass::OneHourReminder,
        SweepPass::FiveMinuteReminder,
        SweepPass::Completion,
        SweepPass::AutoCancel,
        SweepPass::OverdueCancel,
    ];
}

impl fmt::Display for SweepPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepPass::OneHourReminder => write!(f, "one_hour_reminder"),
            SweepPass::FiveMinuteReminder => write!(f, "five_minute_reminder"),
            SweepPass::Completion => write!(f, "completion"),
            SweepPass::AutoCancel => write!(f, "auto_cancel"),
            SweepPass::OverdueCancel => write!(f, "overdue_cancel"),
        }
    }
}

pub const MAX_OVERDUE_LOOKBACK_HOURS: i64 = 24 * 366;

/// Window offsets for every pass, relative to the run's `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSchedule {
    pub one_hour_reminder: SweepWindow,
    pub five_minute_reminder: SweepWindow,
    pub completion: SweepWindow,
    pub auto_cancel: SweepWindow,
    /// How far back the overdue pass looks for stale pending records.
    pub overdue_lookback_hours: i64,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self {
            one_hour_reminder: SweepWindow::minutes(55, 65),
            five_minute_reminder: SweepWindow::minutes(5, 10),
            completion: SweepWindow::minutes(-15, -5),
            auto_cancel: SweepWindow::minutes(55, 65),
            overdue_lookback_hours: 24,
        }
    }
}

impl SweepSchedule {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::default().with_overdue_lookback_hours(config.overdue_cancel_lookback_hours)
    }

    pub fn with_overdue_lookback_hours(mut self, hours: i64) -> Self {
        self.overdue_lookback_hours = hours;
        self
    }

    pub fn query(&self, pass: SweepPass, now: DateTime<Utc>) -> AppointmentQuery {
        match pass {
            SweepPass::OneHourReminder => {
                AppointmentQuery::closed(AppointmentStatus::Confirmed, self.one_hour_reminder.resolve(now))
            }
            SweepPass::FiveMinuteReminder => {
                AppointmentQuery::closed(AppointmentStatus::Confirmed, self.five_minute_reminder.resolve(now))
            }
            SweepPass::Completion => {
                AppointmentQuery::closed(AppointmentStatus::Confirmed, self.completion.resolve(now))
            }
            SweepPass::AutoCancel => {
                AppointmentQuery::closed(AppointmentStatus::Pending, self.auto_cancel.resolve(now))
            }
            // Everything pending from the lookback up to where the auto-cancel window opens.
            SweepPass::OverdueCancel => AppointmentQuery::half_open(
                AppointmentStatus::Pending,
                TimeWindow::new(
                    now - Duration::hours(self.overdue_lookback_hours),
                    now + Duration::minutes(self.auto_cancel.from_minutes),
                ),
            ),
        }
    }

    /// Every closed window must be at least one cadence wide, or an
    /// appointment could slip between two ticks unseen.
    pub fn validate(&self, cadence: StdDuration) -> Result<(), AppointmentError> {
        let cadence = Duration::from_std(cadence)
            .map_err(|e| AppointmentError::InvalidSchedule(e.to_string()))?;

        if cadence <= Duration::zero() {
            return Err(AppointmentError::InvalidSchedule(
                "sweep cadence must be positive".to_string(),
            ));
        }

        let windows = [
            (SweepPass::OneHourReminder, self.one_hour_reminder),
            (SweepPass::FiveMinuteReminder, self.five_minute_reminder),
            (SweepPass::Completion, self.completion),
            (SweepPass::AutoCancel, self.auto_cancel),
        ];

        for (pass, window) in windows {
            if window.is_inverted() {
                return Err(AppointmentError::InvalidSchedule(format!(
                    "{} window is inverted ({} > {} minutes)",
                    pass, window.from_minutes, window.to_minutes
                )));
            }
            if window.width() < cadence {
                return Err(AppointmentError::InvalidSchedule(format!(
                    "{} window is {} minutes wide, narrower than the {} second cadence",
                    pass,
                    window.width().num_minutes(),
                    cadence.num_seconds()
                )));
            }
        }

        if !(0..=MAX_OVERDUE_LOOKBACK_HOURS).contains(&self.overdue_lookback_hours) {
            return Err(AppointmentError::InvalidSchedule(format!(
                "overdue lookback must be between 0 and {} hours, got {}",
                MAX_OVERDUE_LOOKBACK_HOURS, self.overdue_lookback_hours
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassCounters {
    pub candidates: u32,
    pub applied: u32,
    pub unchanged: u32,
    pub not_due: u32,
    pub invalid: u32,
    pub stale: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub pass: SweepPass,
    #[serde(flatten)]
    pub counters: PassCounters,
    pub notifications: DeliverySummary,
    /// Set when the candidate query itself failed.
    pub query_error: Option<String>,
}

impl PassReport {
    pub fn new(pass: SweepPass) -> Self {
        Self {
            pass,
            counters: PassCounters::default(),
            notifications: DeliverySummary::default(),
            query_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub run_id: Uuid,
    pub now: DateTime<Utc>,
    pub passes: Vec<PassReport>,
    pub duration_ms: u64,
}

impl SweepReport {
    pub fn pass(&self, pass: SweepPass) -> Option<&PassReport> {
        self.passes.iter().find(|report| report.pass == pass)
    }

    pub fn total_applied(&self) -> u32 {
        self.passes.iter().map(|report| report.counters.applied).sum()
    }

    pub fn notifications(&self) -> DeliverySummary {
        let mut summary = DeliverySummary::default();
        for report in &self.passes {
            summary.merge(report.notifications);
        }
        summary
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment changed since it was read")]
    PreconditionStale,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid sweep schedule: {0}")]
    InvalidSchedule(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Store call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}
