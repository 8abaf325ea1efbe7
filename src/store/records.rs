//! Record types persisted by the task store.
//!
//! Every piece of cross-invocation state lives in these records rather than
//! in engine fields: the hosting process may be torn down and restarted
//! between any two callbacks, so anything worth keeping gets a stable key
//! and a serde-serializable shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifiers for records and their matching alarms.
///
/// Task records and the alarms that fire them share a name, mirroring the
/// cleanup path: when either side is removed the other can be looked up by
/// the same string.
pub mod keys {
    /// Prefix for manual punch tasks; the full key is `task-<created-millis>`.
    pub const TASK_PREFIX: &str = "task-";
    /// Singleton auto clock-out task (at most one exists at a time).
    pub const AUTO_CLOCKOUT: &str = "auto-clockout";
    /// One-shot guard flag: auto clock-out already triggered this session.
    pub const AUTO_CLOCKOUT_TRIGGERED: &str = "auto-clockout-triggered";
    /// Append-only failed-task log.
    pub const FAILED_TASKS: &str = "failed-tasks";
    /// Persisted state of the post-clock-out idle reminder.
    pub const IDLE_REMINDER: &str = "idle-reminder";
    /// Persisted state of the early-departure reminder.
    pub const EARLY_REMINDER: &str = "early-reminder";
    /// Recurring low-frequency reconciliation tick (alarm name only).
    pub const PERIODIC_CHECK: &str = "periodic-check";

    /// Key (and alarm name) for a manual punch task.
    pub fn task(id: &str) -> String {
        format!("{}{}", TASK_PREFIX, id)
    }
}

/// What kind of scheduled work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// User-requested punch at a chosen time.
    ManualPunch,
    /// The singleton automatic clock-out after required hours.
    AutoClockOut,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ManualPunch => "manual_punch",
            TaskKind::AutoClockOut => "auto_clock_out",
        }
    }
}

/// Punch direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunchDirection {
    In,
    Out,
}

impl PunchDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PunchDirection::In => "in",
            PunchDirection::Out => "out",
        }
    }
}

/// Lifecycle of a scheduled task.
///
/// `Pending` (armed, not yet due) -> `Fired` (alarm callback invoked) ->
/// `Completed` or `Failed` (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Fired,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Fired => "fired",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Estimator inputs captured at schedule time, kept for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub effective_minutes: u32,
    pub remaining_minutes: u32,
}

/// A deferred punch action owned by the task store until consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub kind: TaskKind,
    pub direction: PunchDirection,
    pub due_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TaskMetadata>,
}

impl ScheduledTask {
    /// A manual punch, keyed by its creation timestamp so any number may
    /// coexist.
    pub fn manual(direction: PunchDirection, due_at: DateTime<Utc>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: created_at.timestamp_millis().to_string(),
            kind: TaskKind::ManualPunch,
            direction,
            due_at,
            status: TaskStatus::Pending,
            created_at,
            metadata: None,
        }
    }

    /// The singleton auto clock-out.
    pub fn auto_clock_out(due_at: DateTime<Utc>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: keys::AUTO_CLOCKOUT.to_string(),
            kind: TaskKind::AutoClockOut,
            direction: PunchDirection::Out,
            due_at,
            status: TaskStatus::Pending,
            created_at,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: TaskMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Storage key and alarm name for this task.
    pub fn key(&self) -> String {
        match self.kind {
            TaskKind::ManualPunch => keys::task(&self.id),
            TaskKind::AutoClockOut => keys::AUTO_CLOCKOUT.to_string(),
        }
    }
}

/// Which reminder cycle a [`ReminderState`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// "You are clocked out, did you forget to clock back in?"
    PostClockOutIdle,
    /// Clocked out before reaching required hours.
    EarlyDeparture,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::PostClockOutIdle => "post_clock_out_idle",
            ReminderKind::EarlyDeparture => "early_departure",
        }
    }

    /// Storage key and alarm name for this reminder kind. Process-wide
    /// singleton per kind.
    pub fn key(&self) -> &'static str {
        match self {
            ReminderKind::PostClockOutIdle => keys::IDLE_REMINDER,
            ReminderKind::EarlyDeparture => keys::EARLY_REMINDER,
        }
    }
}

/// Persisted state of one reminder cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderState {
    pub active: bool,
    pub kind: ReminderKind,
    pub started_at: DateTime<Utc>,
    /// Minutes still needed - tracked for the early-departure reminder only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<u32>,
}

impl ReminderState {
    pub fn idle(started_at: DateTime<Utc>) -> Self {
        Self {
            active: true,
            kind: ReminderKind::PostClockOutIdle,
            started_at,
            remaining_minutes: None,
        }
    }

    pub fn early_departure(started_at: DateTime<Utc>, remaining_minutes: u32) -> Self {
        Self {
            active: true,
            kind: ReminderKind::EarlyDeparture,
            started_at,
            remaining_minutes: Some(remaining_minutes),
        }
    }
}

/// Append-only log entry for a task that could not be executed.
///
/// Grown, never mutated; read back only for user-visible diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTaskRecord {
    pub task: ScheduledTask,
    pub failed_at: DateTime<Utc>,
    pub reason: String,
}
