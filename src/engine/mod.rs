//! Reconciliation engine: the state machine behind every deferred action.
//!
//! Every entry point here is a discrete host callback (an alarm firing, a
//! UI request, the periodic tick) and the host may tear the process down
//! between any two of them, so no decision ever trusts engine memory:
//! handlers re-read persisted task and guard state immediately before
//! acting. Cancellation works the same way in reverse - clearing the timer
//! and the stored record is enough, because a late-arriving callback finds
//! nothing persisted and exits without side effects.

pub mod messages;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use log::{debug, error, info, warn};

use crate::alarm::AlarmScheduler;
use crate::config::Config;
use crate::error::{PunchrError, Result};
use crate::estimator::{AttendanceSnapshot, CompletionEstimator, Estimate};
use crate::portal::{Clock, Notification, Notifier, PageHandle, PageLocator, PortalClient, PortalStatus};
use crate::store::{
    keys, FailedTaskRecord, PunchDirection, ReminderKind, ReminderState, ScheduledTask,
    TaskKind, TaskMetadata, TaskStatus, TaskStore,
};
use crate::timeparse;

pub use messages::{ActionResponse, DebugInfo, EngineRequest, TaskView};

/// Engine-facing slice of the configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub required_minutes: u32,
    pub auto_clockout_buffer_minutes: u32,
    pub early_reminder_interval_minutes: f64,
    pub idle_reminder_interval_minutes: f64,
    pub periodic_check_interval_minutes: f64,
    pub portal_url_pattern: String,
    pub portal_open_url: String,
    /// Pause between the two clock-out sub-steps.
    pub settle_delay: StdDuration,
    /// How long a freshly opened page gets to load before the single retry.
    pub page_load_delay: StdDuration,
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            required_minutes: config.work.required_minutes(),
            auto_clockout_buffer_minutes: config.work.auto_clockout_buffer_minutes,
            early_reminder_interval_minutes: config.reminders.early_interval_minutes,
            idle_reminder_interval_minutes: config.reminders.idle_interval_minutes,
            periodic_check_interval_minutes: config.reminders.periodic_check_minutes,
            portal_url_pattern: config.portal.url_pattern.clone(),
            portal_open_url: config.portal.open_url.clone(),
            settle_delay: StdDuration::from_millis(config.portal.settle_delay_ms),
            page_load_delay: StdDuration::from_millis(config.portal.page_load_delay_ms),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Should the periodic tick trigger the automatic clock-out now?
///
/// Requires being clocked in with the target reached, and not having
/// already fired this session (persisted one-shot guard).
pub fn should_auto_clock_out(
    clocked_in: bool,
    snapshot: &AttendanceSnapshot,
    already_triggered: bool,
    required_minutes: u32,
) -> bool {
    clocked_in && snapshot.effective_minutes >= required_minutes && !already_triggered
}

/// Drives scheduled punches, reminders and the periodic reconciliation
/// against the external collaborators.
pub struct ReconciliationEngine {
    config: EngineConfig,
    estimator: CompletionEstimator,
    store: TaskStore,
    alarms: AlarmScheduler,
    portal: Arc<dyn PortalClient>,
    locator: Arc<dyn PageLocator>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl ReconciliationEngine {
    pub fn new(
        config: EngineConfig,
        store: TaskStore,
        alarms: AlarmScheduler,
        portal: Arc<dyn PortalClient>,
        locator: Arc<dyn PageLocator>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let estimator = CompletionEstimator::new(config.required_minutes);
        Self {
            config,
            estimator,
            store,
            alarms,
            portal,
            locator,
            notifier,
            clock,
        }
    }

    /// Arm the recurring low-frequency reconciliation tick.
    pub async fn start(&self) -> Result<()> {
        let interval = self.config.periodic_check_interval_minutes;
        self.alarms
            .arm_periodic(keys::PERIODIC_CHECK, interval, interval)
            .await
    }

    // ------------------------------------------------------------------
    // Exposed request/response interface
    // ------------------------------------------------------------------

    /// Dispatch a UI request. Errors become failed responses; nothing here
    /// is fatal to the process.
    pub async fn handle_request(&self, request: EngineRequest) -> ActionResponse {
        match request {
            EngineRequest::ScheduleTask { direction, due_at } => {
                match self.schedule_task(direction, due_at).await {
                    Ok(task) => ActionResponse::ok(format!("Task scheduled for {}", task.due_at)),
                    Err(e) => ActionResponse::err(e.to_string()),
                }
            }
            EngineRequest::CancelTask { id } => match self.cancel_task(&id).await {
                Ok(_) => ActionResponse::ok("Task cancelled"),
                Err(e) => ActionResponse::err(e.to_string()),
            },
            EngineRequest::GetScheduledTasks => match self.scheduled_tasks().await {
                Ok(tasks) => {
                    ActionResponse::ok(format!("{} task(s) scheduled", tasks.len())).with_tasks(tasks)
                }
                Err(e) => ActionResponse::err(e.to_string()),
            },
            EngineRequest::ClockInSuccess => match self.clock_in_success().await {
                Ok(task) => {
                    ActionResponse::ok(format!("Auto clock-out scheduled for {}", task.due_at))
                }
                Err(e) => ActionResponse::err(e.to_string()),
            },
            EngineRequest::ClockOutSuccess => match self.clock_out_success().await {
                Ok(()) => ActionResponse::ok("Auto clock-out cancelled, idle reminders started"),
                Err(e) => ActionResponse::err(e.to_string()),
            },
            EngineRequest::EarlyClockOut {
                effective_minutes,
                gross_minutes,
            } => {
                let snapshot = AttendanceSnapshot::new(effective_minutes, gross_minutes);
                match self.early_clock_out(snapshot).await {
                    Ok(estimate) if estimate.remaining_minutes == 0 => {
                        ActionResponse::ok("Required hours already complete").with_remaining(0)
                    }
                    Ok(estimate) => ActionResponse::ok("Early departure reminders started")
                        .with_remaining(estimate.remaining_minutes),
                    Err(e) => ActionResponse::err(e.to_string()),
                }
            }
            EngineRequest::DebugAlarms => match self.debug_snapshot().await {
                Ok(info) => ActionResponse::ok("Debug snapshot").with_debug(info),
                Err(e) => ActionResponse::err(e.to_string()),
            },
        }
    }

    /// Schedule a manual punch. A due time at or before now is rejected
    /// before any timer or store write happens.
    pub async fn schedule_task(
        &self,
        direction: PunchDirection,
        due_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<ScheduledTask> {
        let now = self.clock.now();
        if due_at <= now {
            return Err(PunchrError::PastSchedule(due_at.to_rfc3339()));
        }

        let task = ScheduledTask::manual(direction, due_at, now);
        self.alarms.arm_at(&task.key(), due_at, now).await?;
        self.store.put_task(&task).await?;

        info!("Scheduled {} punch {} for {}", direction.as_str(), task.id, due_at);
        Ok(task)
    }

    /// Cancel a task by id, clearing both its alarm and its record.
    /// Idempotent: cancelling an unknown id reports `false`.
    pub async fn cancel_task(&self, id: &str) -> Result<bool> {
        let key = if id == keys::AUTO_CLOCKOUT || id.starts_with(keys::TASK_PREFIX) {
            id.to_string()
        } else {
            keys::task(id)
        };

        let was_armed = self.alarms.cancel(&key).await?;
        self.store.remove(&key).await?;

        info!("Cancelled task {} (alarm armed: {})", key, was_armed);
        Ok(was_armed)
    }

    /// All live tasks with their actual alarm times attached.
    pub async fn scheduled_tasks(&self) -> Result<Vec<TaskView>> {
        let mut views = Vec::new();
        for task in self.store.list_tasks().await? {
            let scheduled_for = self
                .alarms
                .query(&task.key())
                .await?
                .map(|info| info.scheduled_at);
            views.push(TaskView { task, scheduled_for });
        }
        Ok(views)
    }

    /// The user clocked in: re-arm the singleton auto clock-out for
    /// required-plus-buffer minutes from now, clear the session guard, and
    /// stop both reminder cycles (the user is clearly back at work).
    pub async fn clock_in_success(&self) -> Result<ScheduledTask> {
        self.cancel_auto_clock_out().await?;
        self.store.set_flag(keys::AUTO_CLOCKOUT_TRIGGERED, false).await?;
        self.stop_reminder(ReminderKind::PostClockOutIdle).await?;
        self.stop_reminder(ReminderKind::EarlyDeparture).await?;

        let now = self.clock.now();
        let minutes = self.config.required_minutes + self.config.auto_clockout_buffer_minutes;
        let due = now + Duration::minutes(minutes as i64);

        let task = ScheduledTask::auto_clock_out(due, now);
        self.alarms.arm_at(&task.key(), due, now).await?;
        self.store.put_task(&task).await?;

        info!("Auto clock-out armed for {}", due);
        Ok(task)
    }

    /// The user clocked out: the auto clock-out is no longer wanted, and
    /// the idle reminder cycle starts.
    pub async fn clock_out_success(&self) -> Result<()> {
        self.cancel_auto_clock_out().await?;
        self.start_idle_reminder().await
    }

    async fn cancel_auto_clock_out(&self) -> Result<()> {
        self.alarms.cancel(keys::AUTO_CLOCKOUT).await?;
        self.store.remove(keys::AUTO_CLOCKOUT).await
    }

    /// The user clocked out with the given figures. Starts (or restarts)
    /// the early-departure reminder cycle unless the target is already met,
    /// in which case any running cycle is stopped.
    pub async fn early_clock_out(&self, snapshot: AttendanceSnapshot) -> Result<Estimate> {
        let now = self.clock.now();
        let estimate = self.estimator.estimate(&snapshot, now);

        if estimate.remaining_minutes == 0 {
            self.stop_reminder(ReminderKind::EarlyDeparture).await?;
            return Ok(estimate);
        }

        // Cancel-then-start: at most one live cycle per reminder kind.
        self.stop_reminder(ReminderKind::EarlyDeparture).await?;
        let state = ReminderState::early_departure(now, estimate.remaining_minutes);
        self.store.put_reminder(&state).await?;

        let interval = self.config.early_reminder_interval_minutes;
        self.alarms
            .arm_periodic(keys::EARLY_REMINDER, interval, interval)
            .await?;

        info!(
            "Early-departure reminders started, {} remaining",
            timeparse::format(estimate.remaining_minutes)
        );
        Ok(estimate)
    }

    async fn start_idle_reminder(&self) -> Result<()> {
        self.stop_reminder(ReminderKind::PostClockOutIdle).await?;

        let state = ReminderState::idle(self.clock.now());
        self.store.put_reminder(&state).await?;

        let interval = self.config.idle_reminder_interval_minutes;
        self.alarms
            .arm_periodic(keys::IDLE_REMINDER, interval, interval)
            .await?;

        info!("Idle reminders started (every {} minutes)", interval);
        Ok(())
    }

    async fn stop_reminder(&self, kind: ReminderKind) -> Result<()> {
        self.alarms.cancel(kind.key()).await?;
        self.store.clear_reminder(kind).await
    }

    /// Armed alarms plus raw storage, for diagnostics.
    pub async fn debug_snapshot(&self) -> Result<DebugInfo> {
        let alarms = self.alarms.list_all().await?;
        let storage: BTreeMap<_, _> = self.store.entries().await?.into_iter().collect();
        Ok(DebugInfo {
            current_time: self.clock.now(),
            alarms,
            storage,
        })
    }

    // ------------------------------------------------------------------
    // Alarm-driven state machine
    // ------------------------------------------------------------------

    /// Entry point for every fired alarm.
    pub async fn handle_alarm(&self, name: &str) -> Result<()> {
        debug!("Alarm fired: {}", name);
        match name {
            keys::PERIODIC_CHECK => self.reconcile_tick().await,
            keys::IDLE_REMINDER => self.idle_reminder_tick().await,
            keys::EARLY_REMINDER => self.early_reminder_tick().await,
            keys::AUTO_CLOCKOUT => self.run_task(name).await,
            _ if name.starts_with(keys::TASK_PREFIX) => self.run_task(name).await,
            _ => {
                debug!("Ignoring unknown alarm: {}", name);
                Ok(())
            }
        }
    }

    /// Execute a fired task: Pending -> Fired -> Completed | Failed.
    ///
    /// A fired alarm with no matching record means the task was cancelled
    /// after the alarm was queued; the handler exits without side effects.
    async fn run_task(&self, key: &str) -> Result<()> {
        let Some(mut task) = self.store.get_task(key).await? else {
            warn!("No record for fired alarm {}; treating as cancelled", key);
            return Ok(());
        };

        task.status = TaskStatus::Fired;
        self.store.put_task(&task).await?;

        match self.execute_task(&task).await {
            Ok(()) => {
                info!("Task {} completed", key);
                task.status = TaskStatus::Completed;
            }
            Err(e) => {
                error!("Task {} failed: {}", key, e);
                task.status = TaskStatus::Failed;
                self.store
                    .append_failed(FailedTaskRecord {
                        task: task.clone(),
                        failed_at: self.clock.now(),
                        reason: e.to_string(),
                    })
                    .await?;
            }
        }

        // Consumed either way; failures live on in the failed-task log.
        self.store.remove(key).await
    }

    async fn execute_task(&self, task: &ScheduledTask) -> Result<()> {
        let page = self.locate_page(task.kind).await?;

        match task.direction {
            PunchDirection::In => {
                let response = self.portal.clock_in(&page).await?;
                if !response.success {
                    return Err(PunchrError::ActionRejected(response.message));
                }
            }
            PunchDirection::Out => {
                self.clock_out_sequence(&page).await?;
                if task.kind == TaskKind::AutoClockOut {
                    self.notify_auto_clock_out().await?;
                }
            }
        }
        Ok(())
    }

    /// Find an open portal page. An auto clock-out with no page gets one
    /// open-and-retry after a load delay; anything else has no recovery
    /// target and fails immediately.
    async fn locate_page(&self, kind: TaskKind) -> Result<PageHandle> {
        let pages = self.locator.find_pages(&self.config.portal_url_pattern).await?;
        if let Some(page) = pages.into_iter().next() {
            return Ok(page);
        }

        if kind != TaskKind::AutoClockOut {
            return Err(PunchrError::PageUnreachable("no portal page found".to_string()));
        }

        info!("No portal page found; opening {}", self.config.portal_open_url);
        self.locator.open_page(&self.config.portal_open_url).await?;
        tokio::time::sleep(self.config.page_load_delay).await;

        let pages = self.locator.find_pages(&self.config.portal_url_pattern).await?;
        pages.into_iter().next().ok_or_else(|| {
            PunchrError::PageUnreachable("no portal page after opening one".to_string())
        })
    }

    /// The two-step clock-out. A step 1 failure fails the whole task; a
    /// step 2 failure is logged only, since step 1 already changed the
    /// portal and that partial effect is outside our control.
    async fn clock_out_sequence(&self, page: &PageHandle) -> Result<()> {
        let step1 = self.portal.clock_out_step1(page).await?;
        if !step1.success {
            return Err(PunchrError::ActionRejected(format!(
                "clock-out step 1: {}",
                step1.message
            )));
        }

        tokio::time::sleep(self.config.settle_delay).await;

        match self.portal.clock_out_step2(page).await {
            Ok(response) if response.success => {}
            Ok(response) => warn!("Clock-out step 2 rejected: {}", response.message),
            Err(e) => warn!("Clock-out step 2 failed: {}", e),
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Periodic reconciliation
    // ------------------------------------------------------------------

    /// The low-frequency poll: re-derive live status and reconcile the
    /// auto clock-out guard and both reminder cycles against it.
    pub async fn reconcile_tick(&self) -> Result<()> {
        let page = self
            .locator
            .find_pages(&self.config.portal_url_pattern)
            .await?
            .into_iter()
            .next();

        if let Some(page) = &page {
            let status = self.portal.get_status(page).await?;
            let snapshot = self.portal.get_attendance(page).await?;

            self.refresh_task_metadata(&snapshot).await?;

            let already = self.store.flag(keys::AUTO_CLOCKOUT_TRIGGERED).await?;
            if should_auto_clock_out(
                status.clocked_in,
                &snapshot,
                already,
                self.config.required_minutes,
            ) {
                info!(
                    "Required hours reached ({} effective); clocking out",
                    timeparse::format(snapshot.effective_minutes)
                );
                match self.clock_out_sequence(page).await {
                    Ok(()) => {
                        self.store.set_flag(keys::AUTO_CLOCKOUT_TRIGGERED, true).await?;
                        self.cancel_auto_clock_out().await?;
                        self.notify_auto_clock_out().await?;
                    }
                    // Guard stays unset, so the next tick retries; the rest
                    // of the tick still runs.
                    Err(e) => warn!("Auto clock-out attempt failed: {}", e),
                }
            }

            self.early_reminder_recheck(&status, &snapshot).await?;
        } else {
            debug!("Periodic check found no portal page");
        }

        self.idle_reminder_tick().await
    }

    /// Record the estimator inputs the live figures imply on the armed auto
    /// clock-out task, for diagnostics (`tasks` output, debug snapshot).
    async fn refresh_task_metadata(&self, snapshot: &AttendanceSnapshot) -> Result<()> {
        let Some(task) = self.store.get_task(keys::AUTO_CLOCKOUT).await? else {
            return Ok(());
        };
        let refreshed = task.with_metadata(TaskMetadata {
            effective_minutes: snapshot.effective_minutes,
            remaining_minutes: self.estimator.remaining(snapshot.effective_minutes),
        });
        self.store.put_task(&refreshed).await
    }

    /// Stop the early-departure cycle once the user resumed work or reached
    /// the target; otherwise recompute the remaining time and re-notify.
    async fn early_reminder_recheck(
        &self,
        status: &PortalStatus,
        snapshot: &AttendanceSnapshot,
    ) -> Result<()> {
        let Some(state) = self.store.get_reminder(ReminderKind::EarlyDeparture).await? else {
            return Ok(());
        };
        if !state.active {
            return Ok(());
        }

        if status.clocked_in || snapshot.effective_minutes >= self.config.required_minutes {
            info!("Early-departure condition cleared; stopping reminders");
            return self.stop_reminder(ReminderKind::EarlyDeparture).await;
        }

        let remaining = self.estimator.remaining(snapshot.effective_minutes);
        let mut updated = state;
        updated.remaining_minutes = Some(remaining);
        self.store.put_reminder(&updated).await?;

        self.notify_early(remaining).await
    }

    /// Early-departure alarm callback. Re-validates persisted state first;
    /// with no live figures available it re-notifies from the persisted
    /// remaining time instead of recomputing.
    async fn early_reminder_tick(&self) -> Result<()> {
        let Some(state) = self.store.get_reminder(ReminderKind::EarlyDeparture).await? else {
            debug!("Early reminder fired but cycle is stopped; ignoring");
            return Ok(());
        };
        if !state.active {
            return Ok(());
        }

        let page = self
            .locator
            .find_pages(&self.config.portal_url_pattern)
            .await?
            .into_iter()
            .next();

        match page {
            Some(page) => {
                let status = self.portal.get_status(&page).await?;
                let snapshot = self.portal.get_attendance(&page).await?;
                self.early_reminder_recheck(&status, &snapshot).await
            }
            None => {
                let remaining = state
                    .remaining_minutes
                    .unwrap_or(self.config.required_minutes);
                self.notify_early(remaining).await
            }
        }
    }

    /// Idle-reminder alarm callback: a pure liveness check against the
    /// persisted active flag, then a notification.
    async fn idle_reminder_tick(&self) -> Result<()> {
        match self.store.get_reminder(ReminderKind::PostClockOutIdle).await? {
            Some(state) if state.active => {
                self.notifier
                    .show(
                        Notification::new(
                            "Clock In Reminder",
                            "You are clocked out! Please clock in if you forgot!",
                        )
                        .with_priority(2),
                    )
                    .await
            }
            _ => Ok(()),
        }
    }

    async fn notify_early(&self, remaining: u32) -> Result<()> {
        self.notifier
            .show(
                Notification::new(
                    "Early Clock-out",
                    format!(
                        "You still need {} to reach your required hours.",
                        timeparse::format(remaining)
                    ),
                )
                .with_priority(2),
            )
            .await
    }

    async fn notify_auto_clock_out(&self) -> Result<()> {
        self.notifier
            .show(Notification::new(
                "Auto Clock-out",
                "You have been automatically clocked out after completing your required hours.",
            ))
            .await
    }
}

/// Drive the engine from a channel of fired alarm names until the channel
/// closes. Handler errors are logged and never stop the loop.
pub async fn run_alarm_loop(
    engine: Arc<ReconciliationEngine>,
    mut alarms: tokio::sync::mpsc::UnboundedReceiver<String>,
) {
    while let Some(name) = alarms.recv().await {
        if let Err(e) = engine.handle_alarm(&name).await {
            error!("Alarm handler for {} failed: {}", name, e);
        }
    }
    info!("Alarm channel closed; engine loop exiting");
}
