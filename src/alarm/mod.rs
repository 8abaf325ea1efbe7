//! Named timer scheduling over the external timer collaborator.
//!
//! The host timer service (browser alarms in the original deployment) fires
//! named callbacks with minute-granularity delays and enforces a minimum
//! delay floor. [`AlarmScheduler`] layers the two rules the engine relies
//! on: delays below the floor are clamped up rather than rejected, and
//! arming an already-armed name first cancels the existing timer so exactly
//! one timer ever exists per logical name.

pub mod timers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PunchrError, Result};

pub use timers::TokioTimerService;

/// Minimum delay the timer collaborator will accept, in minutes.
pub const MIN_DELAY_MINUTES: f64 = 1.0;

/// An armed timer as reported by the timer service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmInfo {
    pub name: String,
    pub scheduled_at: DateTime<Utc>,
    pub period_minutes: Option<f64>,
}

/// External timer collaborator: creates, queries and cancels named timers.
#[async_trait]
pub trait TimerService: Send + Sync {
    /// Arm a timer; replaces any existing timer with the same name.
    async fn create(&self, name: &str, delay_minutes: f64, period_minutes: Option<f64>) -> Result<()>;
    /// Cancel a timer, reporting whether one was armed.
    async fn clear(&self, name: &str) -> Result<bool>;
    async fn get(&self, name: &str) -> Result<Option<AlarmInfo>>;
    async fn list_all(&self) -> Result<Vec<AlarmInfo>>;
}

/// Policy layer over the timer collaborator.
#[derive(Clone)]
pub struct AlarmScheduler {
    timers: Arc<dyn TimerService>,
}

impl AlarmScheduler {
    pub fn new(timers: Arc<dyn TimerService>) -> Self {
        Self { timers }
    }

    /// Arm a one-shot timer after the given delay, clamped up to the
    /// collaborator's minimum.
    pub async fn arm_one_shot(&self, name: &str, delay_minutes: f64) -> Result<()> {
        self.timers.clear(name).await?;
        self.timers
            .create(name, delay_minutes.max(MIN_DELAY_MINUTES), None)
            .await
    }

    /// Arm a one-shot timer to fire at an absolute time.
    ///
    /// The caller rejects past schedules before getting here; a `fire_at`
    /// at or before `now` still arms at the minimum delay.
    pub async fn arm_at(&self, name: &str, fire_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
        let delay = (fire_at - now).num_seconds() as f64 / 60.0;
        self.arm_one_shot(name, delay).await
    }

    /// Arm a periodic timer: first firing after `delay_minutes`, then every
    /// `period_minutes`.
    pub async fn arm_periodic(&self, name: &str, delay_minutes: f64, period_minutes: f64) -> Result<()> {
        self.timers.clear(name).await?;
        self.timers
            .create(name, delay_minutes.max(MIN_DELAY_MINUTES), Some(period_minutes))
            .await
    }

    pub async fn cancel(&self, name: &str) -> Result<bool> {
        self.timers.clear(name).await
    }

    pub async fn query(&self, name: &str) -> Result<Option<AlarmInfo>> {
        self.timers.get(name).await
    }

    pub async fn list_all(&self) -> Result<Vec<AlarmInfo>> {
        self.timers.list_all().await
    }
}

/// In-memory timer service that never fires on its own.
///
/// Records what was armed so tests (and the CLI debug path) can inspect it;
/// the test harness invokes engine handlers directly instead of waiting for
/// real timers.
#[derive(Debug, Default)]
pub struct ManualTimerService {
    armed: Mutex<HashMap<String, ManualTimer>>,
}

/// What a [`ManualTimerService`] remembers about an armed timer.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualTimer {
    pub delay_minutes: f64,
    pub period_minutes: Option<f64>,
    pub scheduled_at: DateTime<Utc>,
}

impl ManualTimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// The armed timer under this name, if any.
    pub fn armed(&self, name: &str) -> Option<ManualTimer> {
        self.armed.lock().ok()?.get(name).cloned()
    }

    pub fn armed_count(&self) -> usize {
        self.armed.lock().map(|m| m.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, ManualTimer>>> {
        self.armed
            .lock()
            .map_err(|_| PunchrError::InvalidState("manual timers poisoned".to_string()))
    }
}

#[async_trait]
impl TimerService for ManualTimerService {
    async fn create(&self, name: &str, delay_minutes: f64, period_minutes: Option<f64>) -> Result<()> {
        let timer = ManualTimer {
            delay_minutes,
            period_minutes,
            scheduled_at: Utc::now() + Duration::seconds((delay_minutes * 60.0) as i64),
        };
        self.lock()?.insert(name.to_string(), timer);
        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<bool> {
        Ok(self.lock()?.remove(name).is_some())
    }

    async fn get(&self, name: &str) -> Result<Option<AlarmInfo>> {
        Ok(self.lock()?.get(name).map(|t| AlarmInfo {
            name: name.to_string(),
            scheduled_at: t.scheduled_at,
            period_minutes: t.period_minutes,
        }))
    }

    async fn list_all(&self) -> Result<Vec<AlarmInfo>> {
        let mut all: Vec<AlarmInfo> = self
            .lock()?
            .iter()
            .map(|(name, t)| AlarmInfo {
                name: name.clone(),
                scheduled_at: t.scheduled_at,
                period_minutes: t.period_minutes,
            })
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> (AlarmScheduler, Arc<ManualTimerService>) {
        let timers = Arc::new(ManualTimerService::new());
        (AlarmScheduler::new(timers.clone()), timers)
    }

    #[tokio::test]
    async fn test_arm_one_shot_records_delay() {
        let (scheduler, timers) = scheduler();
        scheduler.arm_one_shot("auto-clockout", 481.0).await.unwrap();

        let timer = timers.armed("auto-clockout").unwrap();
        assert_eq!(timer.delay_minutes, 481.0);
        assert!(timer.period_minutes.is_none());
    }

    #[tokio::test]
    async fn test_short_delay_clamped_to_minimum() {
        let (scheduler, timers) = scheduler();
        scheduler.arm_one_shot("auto-clockout", 0.2).await.unwrap();
        assert_eq!(timers.armed("auto-clockout").unwrap().delay_minutes, MIN_DELAY_MINUTES);

        scheduler.arm_one_shot("auto-clockout", -5.0).await.unwrap();
        assert_eq!(timers.armed("auto-clockout").unwrap().delay_minutes, MIN_DELAY_MINUTES);
    }

    #[tokio::test]
    async fn test_arm_at_computes_delay_from_now() {
        let (scheduler, timers) = scheduler();
        let now = Utc::now();
        scheduler
            .arm_at("task-1", now + Duration::minutes(90), now)
            .await
            .unwrap();
        assert_eq!(timers.armed("task-1").unwrap().delay_minutes, 90.0);
    }

    #[tokio::test]
    async fn test_rearm_leaves_exactly_one_timer() {
        let (scheduler, timers) = scheduler();
        scheduler.arm_one_shot("auto-clockout", 60.0).await.unwrap();
        scheduler.arm_one_shot("auto-clockout", 120.0).await.unwrap();

        assert_eq!(timers.armed_count(), 1);
        assert_eq!(timers.armed("auto-clockout").unwrap().delay_minutes, 120.0);
    }

    #[tokio::test]
    async fn test_periodic_arming() {
        let (scheduler, timers) = scheduler();
        scheduler.arm_periodic("idle-reminder", 2.0, 2.0).await.unwrap();

        let timer = timers.armed("idle-reminder").unwrap();
        assert_eq!(timer.delay_minutes, 2.0);
        assert_eq!(timer.period_minutes, Some(2.0));
    }

    #[tokio::test]
    async fn test_cancel_reports_whether_armed() {
        let (scheduler, _timers) = scheduler();
        assert!(!scheduler.cancel("idle-reminder").await.unwrap());

        scheduler.arm_periodic("idle-reminder", 2.0, 2.0).await.unwrap();
        assert!(scheduler.cancel("idle-reminder").await.unwrap());
        assert!(!scheduler.cancel("idle-reminder").await.unwrap());
    }

    #[tokio::test]
    async fn test_query_and_list() {
        let (scheduler, _timers) = scheduler();
        assert!(scheduler.query("task-1").await.unwrap().is_none());

        scheduler.arm_one_shot("task-1", 30.0).await.unwrap();
        scheduler.arm_periodic("periodic-check", 5.0, 5.0).await.unwrap();

        let info = scheduler.query("task-1").await.unwrap().unwrap();
        assert_eq!(info.name, "task-1");
        assert!(info.period_minutes.is_none());

        let all = scheduler.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "periodic-check");
    }
}
