//! Tokio-backed timer service.
//!
//! Each armed timer is a spawned sleep task that pushes its name onto an
//! mpsc channel when it fires; the daemon loop drains the channel and hands
//! the names to the engine. A generation counter guards the map cleanup so
//! a timer that fires while its name is being re-armed cannot remove the
//! replacement entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::alarm::{AlarmInfo, TimerService};
use crate::error::{PunchrError, Result};

struct ArmedTimer {
    info: AlarmInfo,
    generation: u64,
    handle: JoinHandle<()>,
}

type TimerMap = Arc<Mutex<HashMap<String, ArmedTimer>>>;

/// Timer service driven by spawned tokio tasks.
pub struct TokioTimerService {
    timers: TimerMap,
    tx: mpsc::UnboundedSender<String>,
    next_generation: Mutex<u64>,
}

impl TokioTimerService {
    /// Create the service and the channel on which fired timer names arrive.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            tx,
            next_generation: Mutex::new(0),
        };
        (service, rx)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, ArmedTimer>>> {
        self.timers
            .lock()
            .map_err(|_| PunchrError::InvalidState("timer map poisoned".to_string()))
    }

    fn bump_generation(&self) -> Result<u64> {
        let mut next = self
            .next_generation
            .lock()
            .map_err(|_| PunchrError::InvalidState("timer generation poisoned".to_string()))?;
        *next += 1;
        Ok(*next)
    }
}

#[async_trait]
impl TimerService for TokioTimerService {
    async fn create(&self, name: &str, delay_minutes: f64, period_minutes: Option<f64>) -> Result<()> {
        let generation = self.bump_generation()?;
        let delay = StdDuration::from_secs_f64(delay_minutes.max(0.0) * 60.0);

        let timers = Arc::clone(&self.timers);
        let tx = self.tx.clone();
        let timer_name = name.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            match period_minutes {
                None => {
                    // One-shot: drop our own map entry, unless a re-arm
                    // already replaced it.
                    if let Ok(mut map) = timers.lock() {
                        if map.get(&timer_name).map(|t| t.generation) == Some(generation) {
                            map.remove(&timer_name);
                        }
                    }
                    let _ = tx.send(timer_name);
                }
                Some(period) => {
                    let period = StdDuration::from_secs_f64(period.max(0.0) * 60.0);
                    loop {
                        let _ = tx.send(timer_name.clone());
                        tokio::time::sleep(period).await;
                    }
                }
            }
        });

        let info = AlarmInfo {
            name: name.to_string(),
            scheduled_at: Utc::now() + Duration::seconds((delay_minutes * 60.0) as i64),
            period_minutes,
        };

        let mut map = self.lock()?;
        if let Some(previous) = map.insert(
            name.to_string(),
            ArmedTimer { info, generation, handle },
        ) {
            debug!("Replacing armed timer {}", name);
            previous.handle.abort();
        }

        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<bool> {
        match self.lock()?.remove(name) {
            Some(timer) => {
                timer.handle.abort();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, name: &str) -> Result<Option<AlarmInfo>> {
        Ok(self.lock()?.get(name).map(|t| t.info.clone()))
    }

    async fn list_all(&self) -> Result<Vec<AlarmInfo>> {
        let mut all: Vec<AlarmInfo> = self.lock()?.values().map(|t| t.info.clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}
