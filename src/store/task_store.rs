//! Typed persistence layer over the key-value collaborator.
//!
//! Wraps the raw [`KeyValueStore`] with record-aware operations: scheduled
//! tasks, reminder state, guard flags, and the failed-task log. Corrupt
//! records are logged and treated as absent rather than failing the caller;
//! the worst case is re-deriving state from the live portal on the next
//! tick.

use std::sync::Arc;

use log::warn;
use serde_json::Value;

use crate::error::Result;
use crate::store::kv::KeyValueStore;
use crate::store::records::{keys, FailedTaskRecord, ReminderKind, ReminderState, ScheduledTask};

/// Record-typed facade over the durable key-value store.
#[derive(Clone)]
pub struct TaskStore {
    kv: Arc<dyn KeyValueStore>,
}

impl TaskStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Upsert a task under its own key.
    pub async fn put_task(&self, task: &ScheduledTask) -> Result<()> {
        self.kv.set(&task.key(), serde_json::to_value(task)?).await
    }

    /// Fetch a task by key. Corrupt entries read back as absent.
    pub async fn get_task(&self, key: &str) -> Result<Option<ScheduledTask>> {
        Ok(self.kv.get(key).await?.and_then(|v| decode(key, v)))
    }

    /// Remove a record. Idempotent: removing an absent key is not an error.
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.kv.remove(key).await
    }

    pub async fn remove_all(&self, remove_keys: &[&str]) -> Result<()> {
        for key in remove_keys {
            self.kv.remove(key).await?;
        }
        Ok(())
    }

    /// All tasks whose key starts with the given prefix, in key order.
    pub async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, ScheduledTask)>> {
        let mut tasks = Vec::new();
        for (key, value) in self.kv.entries().await? {
            if !key.starts_with(prefix) {
                continue;
            }
            if let Some(task) = decode(&key, value) {
                tasks.push((key, task));
            }
        }
        Ok(tasks)
    }

    /// All active manual punch tasks plus the auto clock-out, if armed.
    pub async fn list_tasks(&self) -> Result<Vec<ScheduledTask>> {
        let mut tasks: Vec<ScheduledTask> = self
            .list_by_prefix(keys::TASK_PREFIX)
            .await?
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        if let Some(auto) = self.get_task(keys::AUTO_CLOCKOUT).await? {
            tasks.push(auto);
        }
        Ok(tasks)
    }

    pub async fn put_reminder(&self, state: &ReminderState) -> Result<()> {
        self.kv
            .set(state.kind.key(), serde_json::to_value(state)?)
            .await
    }

    pub async fn get_reminder(&self, kind: ReminderKind) -> Result<Option<ReminderState>> {
        let key = kind.key();
        Ok(self.kv.get(key).await?.and_then(|v| decode(key, v)))
    }

    pub async fn clear_reminder(&self, kind: ReminderKind) -> Result<()> {
        self.kv.remove(kind.key()).await
    }

    /// Read a boolean guard flag; absent means unset.
    pub async fn flag(&self, key: &str) -> Result<bool> {
        Ok(self
            .kv
            .get(key)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    pub async fn set_flag(&self, key: &str, value: bool) -> Result<()> {
        if value {
            self.kv.set(key, Value::Bool(true)).await
        } else {
            self.kv.remove(key).await
        }
    }

    /// Append to the failed-task log. The log is append-only and read back
    /// only for display.
    pub async fn append_failed(&self, record: FailedTaskRecord) -> Result<()> {
        let mut log = self.failed_tasks().await?;
        log.push(record);
        self.kv
            .set(keys::FAILED_TASKS, serde_json::to_value(&log)?)
            .await
    }

    pub async fn failed_tasks(&self) -> Result<Vec<FailedTaskRecord>> {
        Ok(self
            .kv
            .get(keys::FAILED_TASKS)
            .await?
            .and_then(|v| decode(keys::FAILED_TASKS, v))
            .unwrap_or_default())
    }

    /// Raw contents, for the debug snapshot.
    pub async fn entries(&self) -> Result<Vec<(String, Value)>> {
        self.kv.entries().await
    }
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Discarding corrupt record at {}: {}", key, e);
            None
        }
    }
}
