//! Durable persistence: record types, the key-value collaborator seam, and
//! the typed task store built on top of it.

pub mod kv;
pub mod records;
pub mod task_store;

pub use kv::{KeyValueStore, MemoryStore, SqliteStore};
pub use records::{
    keys, FailedTaskRecord, PunchDirection, ReminderKind, ReminderState, ScheduledTask,
    TaskKind, TaskMetadata, TaskStatus,
};
pub use task_store::TaskStore;
