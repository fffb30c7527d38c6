//! Persistent stores for todos and settings.
//!
//! The [`TaskStore`] trait is the single source of truth for task data.
//! Two implementations are provided: [`MemoryTaskStore`] for tests and
//! embedding, and [`JsonTaskStore`], which re-reads its JSON file on every
//! call and rewrites it atomically after every mutation.

pub mod archive;
pub mod json;
pub mod memory;
pub mod settings;
pub mod task;

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

pub use archive::{date_key_of, parse_timezone, DailyCutoff};
pub use json::JsonTaskStore;
pub use memory::MemoryTaskStore;
pub use settings::{JsonSettingsStore, Settings, SettingsStore};
pub use task::{normalise_title, Priority, Task, TaskId};

/// Durable record of todo items.
pub trait TaskStore {
    /// Create a new open task.
    fn create(&mut self, title: &str, priority: Priority, now: DateTime<Utc>)
        -> Result<Task, StoreError>;

    /// All active tasks, highest priority first, then most recent first.
    fn list(&self) -> Result<Vec<Task>, StoreError>;

    /// Set the completion flag (and completion timestamp) of a task.
    fn set_completed(
        &mut self,
        id: &TaskId,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Replace a task's title.
    fn set_title(&mut self, id: &TaskId, title: &str) -> Result<(), StoreError>;

    /// Record that a reminder for the task was emitted at `at`.
    fn touch_reminded(&mut self, id: &TaskId, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Delete a task.
    fn delete(&mut self, id: &TaskId) -> Result<(), StoreError>;

    /// Archive every task created before the most recent cutoff and remove
    /// it from the active list. Returns the number of archived tasks.
    fn archive_and_purge(
        &mut self,
        cutoff: &DailyCutoff,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    /// Archived tasks for a `YYYY-MM-DD` key, in store order.
    fn list_archived(&self, date_key: &str) -> Result<Vec<Task>, StoreError>;

    /// Every date key that has archived tasks.
    fn archived_date_keys(&self) -> Result<BTreeSet<String>, StoreError>;
}

/// Store errors.
#[derive(Debug)]
pub enum StoreError {
    /// No task with this id
    NotFound(TaskId),
    /// Title is empty after trimming
    EmptyTitle,
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "No task with id {id}"),
            StoreError::EmptyTitle => write!(f, "Task title must not be empty"),
            StoreError::IoError(e) => write!(f, "IO error: {e}"),
            StoreError::ParseError(e) => write!(f, "Parse error: {e}"),
            StoreError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Sort tasks the way [`TaskStore::list`] returns them.
pub fn sort_for_listing(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// Resolve a full id or a unique id prefix against a task list.
pub fn resolve_id(tasks: &[Task], needle: &str) -> Option<TaskId> {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    let mut matches = tasks
        .iter()
        .filter(|t| t.id.to_string().starts_with(&needle));
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first.id)
}
