//! In-memory task store.

use super::{normalise_title, sort_for_listing, DailyCutoff, StoreError, TaskStore};
use crate::store::task::{Priority, Task, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Task store held entirely in memory.
///
/// Also the on-disk layout of [`super::JsonTaskStore`].
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MemoryTaskStore {
    tasks: Vec<Task>,
    #[serde(default)]
    archive: BTreeMap<String, Vec<Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from existing tasks (kept in the given order for ties).
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            archive: BTreeMap::new(),
        }
    }

    fn get_mut(&mut self, id: &TaskId) -> Result<&mut Task, StoreError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == *id)
            .ok_or(StoreError::NotFound(*id))
    }
}

impl TaskStore for MemoryTaskStore {
    fn create(
        &mut self,
        title: &str,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Result<Task, StoreError> {
        let title = normalise_title(title).ok_or(StoreError::EmptyTitle)?;
        let task = Task::new(&title, priority, now);
        self.tasks.push(task.clone());
        Ok(task)
    }

    fn list(&self) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.tasks.clone();
        sort_for_listing(&mut tasks);
        Ok(tasks)
    }

    fn set_completed(
        &mut self,
        id: &TaskId,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.get_mut(id)?.set_completed(completed, now);
        Ok(())
    }

    fn set_title(&mut self, id: &TaskId, title: &str) -> Result<(), StoreError> {
        let title = normalise_title(title).ok_or(StoreError::EmptyTitle)?;
        self.get_mut(id)?.title = title;
        Ok(())
    }

    fn touch_reminded(&mut self, id: &TaskId, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.get_mut(id)?.last_reminded_at = Some(at);
        Ok(())
    }

    fn delete(&mut self, id: &TaskId) -> Result<(), StoreError> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != *id);
        if self.tasks.len() == before {
            return Err(StoreError::NotFound(*id));
        }
        Ok(())
    }

    fn archive_and_purge(
        &mut self,
        cutoff: &DailyCutoff,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let boundary = cutoff.most_recent(now);
        let (outdated, current): (Vec<Task>, Vec<Task>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|t| t.created_at < boundary);
        self.tasks = current;

        let count = outdated.len();
        for task in outdated {
            let day = self.archive.entry(cutoff.date_key(task.created_at)).or_default();
            // Archived copies are write-once.
            if !day.iter().any(|archived| archived.id == task.id) {
                day.push(task);
            }
        }
        Ok(count)
    }

    fn list_archived(&self, date_key: &str) -> Result<Vec<Task>, StoreError> {
        Ok(self.archive.get(date_key).cloned().unwrap_or_default())
    }

    fn archived_date_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .archive
            .iter()
            .filter(|(_, tasks)| !tasks.is_empty())
            .map(|(key, _)| key.clone())
            .collect())
    }
}
