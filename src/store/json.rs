//! JSON file backed task store.

use super::{DailyCutoff, MemoryTaskStore, StoreError, TaskStore};
use crate::store::task::{Priority, Task, TaskId};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Task store persisted to a single JSON file.
///
/// The file is the only copy: every call reads it, and every mutation is
/// applied to the freshly read data and written back through a temp file
/// and a rename. Several handles (the running pet, CLI invocations) can
/// share one path without overwriting each other's changes, and a failed
/// write leaves nothing behind to be persisted later.
#[derive(Debug)]
pub struct JsonTaskStore {
    path: PathBuf,
}

impl JsonTaskStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<MemoryTaskStore, StoreError> {
        if !self.path.exists() {
            return Ok(MemoryTaskStore::new());
        }
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| StoreError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| StoreError::ParseError(e.to_string()))
    }

    fn save(&self, data: &MemoryTaskStore) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| StoreError::SerializeError(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| StoreError::IoError(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Read, apply `change`, write back.
    fn update<T>(
        &mut self,
        change: impl FnOnce(&mut MemoryTaskStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut data = self.load()?;
        let result = change(&mut data)?;
        self.save(&data)?;
        Ok(result)
    }
}

impl TaskStore for JsonTaskStore {
    fn create(
        &mut self,
        title: &str,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Result<Task, StoreError> {
        self.update(|data| data.create(title, priority, now))
    }

    fn list(&self) -> Result<Vec<Task>, StoreError> {
        self.load()?.list()
    }

    fn set_completed(
        &mut self,
        id: &TaskId,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update(|data| data.set_completed(id, completed, now))
    }

    fn set_title(&mut self, id: &TaskId, title: &str) -> Result<(), StoreError> {
        self.update(|data| data.set_title(id, title))
    }

    fn touch_reminded(&mut self, id: &TaskId, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.update(|data| data.touch_reminded(id, at))
    }

    fn delete(&mut self, id: &TaskId) -> Result<(), StoreError> {
        self.update(|data| data.delete(id))
    }

    fn archive_and_purge(
        &mut self,
        cutoff: &DailyCutoff,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut data = self.load()?;
        let count = data.archive_and_purge(cutoff, now)?;
        if count > 0 {
            self.save(&data)?;
        }
        Ok(count)
    }

    fn list_archived(&self, date_key: &str) -> Result<Vec<Task>, StoreError> {
        self.load()?.list_archived(date_key)
    }

    fn archived_date_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        self.load()?.archived_date_keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("cloudpet-store-test-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_roundtrip_through_file() {
        let path = temp_path("tasks.json");
        let now = Utc::now();

        let id = {
            let mut store = JsonTaskStore::open(&path).unwrap();
            let task = store.create("Buy milk", Priority::High, now).unwrap();
            store.touch_reminded(&task.id, now).unwrap();
            task.id
        };

        let reopened = JsonTaskStore::open(&path).unwrap();
        let tasks = reopened.list().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, id);
        assert_eq!(tasks[0].last_reminded_at, Some(now));
        assert!(!path.with_extension("json.tmp").exists());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = temp_path("tasks.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonTaskStore::open(&path),
            Err(StoreError::ParseError(_))
        ));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
    #[test]
    fn test_two_handles_keep_each_others_changes() {
        let path = temp_path("tasks.json");
        let now = Utc::now();

        let mut pet = JsonTaskStore::open(&path).unwrap();
        let mut cli = JsonTaskStore::open(&path).unwrap();

        let pet_task = pet.create("pet task", Priority::High, now).unwrap();
        let cli_task = cli.create("cli task", Priority::Low, now).unwrap();
        pet.touch_reminded(&pet_task.id, now).unwrap();

        let titles: Vec<String> = JsonTaskStore::open(&path)
            .unwrap()
            .list()
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["pet task", "cli task"]);

        // Each handle sees the other's writes.
        assert!(pet.list().unwrap().iter().any(|t| t.id == cli_task.id));
        cli.set_completed(&pet_task.id, true, now).unwrap();
        let seen = pet.list().unwrap();
        let stamped = seen.iter().find(|t| t.id == pet_task.id).unwrap();
        assert!(stamped.is_completed);
        assert_eq!(stamped.last_reminded_at, Some(now));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_failed_write_is_not_persisted_later() {
        let path = temp_path("tasks.json");
        let now = Utc::now();
        let mut store = JsonTaskStore::open(&path).unwrap();
        store.create("kept", Priority::Medium, now).unwrap();

        // A directory where the temp file goes makes the write fail.
        let tmp = path.with_extension("json.tmp");
        std::fs::create_dir_all(&tmp).unwrap();
        assert!(store.create("ghost", Priority::High, now).is_err());
        std::fs::remove_dir_all(&tmp).unwrap();

        store.create("real", Priority::Low, now).unwrap();
        let titles: Vec<String> = JsonTaskStore::open(&path)
            .unwrap()
            .list()
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["kept", "real"]);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
