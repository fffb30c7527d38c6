//! Activity log.
//!
//! Counts what the pet did (reminders, panels, messages, todos, weather
//! refreshes, archived tasks) so `cloudpet status` can report it. Only
//! counters are kept; no task titles or message text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Activity counters for the current and previous sessions.
#[derive(Debug)]
pub struct ActivityLog {
    reminders_emitted: AtomicU64,
    panels_shown: AtomicU64,
    messages_processed: AtomicU64,
    todos_created: AtomicU64,
    weather_refreshes: AtomicU64,
    tasks_archived: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            reminders_emitted: AtomicU64::new(0),
            panels_shown: AtomicU64::new(0),
            messages_processed: AtomicU64::new(0),
            todos_created: AtomicU64::new(0),
            weather_refreshes: AtomicU64::new(0),
            tasks_archived: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that continues the counts stored at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous activity stats: {}", e);
        }

        log
    }

    pub fn record_reminder(&self) {
        self.reminders_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panel_shown(&self) {
        self.panels_shown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_todo_created(&self) {
        self.todos_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_weather_refresh(&self) {
        self.weather_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_archived(&self, count: u64) {
        self.tasks_archived.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> ActivityStats {
        ActivityStats {
            reminders_emitted: self.reminders_emitted.load(Ordering::Relaxed),
            panels_shown: self.panels_shown.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            todos_created: self.todos_created.load(Ordering::Relaxed),
            weather_refreshes: self.weather_refreshes.load(Ordering::Relaxed),
            tasks_archived: self.tasks_archived.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Activity:\n\
             - Reminders emitted: {}\n\
             - Panels shown: {}\n\
             - Messages processed: {}\n\
             - Todos created: {}\n\
             - Weather refreshes: {}\n\
             - Tasks archived: {}\n\
             - Session duration: {} seconds",
            stats.reminders_emitted,
            stats.panels_shown,
            stats.messages_processed,
            stats.todos_created,
            stats.weather_refreshes,
            stats.tasks_archived,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                reminders_emitted: stats.reminders_emitted,
                panels_shown: stats.panels_shown,
                messages_processed: stats.messages_processed,
                todos_created: stats.todos_created,
                weather_refreshes: stats.weather_refreshes,
                tasks_archived: stats.tasks_archived,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.reminders_emitted
                    .store(persisted.reminders_emitted, Ordering::Relaxed);
                self.panels_shown
                    .store(persisted.panels_shown, Ordering::Relaxed);
                self.messages_processed
                    .store(persisted.messages_processed, Ordering::Relaxed);
                self.todos_created
                    .store(persisted.todos_created, Ordering::Relaxed);
                self.weather_refreshes
                    .store(persisted.weather_refreshes, Ordering::Relaxed);
                self.tasks_archived
                    .store(persisted.tasks_archived, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.reminders_emitted,
            &self.panels_shown,
            &self.messages_processed,
            &self.todos_created,
            &self.weather_refreshes,
            &self.tasks_archived,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of activity statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub reminders_emitted: u64,
    pub panels_shown: u64,
    pub messages_processed: u64,
    pub todos_created: u64,
    pub weather_refreshes: u64,
    pub tasks_archived: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(default)]
    reminders_emitted: u64,
    #[serde(default)]
    panels_shown: u64,
    #[serde(default)]
    messages_processed: u64,
    #[serde(default)]
    todos_created: u64,
    #[serde(default)]
    weather_refreshes: u64,
    #[serde(default)]
    tasks_archived: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared activity log.
pub type SharedActivityLog = Arc<ActivityLog>;

pub fn create_shared_log() -> SharedActivityLog {
    Arc::new(ActivityLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedActivityLog {
    Arc::new(ActivityLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_counting() {
        let log = ActivityLog::new();

        log.record_reminder();
        log.record_reminder();
        log.record_panel_shown();
        log.record_archived(3);

        let stats = log.stats();
        assert_eq!(stats.reminders_emitted, 2);
        assert_eq!(stats.panels_shown, 1);
        assert_eq!(stats.tasks_archived, 3);
        assert_eq!(stats.messages_processed, 0);
    }

    #[test]
    fn test_activity_reset() {
        let log = ActivityLog::new();
        log.record_message();
        log.record_todo_created();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.messages_processed, 0);
        assert_eq!(stats.todos_created, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir().join(format!("cloudpet-activity-{}.json", uuid::Uuid::new_v4()));

        let log = ActivityLog::with_persistence(path.clone());
        log.record_weather_refresh();
        log.record_reminder();
        log.save().unwrap();

        let reloaded = ActivityLog::with_persistence(path.clone());
        let stats = reloaded.stats();
        assert_eq!(stats.weather_refreshes, 1);
        assert_eq!(stats.reminders_emitted, 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_summary_format() {
        let summary = ActivityLog::new().summary();
        assert!(summary.contains("Reminders emitted"));
        assert!(summary.contains("Panels shown"));
        assert!(summary.contains("Session duration"));
    }
}
