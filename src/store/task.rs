//! Todo item types.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Task priority. Ordering follows severity: `High < Medium < Low`.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Opaque task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short prefix used in CLI listings.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(TaskId)
    }
}

/// A single todo item with reminder bookkeeping.
///
/// `completed_at` is set exactly when `is_completed` is true; use
/// [`Task::set_completed`] to keep the two in step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub priority: Priority,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_reminded_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new open task. The title is trimmed; callers validate it
    /// is non-empty.
    pub fn new(title: &str, priority: Priority, now: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::new(),
            title: title.trim().to_string(),
            priority,
            is_completed: false,
            created_at: now,
            completed_at: None,
            last_reminded_at: None,
        }
    }

    /// Mark the task complete or open again.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        self.is_completed = completed;
        self.completed_at = if completed { Some(now) } else { None };
    }

    /// Whether the task still needs doing.
    pub fn is_pending(&self) -> bool {
        !self.is_completed
    }
}

/// Validate and normalise a task title.
pub fn normalise_title(title: &str) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_completion_invariant() {
        let now = Utc::now();
        let mut task = Task::new("  Buy milk ", Priority::High, now);
        assert_eq!(task.title, "Buy milk");
        assert!(task.completed_at.is_none());

        task.set_completed(true, now);
        assert!(task.is_completed);
        assert_eq!(task.completed_at, Some(now));

        task.set_completed(false, now);
        assert!(task.is_pending());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_priority_serde() {
        let json = serde_json::to_string(&Priority::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        let parsed: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(parsed, Priority::Low);
    }

    #[test]
    fn test_normalise_title() {
        assert_eq!(normalise_title("  a "), Some("a".to_string()));
        assert_eq!(normalise_title("   "), None);
    }
}
