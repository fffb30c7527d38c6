//! Reminder scheduler.
//!
//! Every cycle picks at most one incomplete task to nag about: the most
//! severe eligible one, ties broken by store order. A task is eligible
//! when it was never reminded, or when its cooldown has passed since the
//! last reminder. The interval is re-read on every cycle, so a settings
//! change applies from the next cycle without touching the armed timer.

use crate::core::timer::{PetTimers, TimerEvent, TimerId};
use crate::store::{Task, TaskStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a reminded task stays ineligible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cooldown {
    /// Same as the current reminder interval
    #[default]
    FollowInterval,
    /// Fixed number of minutes, independent of the interval
    Fixed(u32),
}

impl Cooldown {
    /// Build from an optional configured cooldown (minutes).
    pub fn from_minutes(minutes: Option<u32>) -> Self {
        match minutes {
            Some(m) if m > 0 => Cooldown::Fixed(m),
            _ => Cooldown::FollowInterval,
        }
    }

    /// Effective cooldown for a given interval.
    pub fn duration(self, interval_min: u32) -> Duration {
        match self {
            Cooldown::FollowInterval => Duration::minutes(i64::from(interval_min)),
            Cooldown::Fixed(m) => Duration::minutes(i64::from(m)),
        }
    }
}

/// Whether a task may be reminded at `now`.
pub fn is_eligible(task: &Task, now: DateTime<Utc>, cooldown: Duration) -> bool {
    if task.is_completed {
        return false;
    }
    match task.last_reminded_at {
        None => true,
        Some(at) => now - at >= cooldown,
    }
}

/// Pick the reminder target from a store-ordered task list.
pub fn select_target(tasks: &[Task], now: DateTime<Utc>, cooldown: Duration) -> Option<&Task> {
    // min_by_key keeps the first of equal keys.
    tasks
        .iter()
        .filter(|t| is_eligible(t, now, cooldown))
        .min_by_key(|t| t.priority)
}

/// Periodic reminder driver.
#[derive(Debug, Default)]
pub struct ReminderScheduler {
    timer: Option<TimerId>,
    cooldown: Cooldown,
}

impl ReminderScheduler {
    pub fn new(cooldown: Cooldown) -> Self {
        Self {
            timer: None,
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Cooldown {
        self.cooldown
    }

    pub fn set_cooldown(&mut self, cooldown: Cooldown) {
        self.cooldown = cooldown;
    }

    /// Arm the first cycle one interval from `now`. Restarts if running.
    pub fn start(&mut self, timers: &mut PetTimers, now: DateTime<Utc>, interval_min: u32) {
        self.stop(timers);
        self.arm(timers, now, interval_min);
        tracing::info!("Reminder scheduler started (every {} min)", interval_min.max(1));
    }

    /// Cancel the pending cycle. No further cycles fire until `start`.
    pub fn stop(&mut self, timers: &mut PetTimers) {
        if let Some(id) = self.timer.take() {
            timers.cancel(id);
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Deadline of the next cycle.
    pub fn next_cycle(&self, timers: &PetTimers) -> Option<DateTime<Utc>> {
        self.timer.and_then(|id| timers.deadline_of(id))
    }

    /// Run one cycle and reschedule.
    ///
    /// Returns the task to remind about, already stamped with
    /// `last_reminded_at = now`. Store failures are logged; the cycle is
    /// always rescheduled with the interval as of this call.
    pub fn on_cycle(
        &mut self,
        fired: TimerId,
        timers: &mut PetTimers,
        store: &mut dyn TaskStore,
        now: DateTime<Utc>,
        interval_min: u32,
    ) -> Option<Task> {
        if self.timer != Some(fired) {
            return None;
        }
        self.timer = None;

        let target = self.pick(store, now, interval_min);
        self.arm(timers, now, interval_min);
        target
    }

    fn pick(
        &self,
        store: &mut dyn TaskStore,
        now: DateTime<Utc>,
        interval_min: u32,
    ) -> Option<Task> {
        let tasks = match store.list() {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!("Reminder cycle skipped, task list unavailable: {}", e);
                return None;
            }
        };

        let cooldown = self.cooldown.duration(interval_min);
        let mut target = select_target(&tasks, now, cooldown)?.clone();

        if let Err(e) = store.touch_reminded(&target.id, now) {
            tracing::warn!("Failed to record reminder for {}: {}", target.id.short(), e);
        }
        target.last_reminded_at = Some(now);

        tracing::info!("Reminding about '{}' ({})", target.title, target.priority);
        Some(target)
    }

    fn arm(&mut self, timers: &mut PetTimers, now: DateTime<Utc>, interval_min: u32) {
        let delay = Duration::minutes(i64::from(interval_min.max(1)));
        self.timer = Some(timers.schedule(now, delay, TimerEvent::ReminderCycle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timer::TimerQueue;
    use crate::store::{MemoryTaskStore, Priority, StoreError, TaskId};
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    /// Fire the next due reminder cycle, if any.
    fn fire(
        scheduler: &mut ReminderScheduler,
        timers: &mut PetTimers,
        store: &mut dyn TaskStore,
        now: DateTime<Utc>,
        interval: u32,
    ) -> Option<Task> {
        let fired = timers.pop_due(now)?;
        assert_eq!(fired.event, TimerEvent::ReminderCycle);
        scheduler.on_cycle(fired.id, timers, store, fired.deadline, interval)
    }

    fn task(title: &str, priority: Priority, created: DateTime<Utc>) -> Task {
        Task::new(title, priority, created)
    }

    #[test]
    fn test_first_cycle_picks_most_severe() {
        for (priorities, expected) in [
            (vec![Priority::Low, Priority::Medium, Priority::High], "high"),
            (vec![Priority::Low, Priority::Medium], "medium"),
            (vec![Priority::Low], "low"),
        ] {
            let tasks: Vec<Task> = priorities
                .iter()
                .map(|p| task(p.as_str(), *p, t0()))
                .collect();
            let mut store = MemoryTaskStore::with_tasks(tasks);
            let mut timers = TimerQueue::new();
            let mut scheduler = ReminderScheduler::default();

            scheduler.start(&mut timers, t0(), 30);
            let reminded = fire(&mut scheduler, &mut timers, &mut store, t0() + Duration::minutes(30), 30);
            assert_eq!(reminded.unwrap().title, expected);
        }
    }

    #[test]
    fn test_only_target_is_stamped() {
        let high = task("high", Priority::High, t0());
        let medium = task("medium", Priority::Medium, t0());
        let mut store = MemoryTaskStore::with_tasks(vec![medium.clone(), high.clone()]);
        let mut timers = TimerQueue::new();
        let mut scheduler = ReminderScheduler::default();

        scheduler.start(&mut timers, t0(), 30);
        let at = t0() + Duration::minutes(30);
        let reminded = fire(&mut scheduler, &mut timers, &mut store, at, 30).unwrap();
        assert_eq!(reminded.id, high.id);
        assert_eq!(reminded.last_reminded_at, Some(at));

        let listed = store.list().unwrap();
        let high_now = listed.iter().find(|t| t.id == high.id).unwrap();
        let medium_now = listed.iter().find(|t| t.id == medium.id).unwrap();
        assert_eq!(high_now.last_reminded_at, Some(at));
        assert_eq!(medium_now.last_reminded_at, None);
    }

    #[test]
    fn test_cooldown_blocks_until_interval_elapsed() {
        let mut t = task("t", Priority::High, t0());
        t.last_reminded_at = Some(t0());
        let cooldown = Duration::minutes(30);

        assert!(!is_eligible(&t, t0() + Duration::minutes(29), cooldown));
        assert!(!is_eligible(&t, t0() + Duration::minutes(30) - Duration::seconds(1), cooldown));
        assert!(is_eligible(&t, t0() + Duration::minutes(30), cooldown));
    }

    #[test]
    fn test_completed_tasks_are_never_eligible() {
        let mut t = task("t", Priority::High, t0());
        t.set_completed(true, t0());
        assert!(!is_eligible(&t, t0() + Duration::days(1), Duration::zero()));
        assert!(select_target(&[t], t0(), Duration::zero()).is_none());
    }

    #[test]
    fn test_ties_keep_store_order() {
        let first = task("first", Priority::Medium, t0());
        let second = task("second", Priority::Medium, t0());
        let tasks = vec![first.clone(), second];
        let target = select_target(&tasks, t0(), Duration::minutes(60)).unwrap();
        assert_eq!(target.id, first.id);
    }

    #[test]
    fn test_buy_milk_scenario() {
        let created = t0() - Duration::hours(1);
        let milk = task("Buy milk", Priority::High, created);
        let email = task("Email boss", Priority::Medium, created);
        let mut store = MemoryTaskStore::with_tasks(vec![milk.clone(), email.clone()]);
        let mut timers = TimerQueue::new();
        let mut scheduler = ReminderScheduler::default();
        scheduler.start(&mut timers, t0(), 30);

        let first = fire(&mut scheduler, &mut timers, &mut store, t0() + Duration::minutes(30), 30);
        assert_eq!(first.unwrap().title, "Buy milk");

        // Still open: cooldown (30 min) has elapsed, so milk again.
        let second = fire(&mut scheduler, &mut timers, &mut store, t0() + Duration::minutes(60), 30);
        assert_eq!(second.unwrap().title, "Buy milk");

        store
            .set_completed(&milk.id, true, t0() + Duration::minutes(70))
            .unwrap();
        let third = fire(&mut scheduler, &mut timers, &mut store, t0() + Duration::minutes(90), 30);
        assert_eq!(third.unwrap().title, "Email boss");
    }

    #[test]
    fn test_interval_change_applies_next_cycle() {
        let mut store = MemoryTaskStore::with_tasks(vec![task("t", Priority::High, t0())]);
        let mut timers = TimerQueue::new();
        let mut scheduler = ReminderScheduler::default();
        scheduler.start(&mut timers, t0(), 60);

        // Interval drops to 30 at t0+10; the in-flight timer still fires at +60.
        assert_eq!(scheduler.next_cycle(&timers), Some(t0() + Duration::minutes(60)));
        assert!(timers.pop_due(t0() + Duration::minutes(30)).is_none());

        let reminded = fire(&mut scheduler, &mut timers, &mut store, t0() + Duration::minutes(60), 30);
        assert!(reminded.is_some());
        assert_eq!(scheduler.next_cycle(&timers), Some(t0() + Duration::minutes(90)));
    }

    #[test]
    fn test_stop_prevents_firing() {
        let mut store = MemoryTaskStore::with_tasks(vec![task("t", Priority::High, t0())]);
        let mut timers = TimerQueue::new();
        let mut scheduler = ReminderScheduler::default();
        scheduler.start(&mut timers, t0(), 30);
        scheduler.stop(&mut timers);
        assert!(!scheduler.is_running());
        assert!(fire(&mut scheduler, &mut timers, &mut store, t0() + Duration::hours(5), 30).is_none());
    }

    #[test]
    fn test_fixed_cooldown_decoupled_from_interval() {
        let cooldown = Cooldown::from_minutes(Some(120));
        assert_eq!(cooldown.duration(30), Duration::minutes(120));
        assert_eq!(Cooldown::from_minutes(Some(0)), Cooldown::FollowInterval);
        assert_eq!(Cooldown::from_minutes(None).duration(45), Duration::minutes(45));

        let mut store = MemoryTaskStore::with_tasks(vec![task("t", Priority::High, t0())]);
        let mut timers = TimerQueue::new();
        let mut scheduler = ReminderScheduler::new(cooldown);
        scheduler.start(&mut timers, t0(), 30);

        assert!(fire(&mut scheduler, &mut timers, &mut store, t0() + Duration::minutes(30), 30).is_some());
        assert!(fire(&mut scheduler, &mut timers, &mut store, t0() + Duration::minutes(60), 30).is_none());
        assert!(fire(&mut scheduler, &mut timers, &mut store, t0() + Duration::minutes(150), 30).is_some());
    }

    /// Store whose timestamp writes always fail.
    struct ReadOnlyStore(MemoryTaskStore);

    impl TaskStore for ReadOnlyStore {
        fn create(&mut self, title: &str, priority: Priority, now: DateTime<Utc>) -> Result<Task, StoreError> {
            self.0.create(title, priority, now)
        }
        fn list(&self) -> Result<Vec<Task>, StoreError> {
            self.0.list()
        }
        fn set_completed(&mut self, id: &TaskId, completed: bool, now: DateTime<Utc>) -> Result<(), StoreError> {
            self.0.set_completed(id, completed, now)
        }
        fn set_title(&mut self, id: &TaskId, title: &str) -> Result<(), StoreError> {
            self.0.set_title(id, title)
        }
        fn touch_reminded(&mut self, _id: &TaskId, _at: DateTime<Utc>) -> Result<(), StoreError> {
            Err(StoreError::IoError("read-only".to_string()))
        }
        fn delete(&mut self, id: &TaskId) -> Result<(), StoreError> {
            self.0.delete(id)
        }
        fn archive_and_purge(
            &mut self,
            cutoff: &crate::store::DailyCutoff,
            now: DateTime<Utc>,
        ) -> Result<usize, StoreError> {
            self.0.archive_and_purge(cutoff, now)
        }
        fn list_archived(&self, date_key: &str) -> Result<Vec<Task>, StoreError> {
            self.0.list_archived(date_key)
        }
        fn archived_date_keys(&self) -> Result<BTreeSet<String>, StoreError> {
            self.0.archived_date_keys()
        }
    }

    #[test]
    fn test_failed_stamp_still_reminds_and_reschedules() {
        let mut store = ReadOnlyStore(MemoryTaskStore::with_tasks(vec![task("t", Priority::High, t0())]));
        let mut timers = TimerQueue::new();
        let mut scheduler = ReminderScheduler::default();
        scheduler.start(&mut timers, t0(), 30);

        let reminded = fire(&mut scheduler, &mut timers, &mut store, t0() + Duration::minutes(30), 30);
        assert!(reminded.is_some());
        assert!(scheduler.is_running());
    }

    #[test]
    fn test_stale_cycle_id_is_ignored() {
        let mut store = MemoryTaskStore::with_tasks(vec![task("t", Priority::High, t0())]);
        let mut timers = TimerQueue::new();
        let mut scheduler = ReminderScheduler::default();
        scheduler.start(&mut timers, t0(), 30);
        let stale = timers.schedule(t0(), Duration::zero(), TimerEvent::ReminderCycle);
        assert!(scheduler
            .on_cycle(stale, &mut timers, &mut store, t0(), 30)
            .is_none());
        assert!(scheduler.is_running());
    }
}
