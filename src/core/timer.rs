//! Single-threaded timer queue.
//!
//! Every delayed or periodic behavior in the agent (idle detection, hover
//! debounce, panel show/hide delays, cursor polling, reminder cycles,
//! speech bubble expiry) is a [`TimerEvent`] scheduled here. The queue
//! works on wall-clock instants passed in by the caller, so tests can
//! drive it with a virtual clock and the CLI with `Utc::now()`.

use crate::host::PanelId;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};

/// Handle to a scheduled timer.
///
/// Components keep the handle of the timer they own and compare it with
/// the handle of the firing timer, so a stale firing is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Everything that can be scheduled on the pet's timer queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// One reminder scheduler cycle
    ReminderCycle,
    /// No interaction for the idle threshold
    IdleElapsed,
    /// Hover menu reveal delay elapsed
    HoverReveal,
    /// Hover menu hide delay elapsed
    HoverHide,
    /// Panel show delay elapsed
    PanelShow(PanelId),
    /// Panel hide delay elapsed
    PanelHide(PanelId),
    /// Cursor containment poll tick
    CursorPoll,
    /// Speech bubble auto-hide
    SpeechExpired,
    /// Transient expression hold elapsed
    ExpressionRestore,
    /// Weather cache refresh
    WeatherRefresh,
    /// Daily archive cutoff reached
    ArchiveCutoff,
}

/// A timer that has come due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTimer<E> {
    /// Instant the timer was scheduled for
    pub deadline: DateTime<Utc>,
    /// Handle returned when the timer was scheduled
    pub id: TimerId,
    /// The scheduled event
    pub event: E,
}

/// Deadline-ordered queue of cancellable timers.
///
/// Timers with equal deadlines fire in scheduling order.
#[derive(Debug)]
pub struct TimerQueue<E> {
    next_id: u64,
    entries: BTreeMap<(DateTime<Utc>, u64), E>,
    deadlines: HashMap<u64, DateTime<Utc>>,
}

/// The queue used by the pet controller.
pub type PetTimers = TimerQueue<TimerEvent>;

impl<E> TimerQueue<E> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Schedule `event` to fire `delay` after `now`.
    ///
    /// Negative delays are treated as zero.
    pub fn schedule(&mut self, now: DateTime<Utc>, delay: Duration, event: E) -> TimerId {
        let delay = delay.max(Duration::zero());
        self.schedule_at(now + delay, event)
    }

    /// Schedule `event` to fire at `deadline`.
    pub fn schedule_at(&mut self, deadline: DateTime<Utc>, event: E) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert((deadline, id), event);
        self.deadlines.insert(id, deadline);
        TimerId(id)
    }

    /// Cancel a pending timer. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id.0) {
            Some(deadline) => self.entries.remove(&(deadline, id.0)).is_some(),
            None => false,
        }
    }

    /// Check whether a timer is still pending.
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id.0)
    }

    /// Deadline of a pending timer.
    pub fn deadline_of(&self, id: TimerId) -> Option<DateTime<Utc>> {
        self.deadlines.get(&id.0).copied()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return the earliest timer whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<FiredTimer<E>> {
        let (deadline, id) = *self.entries.keys().next()?;
        if deadline > now {
            return None;
        }
        let event = self.entries.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        Some(FiredTimer {
            deadline,
            id: TimerId(id),
            event,
        })
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no timers are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every pending timer.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.deadlines.clear();
    }
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a configured `std` duration into a chrono delay.
pub fn delay_from_std(duration: std::time::Duration) -> Duration {
    Duration::milliseconds(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX / 1_000))
}
