//! Idle and hover attention tracking.
//!
//! Two independent timers live here:
//!
//! ```text
//!   interaction ──► reset idle timer ──(threshold)──► sleepy
//!
//!   pet enter ──► Revealing ──(reveal delay)──► menu shown
//!   pet leave ──► Hiding    ──(hide delay)────► menu hidden
//!   menu enter ─► cancel Hiding
//! ```
//!
//! Only one of reveal/hide is armed at a time.

use crate::core::state::{AppStore, Expression};
use crate::core::timer::{PetTimers, TimerEvent, TimerId};
use chrono::{DateTime, Duration, Utc};

/// Hover menu debounce phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum HoverPhase {
    #[default]
    Idle,
    Revealing(TimerId),
    Hiding(TimerId),
}

/// Interaction recency and hover-menu debounce.
#[derive(Debug)]
pub struct AttentionTracker {
    idle_threshold: Duration,
    reveal_delay: Duration,
    hide_delay: Duration,
    idle_timer: Option<TimerId>,
    hover: HoverPhase,
    last_interaction: Option<DateTime<Utc>>,
}

impl AttentionTracker {
    pub fn new(idle_threshold: Duration, reveal_delay: Duration, hide_delay: Duration) -> Self {
        Self {
            idle_threshold,
            reveal_delay,
            hide_delay,
            idle_timer: None,
            hover: HoverPhase::Idle,
            last_interaction: None,
        }
    }

    /// Arm the idle timer.
    pub fn start(&mut self, timers: &mut PetTimers, now: DateTime<Utc>) {
        self.last_interaction = Some(now);
        self.arm_idle(timers, now);
    }

    /// Cancel both timers.
    pub fn stop(&mut self, timers: &mut PetTimers) {
        if let Some(id) = self.idle_timer.take() {
            timers.cancel(id);
        }
        self.cancel_hover(timers);
    }

    pub fn last_interaction(&self) -> Option<DateTime<Utc>> {
        self.last_interaction
    }

    pub fn idle_armed(&self) -> bool {
        self.idle_timer.is_some()
    }

    pub fn reveal_pending(&self) -> bool {
        matches!(self.hover, HoverPhase::Revealing(_))
    }

    pub fn hide_pending(&self) -> bool {
        matches!(self.hover, HoverPhase::Hiding(_))
    }

    /// Any user interaction. Wakes a sleepy pet and restarts the idle timer.
    pub fn record_interaction(
        &mut self,
        app: &mut AppStore,
        timers: &mut PetTimers,
        now: DateTime<Utc>,
    ) {
        self.last_interaction = Some(now);
        if app.expression() == Expression::Sleepy {
            app.set_expression(Expression::Default, timers);
        }
        self.arm_idle(timers, now);
    }

    /// The idle threshold elapsed without interaction.
    pub fn on_idle_elapsed(
        &mut self,
        fired: TimerId,
        app: &mut AppStore,
        timers: &mut PetTimers,
        now: DateTime<Utc>,
    ) {
        if self.idle_timer != Some(fired) {
            return;
        }
        self.idle_timer = None;

        if app.expression_transition_pending() || app.is_processing() {
            tracing::debug!("Idle elapsed during another transition, re-arming");
            self.arm_idle(timers, now);
            return;
        }

        tracing::debug!("Idle threshold reached, going to sleep");
        app.set_expression(Expression::Sleepy, timers);
    }

    /// Pointer entered the pet region.
    pub fn pointer_enter_pet(
        &mut self,
        app: &mut AppStore,
        timers: &mut PetTimers,
        now: DateTime<Utc>,
    ) {
        self.record_interaction(app, timers, now);
        match self.hover {
            HoverPhase::Revealing(_) => {}
            _ => {
                self.cancel_hover(timers);
                if !app.hover_menu_visible() {
                    let id = timers.schedule(now, self.reveal_delay, TimerEvent::HoverReveal);
                    self.hover = HoverPhase::Revealing(id);
                }
            }
        }
    }

    /// Pointer left the pet region.
    pub fn pointer_leave_pet(&mut self, timers: &mut PetTimers, now: DateTime<Utc>) {
        self.cancel_hover(timers);
        let id = timers.schedule(now, self.hide_delay, TimerEvent::HoverHide);
        self.hover = HoverPhase::Hiding(id);
    }

    /// Pointer entered the hover menu itself.
    pub fn pointer_enter_menu(&mut self, timers: &mut PetTimers) {
        if let HoverPhase::Hiding(id) = self.hover {
            timers.cancel(id);
            self.hover = HoverPhase::Idle;
        }
    }

    pub fn on_hover_reveal(&mut self, fired: TimerId, app: &mut AppStore) {
        if self.hover != HoverPhase::Revealing(fired) {
            return;
        }
        self.hover = HoverPhase::Idle;
        app.set_hover_menu(true);
    }

    pub fn on_hover_hide(&mut self, fired: TimerId, app: &mut AppStore) {
        if self.hover != HoverPhase::Hiding(fired) {
            return;
        }
        self.hover = HoverPhase::Idle;
        app.set_hover_menu(false);
    }

    fn arm_idle(&mut self, timers: &mut PetTimers, now: DateTime<Utc>) {
        if let Some(id) = self.idle_timer.take() {
            timers.cancel(id);
        }
        self.idle_timer = Some(timers.schedule(now, self.idle_threshold, TimerEvent::IdleElapsed));
    }

    fn cancel_hover(&mut self, timers: &mut PetTimers) {
        match std::mem::take(&mut self.hover) {
            HoverPhase::Revealing(id) | HoverPhase::Hiding(id) => {
                timers.cancel(id);
            }
            HoverPhase::Idle => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timer::TimerQueue;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn tracker() -> AttentionTracker {
        AttentionTracker::new(
            Duration::minutes(30),
            Duration::milliseconds(600),
            Duration::milliseconds(150),
        )
    }

    /// Fire due timers, returning how many times the pet fell asleep.
    fn run_until(
        tracker: &mut AttentionTracker,
        app: &mut AppStore,
        timers: &mut PetTimers,
        now: DateTime<Utc>,
    ) -> usize {
        let mut sleeps = 0;
        while let Some(fired) = timers.pop_due(now) {
            match fired.event {
                TimerEvent::IdleElapsed => {
                    tracker.on_idle_elapsed(fired.id, app, timers, fired.deadline);
                    if app.expression() == Expression::Sleepy {
                        sleeps += 1;
                    }
                }
                TimerEvent::HoverReveal => tracker.on_hover_reveal(fired.id, app),
                TimerEvent::HoverHide => tracker.on_hover_hide(fired.id, app),
                TimerEvent::ExpressionRestore => app.on_expression_restore(fired.id),
                _ => {}
            }
        }
        sleeps
    }

    #[test]
    fn test_interactions_prevent_sleep() {
        let mut tracker = tracker();
        let mut app = AppStore::new();
        let mut timers = TimerQueue::new();
        tracker.start(&mut timers, t0());

        for minute in (10..=300).step_by(10) {
            let now = t0() + Duration::minutes(minute);
            assert_eq!(run_until(&mut tracker, &mut app, &mut timers, now), 0);
            tracker.record_interaction(&mut app, &mut timers, now);
        }
        assert_ne!(app.expression(), Expression::Sleepy);
    }

    #[test]
    fn test_silence_reaches_sleepy_exactly_once() {
        let mut tracker = tracker();
        let mut app = AppStore::new();
        let mut timers = TimerQueue::new();
        tracker.start(&mut timers, t0());

        let almost = t0() + Duration::minutes(30) - Duration::seconds(1);
        assert_eq!(run_until(&mut tracker, &mut app, &mut timers, almost), 0);

        let sleeps = run_until(&mut tracker, &mut app, &mut timers, t0() + Duration::hours(10));
        assert_eq!(sleeps, 1);
        assert_eq!(app.expression(), Expression::Sleepy);
        assert!(!tracker.idle_armed());
    }

    #[test]
    fn test_interaction_wakes_sleepy_pet() {
        let mut tracker = tracker();
        let mut app = AppStore::new();
        let mut timers = TimerQueue::new();
        tracker.start(&mut timers, t0());
        run_until(&mut tracker, &mut app, &mut timers, t0() + Duration::minutes(31));
        assert_eq!(app.expression(), Expression::Sleepy);

        tracker.record_interaction(&mut app, &mut timers, t0() + Duration::minutes(40));
        assert_eq!(app.expression(), Expression::Default);
        assert!(tracker.idle_armed());
    }

    #[test]
    fn test_idle_rearms_while_transition_in_flight() {
        let mut tracker = tracker();
        let mut app = AppStore::new();
        let mut timers = TimerQueue::new();
        tracker.start(&mut timers, t0());
        app.set_processing(true);

        let deadline = t0() + Duration::minutes(30);
        assert_eq!(run_until(&mut tracker, &mut app, &mut timers, deadline), 0);
        assert!(tracker.idle_armed());

        app.set_processing(false);
        let sleeps = run_until(&mut tracker, &mut app, &mut timers, deadline + Duration::minutes(30));
        assert_eq!(sleeps, 1);
    }

    #[test]
    fn test_hover_reveal_and_hide() {
        let mut tracker = tracker();
        let mut app = AppStore::new();
        let mut timers = TimerQueue::new();

        tracker.pointer_enter_pet(&mut app, &mut timers, t0());
        assert!(tracker.reveal_pending());
        run_until(&mut tracker, &mut app, &mut timers, t0() + Duration::milliseconds(599));
        assert!(!app.hover_menu_visible());
        run_until(&mut tracker, &mut app, &mut timers, t0() + Duration::milliseconds(600));
        assert!(app.hover_menu_visible());

        let left = t0() + Duration::seconds(2);
        tracker.pointer_leave_pet(&mut timers, left);
        assert!(tracker.hide_pending());
        assert!(!tracker.reveal_pending());
        run_until(&mut tracker, &mut app, &mut timers, left + Duration::milliseconds(150));
        assert!(!app.hover_menu_visible());
    }

    #[test]
    fn test_quick_pass_never_reveals() {
        let mut tracker = tracker();
        let mut app = AppStore::new();
        let mut timers = TimerQueue::new();

        tracker.pointer_enter_pet(&mut app, &mut timers, t0());
        tracker.pointer_leave_pet(&mut timers, t0() + Duration::milliseconds(300));
        run_until(&mut tracker, &mut app, &mut timers, t0() + Duration::seconds(5));
        assert!(!app.hover_menu_visible());
    }

    #[test]
    fn test_menu_enter_cancels_hide() {
        let mut tracker = tracker();
        let mut app = AppStore::new();
        let mut timers = TimerQueue::new();

        tracker.pointer_enter_pet(&mut app, &mut timers, t0());
        run_until(&mut tracker, &mut app, &mut timers, t0() + Duration::seconds(1));
        let left = t0() + Duration::seconds(2);
        tracker.pointer_leave_pet(&mut timers, left);
        tracker.pointer_enter_menu(&mut timers);
        assert!(!tracker.hide_pending());

        run_until(&mut tracker, &mut app, &mut timers, left + Duration::seconds(1));
        assert!(app.hover_menu_visible());
    }
}
