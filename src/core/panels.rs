//! Auxiliary panel coordination.
//!
//! Each registered panel runs the same state machine:
//!
//! ```text
//!            trigger enter             show delay
//!   Hidden ───────────────► PendingShow ─────────► Visible
//!     ▲                          │                 │    ▲
//!     │      trigger leave       │   leave/poll    │    │ re-enter
//!     ├──────────────────────────┘                 ▼    │
//!     └──────────────────────────────────────── PendingHide
//!                    hide delay
//! ```
//!
//! Hover intent arrives two ways: direct enter/leave events from the
//! panel content, and a cursor poller that compares the pointer against
//! each visible panel's bounds. The poller only runs while some panel is
//! not Hidden.

use crate::core::timer::{PetTimers, TimerEvent, TimerId};
use crate::host::{Bounds, LogicalPosition, PanelId, PhysicalPosition, PrimaryGeometry, WindowHost};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Logical width of the todo panel.
pub const TODO_PANEL_WIDTH: f64 = 306.0;
/// Logical gap between the primary window and a panel.
pub const PANEL_GAP: f64 = 8.0;

/// Where a panel sits relative to the primary window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    /// Panel's right edge `gap` left of the primary window
    LeftOf { width: f64, gap: f64 },
    /// Panel's left edge `gap` right of the primary window
    RightOf { gap: f64 },
}

impl Anchor {
    /// Logical position of a panel for the given primary geometry.
    pub fn position_for(&self, primary: &PrimaryGeometry) -> LogicalPosition {
        let scale = if primary.scale_factor > 0.0 {
            primary.scale_factor
        } else {
            1.0
        };
        let x = f64::from(primary.position.x) / scale;
        let y = f64::from(primary.position.y) / scale;
        match *self {
            Anchor::LeftOf { width, gap } => LogicalPosition::new(x - width - gap, y),
            Anchor::RightOf { gap } => {
                LogicalPosition::new(x + f64::from(primary.size.width) / scale + gap, y)
            }
        }
    }
}

/// Externally visible panel phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PanelPhase {
    Hidden,
    PendingShow,
    Visible,
    PendingHide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelState {
    Hidden,
    PendingShow(TimerId),
    Visible,
    PendingHide(TimerId),
}

impl PanelState {
    fn phase(self) -> PanelPhase {
        match self {
            PanelState::Hidden => PanelPhase::Hidden,
            PanelState::PendingShow(_) => PanelPhase::PendingShow,
            PanelState::Visible => PanelPhase::Visible,
            PanelState::PendingHide(_) => PanelPhase::PendingHide,
        }
    }

    fn shown(self) -> bool {
        matches!(self, PanelState::Visible | PanelState::PendingHide(_))
    }
}

#[derive(Debug)]
struct PanelSlot {
    id: PanelId,
    anchor: Anchor,
    state: PanelState,
    bounds: Option<Bounds>,
    /// Pointer containment seen by the previous poll
    pointer_inside: bool,
}

/// Drives panel visibility and positioning.
#[derive(Debug)]
pub struct WindowCoordinator {
    show_delay: Duration,
    hide_delay: Duration,
    poll_interval: Duration,
    slots: Vec<PanelSlot>,
    poller: Option<TimerId>,
    /// Latest primary position reported by a move event
    primary_position: Option<PhysicalPosition>,
}

impl WindowCoordinator {
    pub fn new(show_delay: Duration, hide_delay: Duration, poll_interval: Duration) -> Self {
        Self {
            show_delay,
            hide_delay,
            poll_interval,
            slots: Vec::new(),
            poller: None,
            primary_position: None,
        }
    }

    /// Coordinator with the default `todo` (left) and `settings` (right) panels.
    pub fn with_default_panels(
        show_delay: Duration,
        hide_delay: Duration,
        poll_interval: Duration,
    ) -> Self {
        let mut coordinator = Self::new(show_delay, hide_delay, poll_interval);
        coordinator.register(
            PanelId::todo(),
            Anchor::LeftOf {
                width: TODO_PANEL_WIDTH,
                gap: PANEL_GAP,
            },
        );
        coordinator.register(PanelId::settings(), Anchor::RightOf { gap: PANEL_GAP });
        coordinator
    }

    /// Register a panel. Re-registering replaces the anchor only.
    pub fn register(&mut self, id: PanelId, anchor: Anchor) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.id == id) {
            slot.anchor = anchor;
            return;
        }
        self.slots.push(PanelSlot {
            id,
            anchor,
            state: PanelState::Hidden,
            bounds: None,
            pointer_inside: false,
        });
    }

    pub fn panels(&self) -> impl Iterator<Item = &PanelId> {
        self.slots.iter().map(|s| &s.id)
    }

    pub fn phase(&self, panel: &PanelId) -> Option<PanelPhase> {
        self.slots
            .iter()
            .find(|s| s.id == *panel)
            .map(|s| s.state.phase())
    }

    pub fn bounds(&self, panel: &PanelId) -> Option<Bounds> {
        self.slots.iter().find(|s| s.id == *panel)?.bounds
    }

    pub fn poller_running(&self) -> bool {
        self.poller.is_some()
    }

    /// Pointer entered the trigger region of a panel.
    pub fn trigger_enter(
        &mut self,
        panel: &PanelId,
        host: &dyn WindowHost,
        timers: &mut PetTimers,
        now: DateTime<Utc>,
    ) {
        let show_delay = self.show_delay;
        let Some(slot) = self.live_slot(panel, host) else {
            return;
        };
        match slot.state {
            PanelState::PendingHide(id) => {
                timers.cancel(id);
                slot.state = PanelState::Visible;
                tracing::debug!("Panel {}: hide cancelled by trigger", panel);
            }
            PanelState::Hidden => {
                let id = timers.schedule(now, show_delay, TimerEvent::PanelShow(panel.clone()));
                slot.state = PanelState::PendingShow(id);
                tracing::debug!("Panel {}: pending show", panel);
            }
            PanelState::PendingShow(_) | PanelState::Visible => {}
        }
    }

    /// Pointer left the trigger region of a panel.
    pub fn trigger_leave(
        &mut self,
        panel: &PanelId,
        host: &dyn WindowHost,
        timers: &mut PetTimers,
        now: DateTime<Utc>,
    ) {
        let hide_delay = self.hide_delay;
        let Some(slot) = self.live_slot(panel, host) else {
            return;
        };
        match slot.state {
            PanelState::PendingShow(id) => {
                timers.cancel(id);
                slot.state = PanelState::Hidden;
                tracing::debug!("Panel {}: quick pass, show cancelled", panel);
            }
            PanelState::Visible => {
                slot.arm_hide(timers, now, hide_delay);
            }
            PanelState::PendingHide(_) | PanelState::Hidden => {}
        }
    }

    /// Pointer entered the panel content.
    pub fn panel_pointer_enter(&mut self, panel: &PanelId, host: &dyn WindowHost, timers: &mut PetTimers) {
        let Some(slot) = self.live_slot(panel, host) else {
            return;
        };
        slot.pointer_inside = true;
        slot.cancel_hide(timers);
    }

    /// Pointer left the panel content.
    pub fn panel_pointer_leave(
        &mut self,
        panel: &PanelId,
        host: &dyn WindowHost,
        timers: &mut PetTimers,
        now: DateTime<Utc>,
    ) {
        let hide_delay = self.hide_delay;
        let Some(slot) = self.live_slot(panel, host) else {
            return;
        };
        slot.pointer_inside = false;
        if slot.state == PanelState::Visible {
            slot.arm_hide(timers, now, hide_delay);
        }
    }

    /// Show delay elapsed. Returns true if the panel was shown.
    pub fn on_show_elapsed(
        &mut self,
        fired: TimerId,
        panel: &PanelId,
        host: &mut dyn WindowHost,
        timers: &mut PetTimers,
        now: DateTime<Utc>,
    ) -> bool {
        let primary = self.primary_geometry(host);
        let Some(slot) = self.slots.iter_mut().find(|s| s.id == *panel) else {
            return false;
        };
        if slot.state != PanelState::PendingShow(fired) {
            return false;
        }
        slot.state = PanelState::Hidden;

        if !host.panel_exists(panel) {
            tracing::debug!("Panel {} vanished before showing", panel);
            return false;
        }
        if let Some(primary) = primary {
            let position = slot.anchor.position_for(&primary);
            if let Err(e) = host.set_panel_position(panel, position) {
                tracing::warn!("Failed to position panel {}: {}", panel, e);
            }
        }
        if let Err(e) = host.show_panel(panel) {
            tracing::warn!("Failed to show panel {}: {}", panel, e);
            return false;
        }

        slot.bounds = host.panel_bounds(panel);
        slot.pointer_inside = match (slot.bounds, host.cursor_position()) {
            (Some(bounds), Some(cursor)) => bounds.contains(cursor),
            _ => false,
        };
        slot.state = PanelState::Visible;
        tracing::debug!("Panel {}: visible at {:?}", panel, slot.bounds);

        self.ensure_poller(timers, now);
        true
    }

    /// Hide delay elapsed.
    pub fn on_hide_elapsed(
        &mut self,
        fired: TimerId,
        panel: &PanelId,
        host: &mut dyn WindowHost,
        timers: &mut PetTimers,
    ) {
        let Some(slot) = self.slots.iter_mut().find(|s| s.id == *panel) else {
            return;
        };
        if slot.state != PanelState::PendingHide(fired) {
            return;
        }
        if host.panel_exists(panel) {
            if let Err(e) = host.hide_panel(panel) {
                tracing::warn!("Failed to hide panel {}: {}", panel, e);
            }
        }
        slot.state = PanelState::Hidden;
        slot.bounds = None;
        slot.pointer_inside = false;
        tracing::debug!("Panel {}: hidden", panel);

        if self.all_hidden() {
            self.stop_poller(timers);
        }
    }

    /// One cursor poll tick.
    pub fn on_cursor_poll(
        &mut self,
        fired: TimerId,
        host: &dyn WindowHost,
        timers: &mut PetTimers,
        now: DateTime<Utc>,
    ) {
        if self.poller != Some(fired) {
            return;
        }
        self.poller = None;

        if let Some(cursor) = host.cursor_position() {
            let hide_delay = self.hide_delay;
            for slot in self.slots.iter_mut().filter(|s| s.state.shown()) {
                let Some(bounds) = slot.bounds else {
                    continue;
                };
                let inside = bounds.contains(cursor);
                match (slot.pointer_inside, inside) {
                    (false, true) => slot.cancel_hide(timers),
                    (true, false) if slot.state == PanelState::Visible => {
                        slot.arm_hide(timers, now, hide_delay);
                    }
                    _ => {}
                }
                slot.pointer_inside = inside;
            }
        }

        if !self.all_hidden() {
            self.ensure_poller(timers, now);
        }
    }

    /// The primary window moved: re-anchor every existing panel.
    pub fn primary_moved(&mut self, position: PhysicalPosition, host: &mut dyn WindowHost) {
        self.primary_position = Some(position);
        let Some(primary) = self.primary_geometry(host) else {
            return;
        };
        for slot in &mut self.slots {
            if !host.panel_exists(&slot.id) {
                continue;
            }
            let target = slot.anchor.position_for(&primary);
            if let Err(e) = host.set_panel_position(&slot.id, target) {
                tracing::warn!("Failed to re-anchor panel {}: {}", slot.id, e);
                continue;
            }
            if slot.state.shown() {
                slot.bounds = host.panel_bounds(&slot.id);
            }
        }
    }

    /// Place every existing panel at its anchor without changing visibility.
    pub fn anchor_all(&mut self, host: &mut dyn WindowHost) {
        if let Some(primary) = self.primary_geometry(host) {
            self.primary_moved(primary.position, host);
        }
    }

    /// Cancel every pending timer and forget all panel state.
    pub fn shutdown(&mut self, timers: &mut PetTimers) {
        for slot in &mut self.slots {
            match slot.state {
                PanelState::PendingShow(id) | PanelState::PendingHide(id) => {
                    timers.cancel(id);
                }
                PanelState::Hidden | PanelState::Visible => {}
            }
            slot.state = PanelState::Hidden;
            slot.bounds = None;
            slot.pointer_inside = false;
        }
        self.stop_poller(timers);
    }

    fn primary_geometry(&self, host: &dyn WindowHost) -> Option<PrimaryGeometry> {
        let mut primary = host.primary_geometry()?;
        if let Some(position) = self.primary_position {
            primary.position = position;
        }
        Some(primary)
    }

    /// Slot for a registered panel that exists in the host.
    fn live_slot(&mut self, panel: &PanelId, host: &dyn WindowHost) -> Option<&mut PanelSlot> {
        if !host.panel_exists(panel) {
            return None;
        }
        self.slots.iter_mut().find(|s| s.id == *panel)
    }

    fn all_hidden(&self) -> bool {
        self.slots.iter().all(|s| s.state == PanelState::Hidden)
    }

    fn ensure_poller(&mut self, timers: &mut PetTimers, now: DateTime<Utc>) {
        if self.poller.is_none() {
            self.poller = Some(timers.schedule(now, self.poll_interval, TimerEvent::CursorPoll));
        }
    }

    fn stop_poller(&mut self, timers: &mut PetTimers) {
        if let Some(id) = self.poller.take() {
            timers.cancel(id);
        }
    }
}

impl PanelSlot {
    fn arm_hide(&mut self, timers: &mut PetTimers, now: DateTime<Utc>, delay: Duration) {
        if let PanelState::Visible = self.state {
            let id = timers.schedule(now, delay, TimerEvent::PanelHide(self.id.clone()));
            self.state = PanelState::PendingHide(id);
            tracing::debug!("Panel {}: pending hide", self.id);
        }
    }

    fn cancel_hide(&mut self, timers: &mut PetTimers) {
        if let PanelState::PendingHide(id) = self.state {
            timers.cancel(id);
            self.state = PanelState::Visible;
            tracing::debug!("Panel {}: hide cancelled", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timer::TimerQueue;
    use crate::host::{HeadlessHost, PhysicalSize};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn ms(n: i64) -> Duration {
        Duration::milliseconds(n)
    }

    fn setup() -> (WindowCoordinator, HeadlessHost, PetTimers) {
        let mut host = HeadlessHost::with_pinned_cursor(PrimaryGeometry {
            position: PhysicalPosition::new(2000, 1000),
            size: PhysicalSize::new(400, 400),
            scale_factor: 2.0,
        });
        host.add_panel(PanelId::todo(), PhysicalSize::new(612, 900));
        host.add_panel(PanelId::settings(), PhysicalSize::new(600, 800));
        let coordinator = WindowCoordinator::with_default_panels(ms(200), ms(500), ms(150));
        (coordinator, host, TimerQueue::new())
    }

    fn run_until(
        coordinator: &mut WindowCoordinator,
        host: &mut HeadlessHost,
        timers: &mut PetTimers,
        now: DateTime<Utc>,
    ) {
        while let Some(fired) = timers.pop_due(now) {
            match fired.event {
                TimerEvent::PanelShow(panel) => {
                    coordinator.on_show_elapsed(fired.id, &panel, host, timers, fired.deadline);
                }
                TimerEvent::PanelHide(panel) => {
                    coordinator.on_hide_elapsed(fired.id, &panel, host, timers);
                }
                TimerEvent::CursorPoll => {
                    coordinator.on_cursor_poll(fired.id, host, timers, fired.deadline);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_quick_pass_never_shows() {
        let (mut coordinator, mut host, mut timers) = setup();
        let todo = PanelId::todo();

        coordinator.trigger_enter(&todo, &host, &mut timers, t0());
        assert_eq!(coordinator.phase(&todo), Some(PanelPhase::PendingShow));
        coordinator.trigger_leave(&todo, &host, &mut timers, t0() + ms(150));
        assert_eq!(coordinator.phase(&todo), Some(PanelPhase::Hidden));

        run_until(&mut coordinator, &mut host, &mut timers, t0() + Duration::seconds(5));
        assert!(!host.is_visible(&todo));
        assert!(timers.is_empty());
    }

    #[test]
    fn test_show_anchors_left_and_right() {
        let (mut coordinator, mut host, mut timers) = setup();
        let todo = PanelId::todo();
        let settings = PanelId::settings();

        coordinator.trigger_enter(&todo, &host, &mut timers, t0());
        coordinator.trigger_enter(&settings, &host, &mut timers, t0());
        run_until(&mut coordinator, &mut host, &mut timers, t0() + ms(200));

        assert!(host.is_visible(&todo));
        assert!(host.is_visible(&settings));
        // Primary at (1000, 500) logical, 200 logical wide.
        assert_eq!(host.panel_position(&todo), Some(LogicalPosition::new(1000.0 - 306.0 - 8.0, 500.0)));
        assert_eq!(host.panel_position(&settings), Some(LogicalPosition::new(1208.0, 500.0)));
        assert_eq!(
            coordinator.bounds(&todo),
            Some(Bounds::new(PhysicalPosition::new(1372, 1000), PhysicalSize::new(612, 900)))
        );
        assert!(coordinator.poller_running());
    }

    #[test]
    fn test_reenter_keeps_panel_visible() {
        let (mut coordinator, mut host, mut timers) = setup();
        let todo = PanelId::todo();

        coordinator.trigger_enter(&todo, &host, &mut timers, t0());
        run_until(&mut coordinator, &mut host, &mut timers, t0() + ms(200));
        coordinator.trigger_leave(&todo, &host, &mut timers, t0() + ms(1000));
        assert_eq!(coordinator.phase(&todo), Some(PanelPhase::PendingHide));

        coordinator.panel_pointer_enter(&todo, &host, &mut timers);
        assert_eq!(coordinator.phase(&todo), Some(PanelPhase::Visible));

        run_until(&mut coordinator, &mut host, &mut timers, t0() + Duration::seconds(3));
        assert!(host.is_visible(&todo));
        assert_eq!(coordinator.phase(&todo), Some(PanelPhase::Visible));
    }

    #[test]
    fn test_trigger_reenter_cancels_hide() {
        let (mut coordinator, mut host, mut timers) = setup();
        let todo = PanelId::todo();

        coordinator.trigger_enter(&todo, &host, &mut timers, t0());
        run_until(&mut coordinator, &mut host, &mut timers, t0() + ms(200));
        coordinator.trigger_leave(&todo, &host, &mut timers, t0() + ms(300));
        coordinator.trigger_enter(&todo, &host, &mut timers, t0() + ms(600));
        run_until(&mut coordinator, &mut host, &mut timers, t0() + Duration::seconds(2));
        assert_eq!(coordinator.phase(&todo), Some(PanelPhase::Visible));
    }

    #[test]
    fn test_hide_elapses_and_poller_stops() {
        let (mut coordinator, mut host, mut timers) = setup();
        let todo = PanelId::todo();

        coordinator.trigger_enter(&todo, &host, &mut timers, t0());
        run_until(&mut coordinator, &mut host, &mut timers, t0() + ms(200));
        coordinator.trigger_leave(&todo, &host, &mut timers, t0() + ms(400));
        run_until(&mut coordinator, &mut host, &mut timers, t0() + ms(900));

        assert!(!host.is_visible(&todo));
        assert_eq!(coordinator.phase(&todo), Some(PanelPhase::Hidden));
        assert_eq!(coordinator.bounds(&todo), None);
        assert!(!coordinator.poller_running());
        assert!(timers.is_empty());
    }

    #[test]
    fn test_cursor_poll_edges() {
        let (mut coordinator, mut host, mut timers) = setup();
        let todo = PanelId::todo();

        coordinator.trigger_enter(&todo, &host, &mut timers, t0());
        run_until(&mut coordinator, &mut host, &mut timers, t0() + ms(200));
        coordinator.trigger_leave(&todo, &host, &mut timers, t0() + ms(250));

        // Pointer moves into the panel before the hide fires.
        host.set_cursor(Some(PhysicalPosition::new(1400, 1100)));
        run_until(&mut coordinator, &mut host, &mut timers, t0() + ms(500));
        assert_eq!(coordinator.phase(&todo), Some(PanelPhase::Visible));

        // Right edge is outside.
        host.set_cursor(Some(PhysicalPosition::new(1372 + 612, 1100)));
        run_until(&mut coordinator, &mut host, &mut timers, t0() + ms(650));
        assert_eq!(coordinator.phase(&todo), Some(PanelPhase::PendingHide));

        run_until(&mut coordinator, &mut host, &mut timers, t0() + Duration::seconds(2));
        assert_eq!(coordinator.phase(&todo), Some(PanelPhase::Hidden));
        assert!(!coordinator.poller_running());
    }

    #[test]
    fn test_primary_move_reanchors_everything() {
        let (mut coordinator, mut host, mut timers) = setup();
        let todo = PanelId::todo();
        let settings = PanelId::settings();

        coordinator.trigger_enter(&todo, &host, &mut timers, t0());
        run_until(&mut coordinator, &mut host, &mut timers, t0() + ms(200));

        coordinator.primary_moved(PhysicalPosition::new(1000, 200), &mut host);
        assert_eq!(host.panel_position(&todo), Some(LogicalPosition::new(500.0 - 314.0, 100.0)));
        assert_eq!(host.panel_position(&settings), Some(LogicalPosition::new(708.0, 100.0)));
        assert_eq!(
            coordinator.bounds(&todo),
            Some(Bounds::new(PhysicalPosition::new(372, 200), PhysicalSize::new(612, 900)))
        );
        assert_eq!(coordinator.bounds(&settings), None);
    }

    #[test]
    fn test_missing_panel_is_noop() {
        let (mut coordinator, mut host, mut timers) = setup();
        let ghost = PanelId::new("ghost");
        coordinator.trigger_enter(&ghost, &host, &mut timers, t0());
        assert!(timers.is_empty());

        let todo = PanelId::todo();
        coordinator.trigger_enter(&todo, &host, &mut timers, t0());
        host.close_panel(&todo);
        run_until(&mut coordinator, &mut host, &mut timers, t0() + ms(300));
        assert_eq!(coordinator.phase(&todo), Some(PanelPhase::Hidden));
        assert!(!coordinator.poller_running());
    }

    #[test]
    fn test_shutdown_clears_timers() {
        let (mut coordinator, mut host, mut timers) = setup();
        let todo = PanelId::todo();
        coordinator.trigger_enter(&todo, &host, &mut timers, t0());
        run_until(&mut coordinator, &mut host, &mut timers, t0() + ms(200));
        coordinator.trigger_leave(&todo, &host, &mut timers, t0() + ms(300));

        coordinator.shutdown(&mut timers);
        assert!(timers.is_empty());
        assert!(!coordinator.poller_running());
    }
}
