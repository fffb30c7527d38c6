//! Core functionality for the CloudPet agent.
//!
//! This module contains:
//! - The timer queue every delayed behavior runs on
//! - The reminder scheduler
//! - Idle and hover attention tracking
//! - Auxiliary panel coordination
//! - The observable application state

pub mod attention;
pub mod events;
pub mod panels;
pub mod reminder;
pub mod state;
pub mod timer;

// Re-export commonly used types
pub use attention::AttentionTracker;
pub use events::PetEvent;
pub use panels::{Anchor, PanelPhase, WindowCoordinator, PANEL_GAP, TODO_PANEL_WIDTH};
pub use reminder::{is_eligible, select_target, Cooldown, ReminderScheduler};
pub use state::{AppSnapshot, AppStore, Expression, SpeechBubble, StateChange, WeatherCondition};
pub use timer::{delay_from_std, FiredTimer, PetTimers, TimerEvent, TimerId, TimerQueue};
