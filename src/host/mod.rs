//! Window host layer.
//!
//! This module describes the top-level surfaces the agent coordinates
//! (the primary pet window and its auxiliary panels) and provides
//! platform-specific pointer queries used by the cursor poller.

pub mod headless;
pub mod types;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod win32;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod noop;

// Re-export commonly used types
pub use headless::HeadlessHost;
pub use types::{
    Bounds, HostError, LogicalPosition, PanelId, PhysicalPosition, PhysicalSize, PrimaryGeometry,
    WindowHost,
};

#[cfg(target_os = "macos")]
pub use macos::{cursor_available, cursor_position};

#[cfg(target_os = "windows")]
pub use win32::{cursor_available, cursor_position};

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub use noop::{cursor_available, cursor_position};
