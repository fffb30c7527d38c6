//! macOS cursor location using CoreGraphics.
//!
//! CoreGraphics reports global coordinates in points; they are scaled to
//! physical pixels with the primary window's scale factor.

use crate::host::types::PhysicalPosition;
use core_graphics::event::CGEvent;
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

/// Current pointer position in physical pixels.
pub fn cursor_position(scale_factor: f64) -> Option<PhysicalPosition> {
    let source = CGEventSource::new(CGEventSourceStateID::CombinedSessionState).ok()?;
    let event = CGEvent::new(source).ok()?;
    let point = event.location();
    Some(PhysicalPosition::new(
        (point.x * scale_factor).round() as i32,
        (point.y * scale_factor).round() as i32,
    ))
}

/// The pointer can always be read on macOS; no Input Monitoring permission
/// is needed for location queries.
pub fn cursor_available() -> bool {
    true
}
