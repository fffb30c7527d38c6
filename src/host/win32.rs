//! Windows cursor location using the Win32 API.

use crate::host::types::PhysicalPosition;
use windows::Win32::Foundation::POINT;
use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

/// Current pointer position in physical pixels.
///
/// `GetCursorPos` already reports physical pixels for a DPI-aware process,
/// so the scale factor is not applied.
pub fn cursor_position(_scale_factor: f64) -> Option<PhysicalPosition> {
    let mut point = POINT::default();
    // SAFETY: `point` is a valid, writable POINT for the duration of the call.
    unsafe { GetCursorPos(&mut point) }.ok()?;
    Some(PhysicalPosition::new(point.x, point.y))
}

pub fn cursor_available() -> bool {
    true
}
