//! Cursor fallback for platforms without a supported pointer query.
//!
//! This exists so the crate (and binary) compile everywhere. Without a
//! pointer position the cursor poller never sees containment changes, and
//! panels rely on direct enter/leave events instead.

use crate::host::types::PhysicalPosition;

/// No pointer position is available.
pub fn cursor_position(_scale_factor: f64) -> Option<PhysicalPosition> {
    None
}

pub fn cursor_available() -> bool {
    false
}
