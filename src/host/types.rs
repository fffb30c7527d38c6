//! Window geometry and the host surface interface.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Screen position in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhysicalPosition {
    pub x: i32,
    pub y: i32,
}

impl PhysicalPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhysicalSize {
    pub width: u32,
    pub height: u32,
}

impl PhysicalSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Position in logical (density independent) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LogicalPosition {
    pub x: f64,
    pub y: f64,
}

impl LogicalPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Convert to physical pixels at the given scale factor.
    pub fn to_physical(self, scale_factor: f64) -> PhysicalPosition {
        PhysicalPosition {
            x: (self.x * scale_factor).round() as i32,
            y: (self.y * scale_factor).round() as i32,
        }
    }
}

/// Screen-space rectangle in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn new(position: PhysicalPosition, size: PhysicalSize) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
        }
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, point: PhysicalPosition) -> bool {
        let (px, py) = (i64::from(point.x), i64::from(point.y));
        let (x, y) = (i64::from(self.x), i64::from(self.y));
        px >= x && px < x + i64::from(self.width) && py >= y && py < y + i64::from(self.height)
    }
}

/// Geometry of the primary (pet) window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimaryGeometry {
    /// Outer position in physical pixels
    pub position: PhysicalPosition,
    /// Outer size in physical pixels
    pub size: PhysicalSize,
    /// Display density
    pub scale_factor: f64,
}

/// Identifier of an auxiliary panel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelId(String);

impl PanelId {
    pub const TODO: &'static str = "todo";
    pub const SETTINGS: &'static str = "settings";

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The todo list panel.
    pub fn todo() -> Self {
        Self::new(Self::TODO)
    }

    /// The settings panel.
    pub fn settings() -> Self {
        Self::new(Self::SETTINGS)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised by a window host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The panel is not (or no longer) created
    PanelMissing(PanelId),
    /// The surface rejected the operation
    Surface(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::PanelMissing(id) => write!(f, "Panel '{id}' does not exist"),
            HostError::Surface(msg) => write!(f, "Surface error: {msg}"),
        }
    }
}

impl std::error::Error for HostError {}

/// The top-level surfaces the coordinator drives.
///
/// Implementations wrap a real windowing toolkit or, as in
/// [`super::HeadlessHost`], track geometry without rendering.
pub trait WindowHost {
    /// Current geometry of the primary window, if it exists.
    fn primary_geometry(&self) -> Option<PrimaryGeometry>;

    /// Whether a panel currently exists.
    fn panel_exists(&self, panel: &PanelId) -> bool;

    /// Move a panel to a logical position.
    fn set_panel_position(
        &mut self,
        panel: &PanelId,
        position: LogicalPosition,
    ) -> Result<(), HostError>;

    fn show_panel(&mut self, panel: &PanelId) -> Result<(), HostError>;

    fn hide_panel(&mut self, panel: &PanelId) -> Result<(), HostError>;

    /// Outer bounds of a panel in physical pixels.
    fn panel_bounds(&self, panel: &PanelId) -> Option<Bounds>;

    /// Absolute pointer position in physical pixels.
    fn cursor_position(&self) -> Option<PhysicalPosition>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_contains_half_open() {
        let bounds = Bounds::new(PhysicalPosition::new(100, 50), PhysicalSize::new(10, 20));

        assert!(bounds.contains(PhysicalPosition::new(100, 50)));
        assert!(bounds.contains(PhysicalPosition::new(109, 69)));
        assert!(!bounds.contains(PhysicalPosition::new(110, 60)));
        assert!(!bounds.contains(PhysicalPosition::new(105, 70)));
        assert!(!bounds.contains(PhysicalPosition::new(99, 60)));
    }

    #[test]
    fn test_logical_to_physical() {
        let pos = LogicalPosition::new(10.0, 20.5).to_physical(2.0);
        assert_eq!(pos, PhysicalPosition::new(20, 41));
    }

    #[test]
    fn test_panel_id_serde() {
        let json = serde_json::to_string(&PanelId::todo()).unwrap();
        assert_eq!(json, "\"todo\"");
    }
}
