//! In-process window host that tracks geometry without rendering.
//!
//! Used by the CLI runtime (where rendering is someone else's job) and by
//! tests, which pin the pointer with [`HeadlessHost::set_cursor`].

use crate::host::types::{
    Bounds, HostError, LogicalPosition, PanelId, PhysicalPosition, PhysicalSize, PrimaryGeometry,
    WindowHost,
};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct HeadlessPanel {
    position: LogicalPosition,
    size: PhysicalSize,
    visible: bool,
}

/// Window host backed by plain data.
#[derive(Debug, Clone)]
pub struct HeadlessHost {
    primary: Option<PrimaryGeometry>,
    panels: HashMap<PanelId, HeadlessPanel>,
    cursor: CursorSource,
}

#[derive(Debug, Clone, Copy)]
enum CursorSource {
    /// Read the real pointer through the platform layer
    System,
    /// Fixed position (tests, scripted sessions)
    Pinned(Option<PhysicalPosition>),
}

impl HeadlessHost {
    /// Host with a primary window and no panels, reading the system cursor.
    pub fn new(primary: PrimaryGeometry) -> Self {
        Self {
            primary: Some(primary),
            panels: HashMap::new(),
            cursor: CursorSource::System,
        }
    }

    /// Host whose pointer position is controlled by the caller.
    pub fn with_pinned_cursor(primary: PrimaryGeometry) -> Self {
        Self {
            cursor: CursorSource::Pinned(None),
            ..Self::new(primary)
        }
    }

    /// Create (or recreate) a hidden panel with a physical size.
    pub fn add_panel(&mut self, panel: PanelId, size: PhysicalSize) {
        self.panels.insert(
            panel,
            HeadlessPanel {
                position: LogicalPosition::default(),
                size,
                visible: false,
            },
        );
    }

    /// Close a panel; later operations on it become no-ops.
    pub fn close_panel(&mut self, panel: &PanelId) {
        self.panels.remove(panel);
    }

    /// Move the primary window (physical pixels).
    pub fn move_primary(&mut self, position: PhysicalPosition) {
        if let Some(primary) = self.primary.as_mut() {
            primary.position = position;
        }
    }

    /// Pin the pointer position. Switches the host to a pinned cursor.
    pub fn set_cursor(&mut self, position: Option<PhysicalPosition>) {
        self.cursor = CursorSource::Pinned(position);
    }

    pub fn is_visible(&self, panel: &PanelId) -> bool {
        self.panels.get(panel).map(|p| p.visible).unwrap_or(false)
    }

    pub fn panel_position(&self, panel: &PanelId) -> Option<LogicalPosition> {
        self.panels.get(panel).map(|p| p.position)
    }

    fn scale_factor(&self) -> f64 {
        self.primary.map(|p| p.scale_factor).unwrap_or(1.0)
    }

    fn panel_mut(&mut self, panel: &PanelId) -> Result<&mut HeadlessPanel, HostError> {
        self.panels
            .get_mut(panel)
            .ok_or_else(|| HostError::PanelMissing(panel.clone()))
    }
}

impl WindowHost for HeadlessHost {
    fn primary_geometry(&self) -> Option<PrimaryGeometry> {
        self.primary
    }

    fn panel_exists(&self, panel: &PanelId) -> bool {
        self.panels.contains_key(panel)
    }

    fn set_panel_position(
        &mut self,
        panel: &PanelId,
        position: LogicalPosition,
    ) -> Result<(), HostError> {
        self.panel_mut(panel)?.position = position;
        Ok(())
    }

    fn show_panel(&mut self, panel: &PanelId) -> Result<(), HostError> {
        self.panel_mut(panel)?.visible = true;
        Ok(())
    }

    fn hide_panel(&mut self, panel: &PanelId) -> Result<(), HostError> {
        self.panel_mut(panel)?.visible = false;
        Ok(())
    }

    fn panel_bounds(&self, panel: &PanelId) -> Option<Bounds> {
        let state = self.panels.get(panel)?;
        Some(Bounds::new(
            state.position.to_physical(self.scale_factor()),
            state.size,
        ))
    }

    fn cursor_position(&self) -> Option<PhysicalPosition> {
        match self.cursor {
            CursorSource::System => super::cursor_position(self.scale_factor()),
            CursorSource::Pinned(position) => position,
        }
    }
}
