//! Cross-window messages.
//!
//! Every surface (pet window, todo panel, settings panel, HTTP bridge)
//! talks to the controller with a [`PetEvent`]. The JSON form is tagged by
//! `type`, e.g. `{"type":"trigger-enter","panel":"todo"}`.

use crate::host::PanelId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PetEvent {
    /// Settings were saved by the settings panel
    SettingsChanged,
    /// Todos were changed outside the controller (CLI, another window)
    TodosChanged,
    /// Pointer entered a panel's content
    PanelPointerEnter { panel: PanelId },
    /// Pointer left a panel's content
    PanelPointerLeave { panel: PanelId },
    /// Pointer entered the hover-menu button of a panel
    TriggerEnter { panel: PanelId },
    /// Pointer left the hover-menu button of a panel
    TriggerLeave { panel: PanelId },
    /// Primary window moved (physical pixels)
    PrimaryMoved { x: i32, y: i32 },
    PetPointerEnter,
    PetPointerLeave,
    MenuPointerEnter,
    /// Any other user interaction (click, typing)
    Interaction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_json() {
        let event: PetEvent =
            serde_json::from_str(r#"{"type":"trigger-enter","panel":"todo"}"#).unwrap();
        assert_eq!(
            event,
            PetEvent::TriggerEnter {
                panel: PanelId::todo()
            }
        );

        let moved: PetEvent =
            serde_json::from_str(r#"{"type":"primary-moved","x":10,"y":-4}"#).unwrap();
        assert_eq!(moved, PetEvent::PrimaryMoved { x: 10, y: -4 });

        let json = serde_json::to_string(&PetEvent::SettingsChanged).unwrap();
        assert_eq!(json, r#"{"type":"settings-changed"}"#);
    }

    #[test]
    fn test_todos_changed_tag() {
        let event: PetEvent = serde_json::from_str(r#"{"type":"todos-changed"}"#).unwrap();
        assert_eq!(event, PetEvent::TodosChanged);
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<PetEvent>(r#"{"type":"teleport"}"#).is_err());
    }
}
