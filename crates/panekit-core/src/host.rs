#![forbid(unsafe_code)]

//! Host callback bundle.
//!
//! The engine is driven by an external application (command dispatch,
//! redraw scheduling, theming, settings). Rather than reaching into
//! ambient state, every pane and the container hold one shared
//! [`WorkspaceHost`] trait object passed at construction and report
//! through it. All methods have defaults so hosts override only the
//! hooks they care about.

use crate::element::Element;
use crate::ids::{ElementId, PaneId};

/// Answer from the element close-veto gate.
///
/// `Deferred` is the synchronous rendering of an asynchronous veto (for
/// example a "save before closing?" dialog): the engine records the
/// element as pending and leaves it untouched until the host resolves
/// the request. At most one veto is in flight per element; further close
/// requests for it are rejected until resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Proceed with the removal now.
    Allow,
    /// Abort the removal; the pane is left exactly as it was.
    Deny,
    /// Decide later via `PaneContainer::resolve_element_close`.
    Deferred,
}

/// Callback bundle the engine reports into.
pub trait WorkspaceHost {
    /// Something changed; a redraw is needed. Idempotent — the host owns
    /// coalescing multiple signals into one repaint.
    fn on_dirty(&self) {}

    /// The user interacted with an element (for example clicked its tab)
    /// and keyboard focus should move to it.
    fn on_focus_request(&self, _element: ElementId) {}

    /// Resolve a theme color key to a concrete color string.
    fn theme_color(&self, _key: &str, fallback: &str) -> String {
        fallback.to_string()
    }

    /// Numeric settings lookup.
    fn setting_u16(&self, _key: &str, default: u16) -> u16 {
        default
    }

    /// Whether the pane currently has keyboard focus. Chrome dims when it
    /// does not.
    fn is_pane_focused(&self, _pane: PaneId) -> bool {
        true
    }

    /// Background color for a chrome category, by focus state.
    fn background_for_focus(&self, category: &str, focused: bool) -> String {
        let key = if focused {
            format!("{category}.background")
        } else {
            format!("{category}.inactiveBackground")
        };
        self.theme_color(&key, "#1e1e1e")
    }

    /// Foreground color for a chrome category, by focus state.
    fn foreground_for_focus(&self, category: &str, focused: bool) -> String {
        let key = if focused {
            format!("{category}.foreground")
        } else {
            format!("{category}.inactiveForeground")
        };
        self.theme_color(&key, "#d4d4d4")
    }

    /// Selection/highlight background for a chrome category, by focus state.
    fn selection_background(&self, category: &str, focused: bool) -> String {
        let key = if focused {
            format!("{category}.activeSelectionBackground")
        } else {
            format!("{category}.inactiveSelectionBackground")
        };
        self.theme_color(&key, "#264f78")
    }

    /// Fired just before an element is removed through a tab-close click,
    /// so the host can release resources tied to it.
    fn on_element_close(&self, _element: ElementId, _handle: &dyn Element) {}

    /// Veto gate for element removal. `Allow` is the default.
    fn on_element_close_request(
        &self,
        _element: ElementId,
        _handle: &dyn Element,
    ) -> CloseDecision {
        CloseDecision::Allow
    }

    /// The tab bar overflowed and the overflow indicator was clicked; the
    /// host may present a dropdown listing the hidden tabs.
    fn on_show_tab_dropdown(&self, _pane: PaneId) {}
}

/// Host that accepts every default. Useful for tests and headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHost;

impl WorkspaceHost for NullHost {}
