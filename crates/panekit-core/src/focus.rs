#![forbid(unsafe_code)]

//! Narrow pane/element query surface for an external focus manager.
//!
//! The focus manager decides where keystrokes go but must not depend on
//! tree internals, so the container exposes exactly these five queries
//! and nothing more.

use crate::element::Element;
use crate::ids::{ElementId, PaneId};

/// Queries a focus manager may run against the pane container.
pub trait FocusResolver {
    /// All leaf pane ids, in depth-first tree order.
    fn pane_ids(&self) -> Vec<PaneId>;

    /// Look up an element anywhere in the workspace.
    fn element(&self, id: ElementId) -> Option<&dyn Element>;

    /// The pane owning the given element, if any.
    fn pane_for_element(&self, id: ElementId) -> Option<PaneId>;

    /// The element that should receive focus inside a pane: the active
    /// tab in tabs mode; the first visible section in accordion mode,
    /// falling back to the first element.
    fn active_element_in_pane(&self, pane: PaneId) -> Option<ElementId>;

    /// All element ids owned by a pane, in presentation order.
    fn elements_in_pane(&self, pane: PaneId) -> Vec<ElementId>;
}
