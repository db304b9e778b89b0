#![forbid(unsafe_code)]

//! Element capability contract and factory.
//!
//! An element is any unit of content hostable in a pane: an editor, a
//! file tree, a terminal session. The engine never sees a concrete kind;
//! it holds `Box<dyn Element>` and dispatches through this contract plus
//! a string type tag used to re-instantiate elements from persisted
//! layouts.
//!
//! Ownership rule: an element belongs to exactly one pane at a time.
//! Moving one between panes is detach-then-attach under a single
//! synchronous call; mount/unmount fire only at creation and
//! destruction, never on a move.

use std::fmt;

use serde_json::Value;

use crate::buffer::ScreenBuffer;
use crate::geometry::Rect;
use crate::ids::ElementId;

/// Capability contract every hosted element implements.
pub trait Element {
    /// Stable identifier, unique within the owning pane.
    fn id(&self) -> ElementId;

    /// Type tag used to rebuild this element through a factory.
    fn type_tag(&self) -> &str;

    /// Title shown in tab bars and accordion headers.
    fn title(&self) -> String;

    /// Optional short status shown in accordion headers.
    fn status(&self) -> Option<String> {
        None
    }

    /// Called once when the element joins a pane for the first time.
    fn on_mount(&mut self) {}

    /// Called once when the element is destroyed.
    fn on_unmount(&mut self) {}

    /// Called whenever the element becomes visible or hidden.
    fn on_visibility_change(&mut self, _visible: bool) {}

    /// Assign the content rectangle this element may draw into.
    fn set_bounds(&mut self, bounds: Rect);

    /// Current content rectangle.
    fn bounds(&self) -> Rect;

    /// Draw into the host-provided grid, within the assigned bounds.
    fn render(&mut self, buffer: &mut dyn ScreenBuffer);

    /// Opaque serializable state for session persistence.
    fn state(&self) -> Value {
        Value::Null
    }

    /// Restore previously persisted state.
    fn restore_state(&mut self, _state: Value) {}
}

/// Creation arguments handed to an [`ElementFactory`].
///
/// `id` is `Some` when rebuilding from a persisted layout and `None` for
/// fresh elements, in which case the factory allocates one.
#[derive(Debug, Clone, Default)]
pub struct ElementSeed {
    /// Persisted id to reuse, if any.
    pub id: Option<ElementId>,
    /// Initial title override.
    pub title: Option<String>,
    /// Persisted state blob to restore.
    pub state: Option<Value>,
}

impl ElementSeed {
    /// Seed for a brand-new element with an optional title.
    #[must_use]
    pub fn fresh(title: Option<&str>) -> Self {
        Self {
            id: None,
            title: title.map(str::to_owned),
            state: None,
        }
    }

    /// Seed that rebuilds a persisted element.
    #[must_use]
    pub fn persisted(id: ElementId, title: String, state: Value) -> Self {
        Self {
            id: Some(id),
            title: Some(title),
            state: Some(state),
        }
    }
}

/// External factory that turns type tags into concrete elements.
///
/// The engine owns no concrete element types; hosts register whatever
/// kinds they support and the factory is the only place that knows them.
pub trait ElementFactory {
    /// Construct an element of the given type.
    fn create(
        &mut self,
        type_tag: &str,
        seed: ElementSeed,
    ) -> Result<Box<dyn Element>, ElementFactoryError>;
}

/// Errors from element construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementFactoryError {
    /// The factory has no constructor registered for this tag.
    UnknownType { type_tag: String },
    /// The factory rejected the seed (bad persisted state, exhausted ids).
    Rejected { type_tag: String, reason: String },
}

impl fmt::Display for ElementFactoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType { type_tag } => {
                write!(f, "no element constructor registered for {type_tag:?}")
            }
            Self::Rejected { type_tag, reason } => {
                write!(f, "factory rejected {type_tag:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for ElementFactoryError {}
