#![forbid(unsafe_code)]

//! Workspace layout engine: a splittable, persistable arrangement of
//! tab/accordion panes tiling a character grid.
//!
//! # Role in panekit
//! This crate is the engine behind a terminal IDE's workspace: it keeps
//! a mutating tree of split and leaf nodes with proportional sizing,
//! routes mouse presses to tab and header chrome, and round-trips the
//! whole structure through a persisted snapshot for session restore.
//!
//! # This crate provides
//! - [`Pane`]: a leaf hosting elements as tabs or an accordion.
//! - [`PaneContainer`]: tree orchestration — split, close, ratio
//!   adjustment, element moves, point lookup, rendering, persistence.
//! - [`snapshot`]: the mutually recursive persisted layout records.
//! - [`Direction`] and the ratio invariants of split nodes.
//!
//! # How it fits in the system
//! Everything outside the tree is a contract from `panekit-core`: the
//! host callback bundle, the element factory, the screen buffer, and
//! the focus-resolver queries an external focus manager consumes. The
//! engine is synchronous and single-threaded; the host drives it and
//! owns redraw scheduling.
//!
//! # Invariants
//! - Split nodes always hold at least two children; closing down to one
//!   collapses the split.
//! - `ratios.len() == children.len()` and ratios sum to 1 within
//!   [`RATIO_SUM_TOLERANCE`] after every mutation.
//! - The flat pane registry agrees exactly with the leaves reachable
//!   from the root.
//! - In tabs mode a non-empty pane has exactly one visible element, the
//!   active tab.

/// The pane container and layout math.
pub mod container;
/// Engine error types.
pub mod error;
/// Leaf panes hosting tabbed or accordion content.
pub mod pane;
/// Persisted layout schema.
pub mod snapshot;
/// Split-tree model.
pub mod tree;

#[cfg(test)]
pub(crate) mod testutil;

pub use container::{PaneContainer, RESERVED_BOTTOM_ROWS_SETTING};
pub use error::LayoutError;
pub use pane::{Pane, PaneMode};
pub use snapshot::{ElementConfig, NodeConfig, PaneConfig, SnapshotError, SplitConfig};
pub use tree::{Direction, RATIO_SUM_TOLERANCE};

pub use panekit_core::{
    CloseDecision, Element, ElementFactory, ElementFactoryError, ElementId, ElementSeed,
    FocusResolver, MouseButton, MouseEvent, MouseEventKind, PaneId, Rect, ScreenBuffer, SplitId,
    WorkspaceHost,
};
