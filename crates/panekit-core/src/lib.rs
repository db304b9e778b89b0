#![forbid(unsafe_code)]

//! Shared vocabulary for the panekit workspace engine.
//!
//! # Role in panekit
//! `panekit-core` holds the types both the layout engine and its host
//! agree on: cell-grid geometry, mouse input, the screen-buffer contract,
//! the element capability contract, and the host callback bundle.
//!
//! # This crate provides
//! - [`geometry::Rect`] for layout bounds and hit testing.
//! - [`event::MouseEvent`] and friends for pointer input.
//! - [`buffer::ScreenBuffer`], the character grid the engine draws into.
//! - [`element::Element`] and [`element::ElementFactory`], the pluggable
//!   content contract.
//! - [`host::WorkspaceHost`], the callback bundle the engine reports into.
//! - [`focus::FocusResolver`], the narrow query surface an external focus
//!   manager consumes.
//!
//! # How it fits in the system
//! `panekit-layout` builds the pane tree and container on top of these
//! contracts. Concrete elements, the terminal driver, the theme store,
//! and the focus manager all live with the host; this crate keeps the
//! seam between them explicit and dependency-free.

/// Character grid contract consumed during rendering.
pub mod buffer;
/// Element capability contract and factory.
pub mod element;
/// Mouse input types.
pub mod event;
/// Narrow pane/element query surface for an external focus manager.
pub mod focus;
/// Geometric primitives.
pub mod geometry;
/// Host callback bundle.
pub mod host;
/// Stable identifiers for panes, splits, and elements.
pub mod ids;

pub use buffer::ScreenBuffer;
pub use element::{Element, ElementFactory, ElementFactoryError, ElementSeed};
pub use event::{MouseButton, MouseEvent, MouseEventKind};
pub use focus::FocusResolver;
pub use geometry::Rect;
pub use host::{CloseDecision, WorkspaceHost};
pub use ids::{ElementId, PaneId, SplitId};
