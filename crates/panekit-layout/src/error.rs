#![forbid(unsafe_code)]

//! Engine error types.

use std::fmt;

use panekit_core::{ElementFactoryError, PaneId};

use crate::snapshot::SnapshotError;

/// Errors from fallible engine operations.
///
/// Expected runtime conditions (unknown element on removal, unknown
/// split on a ratio change) are reported as `bool`/`Option` returns, not
/// through this type; these variants indicate caller bugs or bad
/// persisted data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// A pane id that is not in the registry was passed in.
    UnknownPane { pane: PaneId },
    /// The element factory refused to build an element.
    Factory(ElementFactoryError),
    /// A persisted layout failed structural validation.
    Snapshot(SnapshotError),
    /// The flat pane registry disagrees with the leaves reachable from
    /// the root. Indicates an engine bug; surfaced by `validate`.
    RegistryDesync { registered: usize, reachable: usize },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPane { pane } => write!(f, "{pane} is not registered"),
            Self::Factory(err) => write!(f, "element factory failed: {err}"),
            Self::Snapshot(err) => write!(f, "invalid layout snapshot: {err}"),
            Self::RegistryDesync {
                registered,
                reachable,
            } => write!(
                f,
                "pane registry holds {registered} pane(s) but {reachable} are reachable"
            ),
        }
    }
}

impl std::error::Error for LayoutError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Factory(err) => Some(err),
            Self::Snapshot(err) => Some(err),
            Self::UnknownPane { .. } | Self::RegistryDesync { .. } => None,
        }
    }
}

impl From<ElementFactoryError> for LayoutError {
    fn from(err: ElementFactoryError) -> Self {
        Self::Factory(err)
    }
}

impl From<SnapshotError> for LayoutError {
    fn from(err: SnapshotError) -> Self {
        Self::Snapshot(err)
    }
}
