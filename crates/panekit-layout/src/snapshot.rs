#![forbid(unsafe_code)]

//! Persisted layout schema.
//!
//! Two mutually recursive record shapes describe a workspace: a pane
//! config (mode, ordered element descriptors, selection state) and a
//! split config (direction, children, ratios). Field names follow the
//! wire format consumed by session persistence, so snapshots written by
//! other frontends of the same format load unchanged.
//!
//! Deserialization is validated up front ([`NodeConfig::validate`])
//! before any live state is touched: a malformed snapshot never
//! half-applies.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use panekit_core::{ElementId, PaneId, SplitId};

use crate::pane::PaneMode;
use crate::tree::Direction;

/// Persisted descriptor for one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementConfig {
    /// Factory type tag.
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Element id, unique within the snapshot.
    pub id: ElementId,
    /// Display title.
    pub title: String,
    /// Opaque element state blob.
    #[serde(default)]
    pub state: Value,
}

/// Persisted descriptor for one leaf pane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneConfig {
    pub id: PaneId,
    pub mode: PaneMode,
    pub elements: Vec<ElementConfig>,
    /// Active tab, tabs mode only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_element_id: Option<ElementId>,
    /// Expanded sections, accordion mode only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_element_ids: Option<Vec<ElementId>>,
}

/// Persisted descriptor for one split node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub id: SplitId,
    pub direction: Direction,
    pub children: Vec<NodeConfig>,
    pub ratios: Vec<f64>,
}

/// A node of the persisted tree.
///
/// Untagged: a split is recognized by its `direction`/`children` fields,
/// a pane by `mode`/`elements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeConfig {
    Split(SplitConfig),
    Pane(PaneConfig),
}

impl NodeConfig {
    /// Check structural invariants before the snapshot touches live state.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut pane_ids = Vec::new();
        let mut element_ids = Vec::new();
        self.validate_node(&mut pane_ids, &mut element_ids)
    }

    fn validate_node(
        &self,
        pane_ids: &mut Vec<PaneId>,
        element_ids: &mut Vec<ElementId>,
    ) -> Result<(), SnapshotError> {
        match self {
            Self::Pane(pane) => {
                if pane_ids.contains(&pane.id) {
                    return Err(SnapshotError::DuplicatePaneId { pane: pane.id });
                }
                pane_ids.push(pane.id);
                for element in &pane.elements {
                    if element_ids.contains(&element.id) {
                        return Err(SnapshotError::DuplicateElementId {
                            element: element.id,
                        });
                    }
                    element_ids.push(element.id);
                }
                Ok(())
            }
            Self::Split(split) => {
                if split.children.len() < 2 {
                    return Err(SnapshotError::UnarySplit {
                        split: split.id,
                        children: split.children.len(),
                    });
                }
                if split.ratios.len() != split.children.len() {
                    return Err(SnapshotError::RatioArityMismatch {
                        split: split.id,
                        children: split.children.len(),
                        ratios: split.ratios.len(),
                    });
                }
                if split
                    .ratios
                    .iter()
                    .any(|ratio| !ratio.is_finite() || *ratio < 0.0)
                {
                    return Err(SnapshotError::InvalidRatio { split: split.id });
                }
                for child in &split.children {
                    child.validate_node(pane_ids, element_ids)?;
                }
                Ok(())
            }
        }
    }
}

/// Errors from snapshot validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// A split node carries fewer than two children.
    UnarySplit { split: SplitId, children: usize },
    /// A split's ratio array does not match its child count.
    RatioArityMismatch {
        split: SplitId,
        children: usize,
        ratios: usize,
    },
    /// A ratio is negative, NaN, or infinite.
    InvalidRatio { split: SplitId },
    /// The same pane id appears twice.
    DuplicatePaneId { pane: PaneId },
    /// The same element id appears twice.
    DuplicateElementId { element: ElementId },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnarySplit { split, children } => {
                write!(f, "{split} has {children} child(ren), needs at least 2")
            }
            Self::RatioArityMismatch {
                split,
                children,
                ratios,
            } => write!(
                f,
                "{split} has {children} children but {ratios} ratio(s)"
            ),
            Self::InvalidRatio { split } => {
                write!(f, "{split} carries a negative or non-finite ratio")
            }
            Self::DuplicatePaneId { pane } => write!(f, "duplicate {pane} in snapshot"),
            Self::DuplicateElementId { element } => {
                write!(f, "duplicate {element} in snapshot")
            }
        }
    }
}

impl std::error::Error for SnapshotError {}
