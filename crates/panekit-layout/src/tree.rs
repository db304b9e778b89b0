#![forbid(unsafe_code)]

//! Split-tree model.
//!
//! The layout tree is a strictly owned recursive structure: split nodes
//! own an ordered list of children, leaves carry pane ids into the
//! container's flat registry. There are no parent back-pointers; "parent
//! of X" is computed by a depth-first walk on demand, which keeps the
//! tree trivially serializable and impossible to leave with a dangling
//! parent. Trees are shallow (bounded by user-initiated splits), so the
//! walk cost is irrelevant.

use serde::{Deserialize, Serialize};

use panekit_core::{PaneId, SplitId};

/// Ratio sums are considered normalized within this tolerance.
pub const RATIO_SUM_TOLERANCE: f64 = 1e-9;

/// Orientation of a split node.
///
/// `Horizontal` stacks children top-to-bottom (a row split dividing
/// height); `Vertical` places them side-by-side (a column split dividing
/// width).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Horizontal,
    Vertical,
}

/// A node of the layout tree: a leaf pane reference or a nested split.
#[derive(Debug)]
pub(crate) enum LayoutNode {
    Pane(PaneId),
    Split(SplitNode),
}

/// Internal tree node dividing space between two or more children.
///
/// Invariants, upheld by every mutation in this crate:
/// - `children.len() >= 2`
/// - `ratios.len() == children.len()`
/// - `ratios` sums to 1 within [`RATIO_SUM_TOLERANCE`]
#[derive(Debug)]
pub(crate) struct SplitNode {
    pub(crate) id: SplitId,
    pub(crate) direction: Direction,
    pub(crate) children: Vec<LayoutNode>,
    pub(crate) ratios: Vec<f64>,
}

/// Result of removing a pane from a subtree.
#[derive(Debug)]
pub(crate) enum RemoveOutcome {
    /// The pane is not in this subtree.
    NotFound,
    /// Removed; the subtree is still structurally valid.
    Removed,
    /// Removed, and the split it lived in dropped to a single child; the
    /// caller must splice this survivor into the removed split's place.
    Collapse(LayoutNode),
}

impl LayoutNode {
    /// First leaf in depth-first order.
    pub(crate) fn first_leaf(&self) -> PaneId {
        match self {
            Self::Pane(id) => *id,
            Self::Split(split) => split.children[0].first_leaf(),
        }
    }

    /// Collect all leaf pane ids in depth-first order.
    pub(crate) fn collect_leaves(&self, out: &mut Vec<PaneId>) {
        match self {
            Self::Pane(id) => out.push(*id),
            Self::Split(split) => {
                for child in &split.children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Collect all split ids in depth-first order.
    pub(crate) fn collect_split_ids(&self, out: &mut Vec<SplitId>) {
        if let Self::Split(split) = self {
            out.push(split.id);
            for child in &split.children {
                child.collect_split_ids(out);
            }
        }
    }

    /// Find a split node by id.
    pub(crate) fn find_split(&self, id: SplitId) -> Option<&SplitNode> {
        match self {
            Self::Pane(_) => None,
            Self::Split(split) => {
                if split.id == id {
                    return Some(split);
                }
                split.children.iter().find_map(|child| child.find_split(id))
            }
        }
    }

    /// Find a split node by id, mutably.
    pub(crate) fn find_split_mut(&mut self, id: SplitId) -> Option<&mut SplitNode> {
        match self {
            Self::Pane(_) => None,
            Self::Split(split) => {
                if split.id == id {
                    return Some(split);
                }
                split
                    .children
                    .iter_mut()
                    .find_map(|child| child.find_split_mut(id))
            }
        }
    }

    /// Replace the leaf carrying `target` with the node in `replacement`.
    ///
    /// Returns whether the leaf was found; the replacement is consumed
    /// only on a match. Used by `split`, where the replacement is a
    /// fresh two-child split wrapping the old leaf.
    pub(crate) fn replace_pane_leaf(
        &mut self,
        target: PaneId,
        replacement: &mut Option<LayoutNode>,
    ) -> bool {
        match self {
            Self::Pane(id) if *id == target => match replacement.take() {
                Some(node) => {
                    *self = node;
                    true
                }
                None => false,
            },
            Self::Pane(_) => false,
            Self::Split(split) => split
                .children
                .iter_mut()
                .any(|child| child.replace_pane_leaf(target, replacement)),
        }
    }

    /// Remove the leaf carrying `target` from this subtree.
    ///
    /// Splits that drop below two children collapse: the lone survivor is
    /// spliced into the split's place, recursively up to the caller when
    /// the split is this node itself.
    pub(crate) fn remove_pane(&mut self, target: PaneId) -> RemoveOutcome {
        let Self::Split(split) = self else {
            return RemoveOutcome::NotFound;
        };

        if let Some(index) = split
            .children
            .iter()
            .position(|child| matches!(child, Self::Pane(id) if *id == target))
        {
            let _ = split.children.remove(index);
            let _ = split.ratios.remove(index);
            if split.children.len() == 1 {
                return RemoveOutcome::Collapse(split.children.remove(0));
            }
            normalize_ratios(&mut split.ratios);
            return RemoveOutcome::Removed;
        }

        for child in &mut split.children {
            match child.remove_pane(target) {
                RemoveOutcome::NotFound => {}
                RemoveOutcome::Removed => return RemoveOutcome::Removed,
                RemoveOutcome::Collapse(survivor) => {
                    *child = survivor;
                    return RemoveOutcome::Removed;
                }
            }
        }
        RemoveOutcome::NotFound
    }
}

/// Scale ratios so they sum to 1.
///
/// A degenerate sum (zero, negative, or non-finite, possible only from
/// hand-edited persisted layouts) falls back to an even redistribution
/// instead of propagating NaN into the tree. An already-normalized array
/// is left bit-for-bit untouched so persisted ratios round-trip exactly.
pub(crate) fn normalize_ratios(ratios: &mut [f64]) {
    if ratios.is_empty() {
        return;
    }
    let sum: f64 = ratios.iter().sum();
    if !sum.is_finite() || sum <= RATIO_SUM_TOLERANCE {
        let even = 1.0 / ratios.len() as f64;
        ratios.fill(even);
        return;
    }
    if (sum - 1.0).abs() <= RATIO_SUM_TOLERANCE {
        return;
    }
    for ratio in ratios.iter_mut() {
        *ratio /= sum;
    }
}
