#![forbid(unsafe_code)]

//! The pane container: tree orchestration, layout, and persistence.
//!
//! `PaneContainer` owns the layout tree plus a flat id-indexed registry
//! of every leaf pane, kept in exact agreement with the leaves reachable
//! from the root. All structural mutations (split, close, ratio change,
//! element moves) happen here, run to completion synchronously, and end
//! with a single dirty notification to the host.
//!
//! Layout math: a split divides its axis extent proportionally by ratio
//! with integer floor sizing, the trailing child absorbing the rounding
//! remainder so children tile the area exactly. Divider lines are drawn
//! after the leaves, over the trailing edge cell of the child preceding
//! each boundary.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use panekit_core::{
    CloseDecision, Element, ElementFactory, ElementId, FocusResolver, PaneId, Rect, ScreenBuffer,
    SplitId, WorkspaceHost,
};

use crate::error::LayoutError;
use crate::pane::{Pane, PaneMode};
use crate::snapshot::{NodeConfig, PaneConfig, SplitConfig};
use crate::tree::{Direction, LayoutNode, RemoveOutcome, SplitNode, normalize_ratios};

/// Settings key for the bottom strip reserved by the host (for example a
/// docked terminal panel). Applied to non-accordion leaf panes only.
pub const RESERVED_BOTTOM_ROWS_SETTING: &str = "workspace.reserved_bottom_rows";

/// Orchestrates the layout tree.
pub struct PaneContainer {
    root: Option<LayoutNode>,
    panes: FxHashMap<PaneId, Pane>,
    bounds: Rect,
    next_pane_id: u64,
    next_split_id: u64,
    focused: Option<PaneId>,
    /// Elements with an unresolved close veto; at most one per element.
    pending_closes: BTreeSet<ElementId>,
    host: Rc<dyn WorkspaceHost>,
    factory: Rc<RefCell<dyn ElementFactory>>,
}

impl fmt::Debug for PaneContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaneContainer")
            .field("panes", &self.panes.len())
            .field("bounds", &self.bounds)
            .field("focused", &self.focused)
            .finish()
    }
}

impl PaneContainer {
    /// Create an empty container. No panes exist until
    /// [`PaneContainer::ensure_root`] or a deserialize call.
    #[must_use]
    pub fn new(host: Rc<dyn WorkspaceHost>, factory: Rc<RefCell<dyn ElementFactory>>) -> Self {
        Self {
            root: None,
            panes: FxHashMap::default(),
            bounds: Rect::default(),
            next_pane_id: 1,
            next_split_id: 1,
            focused: None,
            pending_closes: BTreeSet::new(),
            host,
            factory,
        }
    }

    // =====================================================================
    // Queries
    // =====================================================================

    /// Number of registered leaf panes.
    #[must_use]
    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    /// Look up a pane by id.
    #[must_use]
    pub fn get_pane(&self, pane: PaneId) -> Option<&Pane> {
        self.panes.get(&pane)
    }

    /// Look up a pane by id, mutably.
    pub fn get_pane_mut(&mut self, pane: PaneId) -> Option<&mut Pane> {
        self.panes.get_mut(&pane)
    }

    /// The pane currently holding workspace focus, if any.
    #[must_use]
    pub const fn focused_pane(&self) -> Option<PaneId> {
        self.focused
    }

    /// Move workspace focus to a pane. Returns whether the pane exists.
    pub fn focus_pane(&mut self, pane: PaneId) -> bool {
        if !self.panes.contains_key(&pane) {
            return false;
        }
        if self.focused != Some(pane) {
            self.focused = Some(pane);
            self.host.on_dirty();
        }
        true
    }

    /// Container bounds as last assigned by the host.
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        self.bounds
    }

    /// All split node ids in depth-first order.
    #[must_use]
    pub fn split_ids(&self) -> Vec<SplitId> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            root.collect_split_ids(&mut out);
        }
        out
    }

    /// The unique leaf pane whose rectangle contains the point, if any.
    ///
    /// Leaf rectangles tile the root rectangle, so at most one pane can
    /// match.
    #[must_use]
    pub fn find_pane_at_point(&self, x: u16, y: u16) -> Option<PaneId> {
        if !self.bounds.contains(x, y) {
            return None;
        }
        let mut leaves = Vec::new();
        if let Some(root) = &self.root {
            root.collect_leaves(&mut leaves);
        }
        leaves.into_iter().find(|id| {
            self.panes
                .get(id)
                .is_some_and(|pane| pane.bounds().contains(x, y))
        })
    }

    /// Check registry/tree agreement and structural invariants.
    ///
    /// Cheap enough for debug assertions; any error here is an engine
    /// bug, not a data condition.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let Some(root) = &self.root else {
            if self.panes.is_empty() {
                return Ok(());
            }
            return Err(LayoutError::RegistryDesync {
                registered: self.panes.len(),
                reachable: 0,
            });
        };
        self.serialize_node(root).validate()?;
        let mut leaves = Vec::new();
        root.collect_leaves(&mut leaves);
        if leaves.len() != self.panes.len()
            || leaves.iter().any(|id| !self.panes.contains_key(id))
        {
            return Err(LayoutError::RegistryDesync {
                registered: self.panes.len(),
                reachable: leaves.len(),
            });
        }
        Ok(())
    }

    // =====================================================================
    // Tree mutation
    // =====================================================================

    /// Create a root pane if none exists; otherwise return the first
    /// leaf. Idempotent.
    pub fn ensure_root(&mut self) -> PaneId {
        if let Some(root) = &self.root {
            return root.first_leaf();
        }
        let id = self.create_pane();
        self.root = Some(LayoutNode::Pane(id));
        if self.focused.is_none() {
            self.focused = Some(id);
        }
        self.relayout_tree();
        self.host.on_dirty();
        id
    }

    /// Assign container bounds and relayout every node.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
        self.relayout_tree();
        self.host.on_dirty();
    }

    /// Split a pane in two along the given direction.
    ///
    /// The target is the explicit pane, else the focused pane, else the
    /// first leaf (created on demand). The original pane keeps its slot
    /// as the first child of a fresh split with an even ratio; the new
    /// pane's id is returned.
    pub fn split(
        &mut self,
        direction: Direction,
        pane: Option<PaneId>,
    ) -> Result<PaneId, LayoutError> {
        let target = match pane.or(self.focused) {
            Some(id) => id,
            None => self.ensure_root(),
        };
        if !self.panes.contains_key(&target) {
            return Err(LayoutError::UnknownPane { pane: target });
        }

        let new_pane = self.create_pane();
        let split_id = SplitId::new(self.next_split_id);
        self.next_split_id += 1;
        let mut replacement = Some(LayoutNode::Split(SplitNode {
            id: split_id,
            direction,
            children: vec![LayoutNode::Pane(target), LayoutNode::Pane(new_pane)],
            ratios: vec![0.5, 0.5],
        }));

        let replaced = match &mut self.root {
            Some(root) => root.replace_pane_leaf(target, &mut replacement),
            None => false,
        };
        if !replaced {
            self.panes.remove(&new_pane);
            return Err(LayoutError::UnknownPane { pane: target });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "panekit::container",
            from = target.get(),
            pane = new_pane.get(),
            split = split_id.get(),
            ?direction,
            "split pane"
        );

        self.relayout_tree();
        self.host.on_dirty();
        Ok(new_pane)
    }

    /// Close a pane: unmount its elements, drop it from the registry,
    /// and repair the tree around it.
    ///
    /// The container never goes empty: closing the sole pane replaces it
    /// with a fresh one. A split left with one child collapses, splicing
    /// the survivor into its place. Focus moves to the first remaining
    /// leaf when the focused pane closes.
    pub fn close(&mut self, pane: PaneId) -> bool {
        let Some(mut closing) = self.panes.remove(&pane) else {
            return false;
        };
        for element in closing.element_ids() {
            self.pending_closes.remove(&element);
        }
        closing.unmount_all();

        let was_sole = matches!(&self.root, Some(LayoutNode::Pane(id)) if *id == pane);
        if was_sole {
            let fresh = self.create_pane();
            self.root = Some(LayoutNode::Pane(fresh));
            self.focused = Some(fresh);
        } else if let Some(root) = &mut self.root {
            match root.remove_pane(pane) {
                RemoveOutcome::Removed => {}
                RemoveOutcome::Collapse(survivor) => *root = survivor,
                RemoveOutcome::NotFound => {}
            }
            if self.focused == Some(pane) {
                self.focused = Some(root.first_leaf());
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "panekit::container",
            pane = pane.get(),
            remaining = self.panes.len(),
            "closed pane"
        );

        self.relayout_tree();
        self.host.on_dirty();
        true
    }

    /// Replace a split's ratios, normalizing them to sum to 1.
    ///
    /// Returns false, leaving the tree untouched, when the split is
    /// unknown, the array length does not match the child count, or any
    /// value is negative or non-finite.
    pub fn adjust_ratios(&mut self, split: SplitId, ratios: &[f64]) -> bool {
        let Some(root) = &mut self.root else {
            return false;
        };
        let Some(node) = root.find_split_mut(split) else {
            return false;
        };
        if node.children.len() != ratios.len() {
            return false;
        }
        if ratios.iter().any(|ratio| !ratio.is_finite() || *ratio < 0.0) {
            return false;
        }
        node.ratios = ratios.to_vec();
        normalize_ratios(&mut node.ratios);

        #[cfg(feature = "tracing")]
        tracing::trace!(target: "panekit::container", split = split.get(), "adjusted ratios");

        self.relayout_tree();
        self.host.on_dirty();
        true
    }

    /// Reverse a split's children and ratios in lockstep, so each child
    /// keeps its size while trading position.
    pub fn swap_split_children(&mut self, split: SplitId) -> bool {
        let Some(root) = &mut self.root else {
            return false;
        };
        let Some(node) = root.find_split_mut(split) else {
            return false;
        };
        node.children.reverse();
        node.ratios.reverse();
        self.relayout_tree();
        self.host.on_dirty();
        true
    }

    // =====================================================================
    // Element conveniences
    // =====================================================================

    /// Add an element to a pane through the factory.
    ///
    /// An unknown pane id is a caller bug and returns an error rather
    /// than a silent miss.
    pub fn add_element(
        &mut self,
        pane: PaneId,
        type_tag: &str,
        title: Option<&str>,
    ) -> Result<ElementId, LayoutError> {
        let Some(target) = self.panes.get_mut(&pane) else {
            return Err(LayoutError::UnknownPane { pane });
        };
        target.add_element(type_tag, title, None)
    }

    /// Remove an element wherever it lives, subject to the host's close
    /// veto gate.
    ///
    /// Returns whether the element was removed now: a denied or deferred
    /// veto leaves the workspace untouched and returns false. While a
    /// veto is pending, further close requests for the same element are
    /// rejected.
    pub fn remove_element(&mut self, element: ElementId) -> bool {
        if self.pending_closes.contains(&element) {
            return false;
        }
        let Some(owner) = self.pane_owning(element) else {
            return false;
        };
        let host = Rc::clone(&self.host);
        let decision = {
            let Some(pane) = self.panes.get(&owner) else {
                return false;
            };
            let Some(handle) = pane.element(element) else {
                return false;
            };
            host.on_element_close_request(element, handle)
        };
        match decision {
            CloseDecision::Allow => self
                .panes
                .get_mut(&owner)
                .is_some_and(|pane| pane.remove_element(element)),
            CloseDecision::Deny => false,
            CloseDecision::Deferred => {
                self.pending_closes.insert(element);
                false
            }
        }
    }

    /// Resolve a deferred close veto.
    ///
    /// Returns whether a pending request existed for the element. With
    /// `allow`, the removal completes now; otherwise the element stays
    /// exactly as it was.
    pub fn resolve_element_close(&mut self, element: ElementId, allow: bool) -> bool {
        if !self.pending_closes.remove(&element) {
            return false;
        }
        if allow
            && let Some(owner) = self.pane_owning(element)
            && let Some(pane) = self.panes.get_mut(&owner)
        {
            pane.remove_element(element);
        }
        true
    }

    /// Move an element to another pane without destroying it.
    ///
    /// Detach and attach happen back-to-back in this call; a move to the
    /// element's own pane is refused.
    pub fn move_element(&mut self, element: ElementId, target_pane: PaneId) -> bool {
        let Some(source) = self.pane_owning(element) else {
            return false;
        };
        if source == target_pane || !self.panes.contains_key(&target_pane) {
            return false;
        }
        let Some(detached) = self
            .panes
            .get_mut(&source)
            .and_then(|pane| pane.detach_element(element))
        else {
            return false;
        };
        if let Some(target) = self.panes.get_mut(&target_pane) {
            target.attach_element(detached);
        }
        true
    }

    fn pane_owning(&self, element: ElementId) -> Option<PaneId> {
        self.panes
            .iter()
            .find(|(_, pane)| pane.has_element(element))
            .map(|(id, _)| *id)
    }

    // =====================================================================
    // Layout
    // =====================================================================

    fn relayout_tree(&mut self) {
        let reserved = self.host.setting_u16(RESERVED_BOTTOM_ROWS_SETTING, 0);
        if let Some(root) = &self.root {
            Self::layout_node(&mut self.panes, root, self.bounds, reserved);
        }
    }

    fn layout_node(
        panes: &mut FxHashMap<PaneId, Pane>,
        node: &LayoutNode,
        area: Rect,
        reserved_bottom: u16,
    ) {
        match node {
            LayoutNode::Pane(id) => {
                if let Some(pane) = panes.get_mut(id) {
                    let mut rect = area;
                    if pane.mode() != PaneMode::Accordion {
                        rect.height = rect.height.saturating_sub(reserved_bottom);
                    }
                    pane.set_bounds(rect);
                }
            }
            LayoutNode::Split(split) => {
                let rects = split_rects(split, area);
                for (child, rect) in split.children.iter().zip(rects) {
                    Self::layout_node(panes, child, rect, reserved_bottom);
                }
            }
        }
    }

    // =====================================================================
    // Rendering
    // =====================================================================

    /// Render every leaf, then the divider lines at internal boundaries.
    pub fn render(&mut self, buffer: &mut dyn ScreenBuffer) {
        let mut leaves = Vec::new();
        if let Some(root) = &self.root {
            root.collect_leaves(&mut leaves);
        }
        for id in leaves {
            if let Some(pane) = self.panes.get_mut(&id) {
                pane.render(buffer);
            }
        }
        let Some(root) = &self.root else {
            return;
        };
        let fg = self.host.theme_color("paneDivider.foreground", "#3c3c3c");
        let bg = self.host.theme_color("paneDivider.background", "#1e1e1e");
        Self::render_dividers(root, self.bounds, buffer, &fg, &bg);
    }

    fn render_dividers(
        node: &LayoutNode,
        area: Rect,
        buffer: &mut dyn ScreenBuffer,
        fg: &str,
        bg: &str,
    ) {
        let LayoutNode::Split(split) = node else {
            return;
        };
        let rects = split_rects(split, area);
        for (index, (child, rect)) in split.children.iter().zip(&rects).enumerate() {
            if index > 0 {
                match split.direction {
                    Direction::Vertical => {
                        let divider_x = rect.x.saturating_sub(1);
                        for y in area.y..area.bottom() {
                            buffer.set_cell(divider_x, y, '│', fg, bg);
                        }
                    }
                    Direction::Horizontal => {
                        let divider_y = rect.y.saturating_sub(1);
                        for x in area.x..area.right() {
                            buffer.set_cell(x, divider_y, '─', fg, bg);
                        }
                    }
                }
            }
            Self::render_dividers(child, *rect, buffer, fg, bg);
        }
    }

    // =====================================================================
    // Persistence
    // =====================================================================

    /// Structural snapshot of the whole tree, or `None` when empty.
    #[must_use]
    pub fn serialize(&self) -> Option<NodeConfig> {
        self.root.as_ref().map(|root| self.serialize_node(root))
    }

    fn serialize_node(&self, node: &LayoutNode) -> NodeConfig {
        match node {
            LayoutNode::Pane(id) => NodeConfig::Pane(
                self.panes
                    .get(id)
                    .map(Pane::serialize)
                    .unwrap_or_else(|| PaneConfig {
                        id: *id,
                        mode: PaneMode::Tabs,
                        elements: Vec::new(),
                        active_element_id: None,
                        expanded_element_ids: None,
                    }),
            ),
            LayoutNode::Split(split) => NodeConfig::Split(SplitConfig {
                id: split.id,
                direction: split.direction,
                children: split
                    .children
                    .iter()
                    .map(|child| self.serialize_node(child))
                    .collect(),
                ratios: split.ratios.clone(),
            }),
        }
    }

    /// Rebuild the whole tree from a snapshot.
    ///
    /// The config is validated and every pane is constructed before the
    /// existing tree is torn down, so a bad snapshot leaves the
    /// workspace as it was.
    pub fn deserialize(&mut self, config: &NodeConfig) -> Result<(), LayoutError> {
        config.validate()?;

        let mut panes = FxHashMap::default();
        let mut next_pane_id = self.next_pane_id;
        let mut next_split_id = self.next_split_id;
        let root = match self.build_node(config, &mut panes, &mut next_pane_id, &mut next_split_id)
        {
            Ok(root) => root,
            Err(err) => {
                // Elements mounted for the abandoned build get their
                // unmount before the panes are dropped.
                for pane in panes.values_mut() {
                    pane.unmount_all();
                }
                return Err(err);
            }
        };

        for pane in self.panes.values_mut() {
            pane.unmount_all();
        }
        self.panes = panes;
        self.pending_closes.clear();
        self.root = Some(root);
        self.next_pane_id = next_pane_id;
        self.next_split_id = next_split_id;
        self.focused = self.root.as_ref().map(LayoutNode::first_leaf);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "panekit::container",
            panes = self.panes.len(),
            "restored workspace layout"
        );

        self.relayout_tree();
        self.host.on_dirty();
        Ok(())
    }

    fn build_node(
        &self,
        config: &NodeConfig,
        panes: &mut FxHashMap<PaneId, Pane>,
        next_pane_id: &mut u64,
        next_split_id: &mut u64,
    ) -> Result<LayoutNode, LayoutError> {
        match config {
            NodeConfig::Pane(pane_config) => {
                let mut pane = Pane::new(
                    pane_config.id,
                    Rc::clone(&self.host),
                    Rc::clone(&self.factory),
                );
                pane.deserialize(pane_config)?;
                *next_pane_id = (*next_pane_id).max(pane_config.id.get() + 1);
                panes.insert(pane_config.id, pane);
                Ok(LayoutNode::Pane(pane_config.id))
            }
            NodeConfig::Split(split_config) => {
                let mut children = Vec::with_capacity(split_config.children.len());
                for child in &split_config.children {
                    children.push(self.build_node(child, panes, next_pane_id, next_split_id)?);
                }
                let mut ratios = split_config.ratios.clone();
                normalize_ratios(&mut ratios);
                *next_split_id = (*next_split_id).max(split_config.id.get() + 1);
                Ok(LayoutNode::Split(SplitNode {
                    id: split_config.id,
                    direction: split_config.direction,
                    children,
                    ratios,
                }))
            }
        }
    }

    fn create_pane(&mut self) -> PaneId {
        let id = PaneId::new(self.next_pane_id);
        self.next_pane_id += 1;
        let pane = Pane::new(id, Rc::clone(&self.host), Rc::clone(&self.factory));
        self.panes.insert(id, pane);
        id
    }
}

impl FocusResolver for PaneContainer {
    fn pane_ids(&self) -> Vec<PaneId> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            root.collect_leaves(&mut out);
        }
        out
    }

    fn element(&self, id: ElementId) -> Option<&dyn Element> {
        self.panes.values().find_map(|pane| pane.element(id))
    }

    fn pane_for_element(&self, id: ElementId) -> Option<PaneId> {
        self.pane_owning(id)
    }

    fn active_element_in_pane(&self, pane: PaneId) -> Option<ElementId> {
        self.panes.get(&pane).and_then(Pane::focus_target)
    }

    fn elements_in_pane(&self, pane: PaneId) -> Vec<ElementId> {
        self.panes
            .get(&pane)
            .map(Pane::element_ids)
            .unwrap_or_default()
    }
}

/// Divide a split's area among its children.
///
/// Children are placed contiguously along the split axis: every child
/// but the last gets `floor(extent * ratio)` cells and the trailing
/// child absorbs the rounding remainder, so the children always tile
/// the area exactly. The divider line rendered at each boundary
/// overlays the trailing edge cell of the preceding child.
fn split_rects(split: &SplitNode, area: Rect) -> Vec<Rect> {
    let count = split.children.len();
    let extent = match split.direction {
        Direction::Vertical => area.width,
        Direction::Horizontal => area.height,
    };
    let mut sizes = Vec::with_capacity(count);
    let mut used: u16 = 0;
    for (index, ratio) in split.ratios.iter().enumerate() {
        let size = if index + 1 == count {
            extent.saturating_sub(used)
        } else {
            let share = (f64::from(extent) * ratio).floor() as u16;
            share.min(extent.saturating_sub(used))
        };
        sizes.push(size);
        used = used.saturating_add(size);
    }

    let mut rects = Vec::with_capacity(count);
    let mut offset = match split.direction {
        Direction::Vertical => area.x,
        Direction::Horizontal => area.y,
    };
    for size in sizes {
        rects.push(match split.direction {
            Direction::Vertical => Rect::new(offset, area.y, size, area.height),
            Direction::Horizontal => Rect::new(area.x, offset, area.width, size),
        });
        offset = offset.saturating_add(size);
    }
    rects
}
