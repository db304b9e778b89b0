#![forbid(unsafe_code)]

//! Leaf panes hosting tabbed or accordion content.
//!
//! A pane owns an ordered list of elements and presents them in one of
//! two modes: tabs (one visible element selected through a tab bar) or
//! accordion (every element gets a persistent header row and may be
//! independently expanded). The pane draws its own chrome, lays out
//! element content inside its rectangle, and hit-tests mouse presses
//! against tab spans and header rows.
//!
//! Visibility bookkeeping is the load-bearing part: elements are told
//! exactly when they become visible or hidden, mount fires once per
//! element lifetime before the first visibility signal, and unmount
//! fires once after the last. Moves between panes go through
//! [`Pane::detach_element`]/[`Pane::attach_element`], which toggle
//! visibility without destroying the element.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use panekit_core::{
    Element, ElementFactory, ElementId, ElementSeed, MouseButton, MouseEvent, MouseEventKind,
    PaneId, Rect, ScreenBuffer, WorkspaceHost,
};

use crate::error::LayoutError;
use crate::snapshot::{ElementConfig, PaneConfig};

/// Tab titles wider than this are truncated with an ellipsis.
const TAB_TITLE_MAX_WIDTH: u16 = 20;

/// Trailing cells of a tab span that act as its close button.
const TAB_CLOSE_CELLS: u16 = 2;

/// Hint drawn in the content area of an empty tabs pane.
const EMPTY_PANE_HINT: &str = "empty pane";

/// How a pane presents its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaneMode {
    Tabs,
    Accordion,
}

/// Horizontal span of one tab in the tab bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TabSpan {
    index: usize,
    x: u16,
    width: u16,
}

/// Solved tab bar: visible spans plus the overflow indicator cell, if
/// the bar could not fit every tab.
#[derive(Debug, Clone)]
struct TabLayout {
    spans: Vec<TabSpan>,
    overflow_x: Option<u16>,
}

/// One accordion header row.
#[derive(Debug, Clone, Copy)]
struct AccordionRow {
    index: usize,
    header_y: u16,
    expanded: bool,
    content_height: u16,
}

/// A leaf of the layout tree.
pub struct Pane {
    id: PaneId,
    mode: PaneMode,
    elements: Vec<Box<dyn Element>>,
    /// Active tab index; `None` exactly when the pane is empty (tabs mode).
    active: Option<usize>,
    /// Expanded section ids, always a subset of owned ids (accordion mode).
    expanded: BTreeSet<ElementId>,
    bounds: Rect,
    host: Rc<dyn WorkspaceHost>,
    factory: Rc<RefCell<dyn ElementFactory>>,
}

impl fmt::Debug for Pane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pane")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("elements", &self.elements.len())
            .field("active", &self.active)
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl Pane {
    pub(crate) fn new(
        id: PaneId,
        host: Rc<dyn WorkspaceHost>,
        factory: Rc<RefCell<dyn ElementFactory>>,
    ) -> Self {
        Self {
            id,
            mode: PaneMode::Tabs,
            elements: Vec::new(),
            active: None,
            expanded: BTreeSet::new(),
            bounds: Rect::default(),
            host,
            factory,
        }
    }

    // =====================================================================
    // Queries
    // =====================================================================

    /// Immutable id assigned at creation.
    #[must_use]
    pub const fn id(&self) -> PaneId {
        self.id
    }

    /// Current presentation mode.
    #[must_use]
    pub const fn mode(&self) -> PaneMode {
        self.mode
    }

    /// Number of owned elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Owned element ids in presentation order.
    #[must_use]
    pub fn element_ids(&self) -> Vec<ElementId> {
        self.elements.iter().map(|element| element.id()).collect()
    }

    /// Whether this pane owns the given element.
    #[must_use]
    pub fn has_element(&self, id: ElementId) -> bool {
        self.index_of(id).is_some()
    }

    /// Look up an owned element.
    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<&dyn Element> {
        self.elements
            .iter()
            .find(|element| element.id() == id)
            .map(|element| element.as_ref())
    }

    /// Active tab index (tabs mode; `None` when empty).
    #[must_use]
    pub const fn active_element_index(&self) -> Option<usize> {
        self.active
    }

    /// Active tab id (tabs mode).
    #[must_use]
    pub fn active_element_id(&self) -> Option<ElementId> {
        self.active
            .and_then(|index| self.elements.get(index))
            .map(|element| element.id())
    }

    /// Whether an owned element is currently visible under this pane's mode.
    #[must_use]
    pub fn is_element_visible(&self, id: ElementId) -> bool {
        self.index_of(id)
            .is_some_and(|index| self.element_visible_at(index))
    }

    /// The element focus should land on: the active tab, or the first
    /// visible accordion section, falling back to the first element.
    #[must_use]
    pub fn focus_target(&self) -> Option<ElementId> {
        match self.mode {
            PaneMode::Tabs => self.active_element_id(),
            PaneMode::Accordion => self
                .elements
                .iter()
                .find(|element| self.expanded.contains(&element.id()))
                .or_else(|| self.elements.first())
                .map(|element| element.id()),
        }
    }

    /// Expanded section ids in presentation order (accordion mode).
    #[must_use]
    pub fn expanded_element_ids(&self) -> Vec<ElementId> {
        self.elements
            .iter()
            .map(|element| element.id())
            .filter(|id| self.expanded.contains(id))
            .collect()
    }

    fn index_of(&self, id: ElementId) -> Option<usize> {
        self.elements.iter().position(|element| element.id() == id)
    }

    fn element_visible_at(&self, index: usize) -> bool {
        match self.mode {
            PaneMode::Tabs => self.active == Some(index),
            PaneMode::Accordion => self
                .elements
                .get(index)
                .is_some_and(|element| self.expanded.contains(&element.id())),
        }
    }

    // =====================================================================
    // Mode and selection
    // =====================================================================

    /// Switch presentation mode, resetting visibility bookkeeping.
    ///
    /// No-op when the mode is unchanged: no notifications, no dirty.
    pub fn set_mode(&mut self, mode: PaneMode) {
        if self.mode == mode {
            return;
        }
        let before: Vec<bool> = (0..self.elements.len())
            .map(|index| self.element_visible_at(index))
            .collect();
        self.mode = mode;
        if mode == PaneMode::Tabs && self.active.is_none() && !self.elements.is_empty() {
            self.active = Some(0);
        }
        for index in 0..self.elements.len() {
            let now = self.element_visible_at(index);
            if now != before[index] {
                self.elements[index].on_visibility_change(now);
            }
        }
        self.relayout();
        self.host.on_dirty();
    }

    /// Activate a tab by element id. Tabs mode only.
    pub fn set_active_element(&mut self, id: ElementId) -> bool {
        if self.mode != PaneMode::Tabs {
            return false;
        }
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.activate_index(index);
        true
    }

    /// Activate the next tab, wrapping. No-op on an empty pane.
    pub fn next_tab(&mut self) {
        if self.mode != PaneMode::Tabs || self.elements.is_empty() {
            return;
        }
        let Some(active) = self.active else {
            return;
        };
        self.activate_index((active + 1) % self.elements.len());
    }

    /// Activate the previous tab, wrapping. No-op on an empty pane.
    pub fn prev_tab(&mut self) {
        if self.mode != PaneMode::Tabs || self.elements.is_empty() {
            return;
        }
        let Some(active) = self.active else {
            return;
        };
        let len = self.elements.len();
        self.activate_index((active + len - 1) % len);
    }

    fn activate_index(&mut self, index: usize) {
        if self.active == Some(index) {
            return;
        }
        if let Some(previous) = self.active
            && let Some(element) = self.elements.get_mut(previous)
        {
            element.on_visibility_change(false);
        }
        self.active = Some(index);
        if let Some(element) = self.elements.get_mut(index) {
            element.on_visibility_change(true);
        }
        self.relayout();
        self.host.on_dirty();
    }

    /// Toggle an accordion section. Accordion mode only.
    pub fn toggle_accordion_section(&mut self, id: ElementId) -> bool {
        if self.expanded.contains(&id) {
            self.collapse_accordion_section(id)
        } else {
            self.expand_accordion_section(id)
        }
    }

    /// Expand an accordion section. Accordion mode only.
    pub fn expand_accordion_section(&mut self, id: ElementId) -> bool {
        if self.mode != PaneMode::Accordion {
            return false;
        }
        let Some(index) = self.index_of(id) else {
            return false;
        };
        if self.expanded.insert(id) {
            self.elements[index].on_visibility_change(true);
            self.relayout();
            self.host.on_dirty();
        }
        true
    }

    /// Collapse an accordion section. Accordion mode only.
    pub fn collapse_accordion_section(&mut self, id: ElementId) -> bool {
        if self.mode != PaneMode::Accordion {
            return false;
        }
        let Some(index) = self.index_of(id) else {
            return false;
        };
        if self.expanded.remove(&id) {
            self.elements[index].on_visibility_change(false);
            self.relayout();
            self.host.on_dirty();
        }
        true
    }

    // =====================================================================
    // Element lifecycle
    // =====================================================================

    /// Create an element through the factory and append it.
    ///
    /// The element is mounted, then made visible: it becomes the active
    /// tab (hiding the previous one), or an already-expanded accordion
    /// section.
    pub fn add_element(
        &mut self,
        type_tag: &str,
        title: Option<&str>,
        state: Option<Value>,
    ) -> Result<ElementId, LayoutError> {
        let seed = ElementSeed {
            id: None,
            title: title.map(str::to_owned),
            state,
        };
        let mut element = self.factory.borrow_mut().create(type_tag, seed)?;
        element.on_mount();
        Ok(self.insert_element(element))
    }

    /// Unmount and destroy an element. Returns whether it was found.
    pub fn remove_element(&mut self, id: ElementId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let was_visible = self.element_visible_at(index);
        let mut element = self.elements.remove(index);
        self.expanded.remove(&id);
        if was_visible {
            element.on_visibility_change(false);
        }
        element.on_unmount();
        self.repair_active_after_removal(index);
        self.relayout();
        self.host.on_dirty();
        true
    }

    /// Release an element for transfer to another pane.
    ///
    /// The element is hidden but not unmounted; ownership passes to the
    /// caller, which must attach it elsewhere within the same call.
    pub fn detach_element(&mut self, id: ElementId) -> Option<Box<dyn Element>> {
        let index = self.index_of(id)?;
        let was_visible = self.element_visible_at(index);
        let mut element = self.elements.remove(index);
        self.expanded.remove(&id);
        if was_visible {
            element.on_visibility_change(false);
        }
        self.repair_active_after_removal(index);
        self.relayout();
        self.host.on_dirty();
        Some(element)
    }

    /// Adopt an element detached from another pane, without re-mounting.
    pub fn attach_element(&mut self, element: Box<dyn Element>) -> ElementId {
        self.insert_element(element)
    }

    fn insert_element(&mut self, mut element: Box<dyn Element>) -> ElementId {
        let id = element.id();
        match self.mode {
            PaneMode::Tabs => {
                if let Some(previous) = self.active
                    && let Some(old) = self.elements.get_mut(previous)
                {
                    old.on_visibility_change(false);
                }
                self.elements.push(element);
                self.active = Some(self.elements.len() - 1);
                if let Some(new) = self.elements.last_mut() {
                    new.on_visibility_change(true);
                }
            }
            PaneMode::Accordion => {
                self.expanded.insert(id);
                element.on_visibility_change(true);
                self.elements.push(element);
            }
        }
        self.relayout();
        self.host.on_dirty();
        id
    }

    /// Clamp the active index after removing `removed`, surfacing the
    /// replacement tab when the active one was taken.
    fn repair_active_after_removal(&mut self, removed: usize) {
        if self.mode != PaneMode::Tabs {
            return;
        }
        let Some(active) = self.active else {
            return;
        };
        if self.elements.is_empty() {
            self.active = None;
            return;
        }
        if removed < active {
            self.active = Some(active - 1);
        } else if removed == active {
            let next = active.min(self.elements.len() - 1);
            self.active = Some(next);
            if let Some(element) = self.elements.get_mut(next) {
                element.on_visibility_change(true);
            }
        }
    }

    /// Hide and unmount every element, emptying the pane.
    pub(crate) fn unmount_all(&mut self) {
        for index in 0..self.elements.len() {
            let visible = self.element_visible_at(index);
            let element = &mut self.elements[index];
            if visible {
                element.on_visibility_change(false);
            }
            element.on_unmount();
        }
        self.elements.clear();
        self.active = None;
        self.expanded.clear();
    }

    // =====================================================================
    // Geometry
    // =====================================================================

    /// Assign this pane's rectangle and relayout its elements.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
        self.relayout();
    }

    /// Current rectangle.
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        self.bounds
    }

    /// The sub-rectangle available to element content after chrome: one
    /// row of tab bar, or one header row per accordion element.
    #[must_use]
    pub fn content_bounds(&self) -> Rect {
        match self.mode {
            PaneMode::Tabs => Rect::new(
                self.bounds.x,
                self.bounds.y.saturating_add(1),
                self.bounds.width,
                self.bounds.height.saturating_sub(1),
            ),
            PaneMode::Accordion => Rect::new(
                self.bounds.x,
                self.bounds.y,
                self.bounds.width,
                self.bounds
                    .height
                    .saturating_sub(self.elements.len() as u16),
            ),
        }
    }

    fn relayout(&mut self) {
        match self.mode {
            PaneMode::Tabs => {
                let content = self.content_bounds();
                for element in &mut self.elements {
                    element.set_bounds(content);
                }
            }
            PaneMode::Accordion => {
                let share = self.accordion_share();
                let (x, width) = (self.bounds.x, self.bounds.width);
                let flags: Vec<bool> = self
                    .elements
                    .iter()
                    .map(|element| self.expanded.contains(&element.id()))
                    .collect();
                let mut cursor = self.bounds.y;
                for (element, is_expanded) in self.elements.iter_mut().zip(flags) {
                    cursor = cursor.saturating_add(1);
                    let height = if is_expanded { share } else { 0 };
                    element.set_bounds(Rect::new(x, cursor, width, height));
                    cursor = cursor.saturating_add(height);
                }
            }
        }
    }

    /// Rows per expanded section: available height divided equally by
    /// integer floor division.
    fn accordion_share(&self) -> u16 {
        let headers = self.elements.len() as u16;
        let available = self.bounds.height.saturating_sub(headers);
        let expanded = self
            .elements
            .iter()
            .filter(|element| self.expanded.contains(&element.id()))
            .count() as u16;
        if expanded == 0 { 0 } else { available / expanded }
    }

    fn accordion_rows(&self) -> Vec<AccordionRow> {
        let share = self.accordion_share();
        let mut rows = Vec::with_capacity(self.elements.len());
        let mut cursor = self.bounds.y;
        for (index, element) in self.elements.iter().enumerate() {
            let expanded = self.expanded.contains(&element.id());
            let content_height = if expanded { share } else { 0 };
            rows.push(AccordionRow {
                index,
                header_y: cursor,
                expanded,
                content_height,
            });
            cursor = cursor.saturating_add(1).saturating_add(content_height);
        }
        rows
    }

    fn tab_layout(&self) -> TabLayout {
        let mut spans = Vec::with_capacity(self.elements.len());
        let right = self.bounds.right();
        let mut x = self.bounds.x;
        for (index, element) in self.elements.iter().enumerate() {
            let (_, label_width) = truncate_title(&element.title());
            let width = label_width.saturating_add(4);
            if x.saturating_add(width) > right {
                return TabLayout {
                    spans,
                    overflow_x: Some(right.saturating_sub(1)),
                };
            }
            spans.push(TabSpan { index, x, width });
            x = x.saturating_add(width);
            if index + 1 < self.elements.len() {
                // separator column
                x = x.saturating_add(1);
            }
        }
        TabLayout {
            spans,
            overflow_x: None,
        }
    }

    // =====================================================================
    // Rendering
    // =====================================================================

    /// Draw chrome and visible content into the host grid.
    pub fn render(&mut self, buffer: &mut dyn ScreenBuffer) {
        if self.bounds.is_empty() {
            return;
        }
        match self.mode {
            PaneMode::Tabs => {
                self.render_tab_bar(buffer);
                if self.elements.is_empty() {
                    self.render_empty_hint(buffer);
                } else if let Some(active) = self.active
                    && let Some(element) = self.elements.get_mut(active)
                {
                    element.render(buffer);
                }
            }
            PaneMode::Accordion => self.render_accordion(buffer),
        }
    }

    fn render_tab_bar(&mut self, buffer: &mut dyn ScreenBuffer) {
        let host = Rc::clone(&self.host);
        let focused = host.is_pane_focused(self.id);
        let bar_bg = host.background_for_focus("tabBar", focused);
        let bar_fg = host.foreground_for_focus("tabBar", focused);
        let bar = Rect::new(self.bounds.x, self.bounds.y, self.bounds.width, 1);
        buffer.fill_rect(bar, ' ', &bar_fg, &bar_bg);

        let active_bg = host.selection_background("tab", focused);
        let active_fg = host.foreground_for_focus("tab", focused);
        let layout = self.tab_layout();
        let y = self.bounds.y;
        let last = layout.spans.len().saturating_sub(1);
        for (position, span) in layout.spans.iter().enumerate() {
            let element = &self.elements[span.index];
            let (label, _) = truncate_title(&element.title());
            let (fg, bg) = if self.active == Some(span.index) {
                (active_fg.as_str(), active_bg.as_str())
            } else {
                (bar_fg.as_str(), bar_bg.as_str())
            };
            let mut x = put_cell(buffer, span.x, y, ' ', fg, bg);
            for glyph in label.chars() {
                x = put_cell(buffer, x, y, glyph, fg, bg);
            }
            x = put_cell(buffer, x, y, ' ', fg, bg);
            x = put_cell(buffer, x, y, '×', fg, bg);
            let _ = put_cell(buffer, x, y, ' ', fg, bg);
            if position < last {
                buffer.set_cell(
                    span.x.saturating_add(span.width),
                    y,
                    '│',
                    &bar_fg,
                    &bar_bg,
                );
            }
        }
        if let Some(overflow_x) = layout.overflow_x {
            buffer.set_cell(overflow_x, y, '»', &bar_fg, &bar_bg);
        }
    }

    fn render_empty_hint(&self, buffer: &mut dyn ScreenBuffer) {
        let content = self.content_bounds();
        if content.is_empty() {
            return;
        }
        let fg = self.host.theme_color("paneHint.foreground", "#6a6a6a");
        let bg = self.host.theme_color("pane.background", "#1e1e1e");
        let hint_width = EMPTY_PANE_HINT.width() as u16;
        let x = content
            .x
            .saturating_add(content.width.saturating_sub(hint_width) / 2);
        let y = content.y.saturating_add(content.height / 2);
        let _ = buffer.draw_text(x, y, EMPTY_PANE_HINT, &fg, &bg, content.right());
    }

    fn render_accordion(&mut self, buffer: &mut dyn ScreenBuffer) {
        let host = Rc::clone(&self.host);
        let focused = host.is_pane_focused(self.id);
        let header_bg = host.background_for_focus("accordionHeader", focused);
        let header_fg = host.foreground_for_focus("accordionHeader", focused);
        let bottom = self.bounds.bottom();
        let rows = self.accordion_rows();
        for row in &rows {
            if row.header_y >= bottom {
                break;
            }
            let header = Rect::new(self.bounds.x, row.header_y, self.bounds.width, 1);
            buffer.fill_rect(header, ' ', &header_fg, &header_bg);
            let element = &self.elements[row.index];
            let marker = if row.expanded { '▼' } else { '▶' };
            let mut label = format!("{marker} {}", element.title());
            if let Some(status) = element.status() {
                label.push_str(" [");
                label.push_str(&status);
                label.push(']');
            }
            let _ = buffer.draw_text(
                self.bounds.x,
                row.header_y,
                &label,
                &header_fg,
                &header_bg,
                self.bounds.right(),
            );
        }
        for row in &rows {
            if row.expanded && row.content_height > 0 && row.header_y < bottom {
                self.elements[row.index].render(buffer);
            }
        }
    }

    // =====================================================================
    // Mouse
    // =====================================================================

    /// Hit-test a mouse event against this pane's chrome.
    ///
    /// Only primary-button presses are interpreted. Returns whether the
    /// event was consumed.
    pub fn handle_mouse(&mut self, event: MouseEvent) -> bool {
        if event.kind != MouseEventKind::Down(MouseButton::Left) {
            return false;
        }
        if !self.bounds.contains(event.column, event.row) {
            return false;
        }
        match self.mode {
            PaneMode::Tabs => self.handle_tab_bar_press(event.column, event.row),
            PaneMode::Accordion => self.handle_header_press(event.row),
        }
    }

    fn handle_tab_bar_press(&mut self, column: u16, row: u16) -> bool {
        if row != self.bounds.y {
            return false;
        }
        let layout = self.tab_layout();
        if layout.overflow_x == Some(column) {
            self.host.on_show_tab_dropdown(self.id);
            return true;
        }
        let Some(span) = layout
            .spans
            .iter()
            .find(|span| column >= span.x && column < span.x.saturating_add(span.width))
            .copied()
        else {
            return false;
        };
        let element_id = self.elements[span.index].id();
        let close_from = span
            .x
            .saturating_add(span.width.saturating_sub(TAB_CLOSE_CELLS));
        if column >= close_from {
            let host = Rc::clone(&self.host);
            if let Some(element) = self.elements.get(span.index) {
                host.on_element_close(element_id, element.as_ref());
            }
            self.remove_element(element_id);
        } else {
            self.set_active_element(element_id);
            self.host.on_focus_request(element_id);
        }
        true
    }

    fn handle_header_press(&mut self, row: u16) -> bool {
        let Some(index) = self
            .accordion_rows()
            .iter()
            .find(|header| header.header_y == row)
            .map(|header| header.index)
        else {
            return false;
        };
        let id = self.elements[index].id();
        self.toggle_accordion_section(id);
        true
    }

    // =====================================================================
    // Persistence
    // =====================================================================

    /// Structural snapshot of this pane.
    #[must_use]
    pub fn serialize(&self) -> PaneConfig {
        PaneConfig {
            id: self.id,
            mode: self.mode,
            elements: self
                .elements
                .iter()
                .map(|element| ElementConfig {
                    type_tag: element.type_tag().to_string(),
                    id: element.id(),
                    title: element.title(),
                    state: element.state(),
                })
                .collect(),
            active_element_id: match self.mode {
                PaneMode::Tabs => self.active_element_id(),
                PaneMode::Accordion => None,
            },
            expanded_element_ids: match self.mode {
                PaneMode::Tabs => None,
                PaneMode::Accordion => Some(self.expanded_element_ids()),
            },
        }
    }

    /// Rebuild this pane from a snapshot.
    ///
    /// All elements are constructed through the factory before any
    /// existing state is torn down, so a factory failure leaves the pane
    /// exactly as it was.
    pub fn deserialize(&mut self, config: &PaneConfig) -> Result<(), LayoutError> {
        let mut rebuilt: Vec<Box<dyn Element>> = Vec::with_capacity(config.elements.len());
        for descriptor in &config.elements {
            let seed = ElementSeed::persisted(
                descriptor.id,
                descriptor.title.clone(),
                descriptor.state.clone(),
            );
            rebuilt.push(self.factory.borrow_mut().create(&descriptor.type_tag, seed)?);
        }

        self.unmount_all();
        self.mode = config.mode;
        self.elements = rebuilt;
        for element in &mut self.elements {
            element.on_mount();
        }

        self.active = None;
        self.expanded.clear();
        match self.mode {
            PaneMode::Tabs => {
                self.active = config
                    .active_element_id
                    .and_then(|id| self.index_of(id))
                    .or(if self.elements.is_empty() { None } else { Some(0) });
            }
            PaneMode::Accordion => {
                if let Some(ids) = &config.expanded_element_ids {
                    for id in ids {
                        if self.index_of(*id).is_some() {
                            self.expanded.insert(*id);
                        }
                    }
                }
            }
        }

        for index in 0..self.elements.len() {
            let visible = self.element_visible_at(index);
            if visible {
                self.elements[index].on_visibility_change(true);
            }
        }
        self.relayout();
        self.host.on_dirty();
        Ok(())
    }
}

/// Write one glyph and advance by its display width (at least one cell).
fn put_cell(buffer: &mut dyn ScreenBuffer, x: u16, y: u16, glyph: char, fg: &str, bg: &str) -> u16 {
    buffer.set_cell(x, y, glyph, fg, bg);
    let advance = glyph.width().unwrap_or(1).max(1) as u16;
    x.saturating_add(advance)
}

/// Clamp a title to the tab width limit, ellipsizing when it is wider.
fn truncate_title(title: &str) -> (String, u16) {
    let total = title.width();
    if total <= TAB_TITLE_MAX_WIDTH as usize {
        return (title.to_string(), total as u16);
    }
    let mut width: u16 = 0;
    let mut out = String::new();
    for glyph in title.chars() {
        let glyph_width = glyph.width().unwrap_or(0) as u16;
        if width + glyph_width > TAB_TITLE_MAX_WIDTH - 1 {
            break;
        }
        out.push(glyph);
        width += glyph_width;
    }
    out.push('…');
    (out, width + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ElementEvent, TestGrid, TestRig};

    fn tabs_pane(rig: &TestRig) -> Pane {
        let mut pane = Pane::new(PaneId::new(1), rig.host(), rig.factory());
        pane.set_bounds(Rect::new(0, 0, 40, 10));
        pane
    }

    fn accordion_pane(rig: &TestRig) -> Pane {
        let mut pane = tabs_pane(rig);
        pane.set_mode(PaneMode::Accordion);
        pane
    }

    // ---- Element lifecycle ----

    #[test]
    fn first_element_mounts_then_shows() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let id = pane.add_element("FileTree", None, None).unwrap();
        assert_eq!(pane.active_element_index(), Some(0));
        assert_eq!(
            rig.events_for(id),
            vec![ElementEvent::Mounted, ElementEvent::Visibility(true)]
        );
    }

    #[test]
    fn second_element_hides_the_first() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let first = pane.add_element("Editor", Some("a.rs"), None).unwrap();
        let second = pane.add_element("Editor", Some("b.rs"), None).unwrap();
        assert_eq!(pane.active_element_id(), Some(second));
        assert!(!pane.is_element_visible(first));
        assert_eq!(
            rig.events_for(first).last(),
            Some(&ElementEvent::Visibility(false))
        );
    }

    #[test]
    fn remove_missing_element_is_false() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        assert!(!pane.remove_element(ElementId::new(99)));
    }

    #[test]
    fn removing_active_surfaces_previous_tab() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let first = pane.add_element("Editor", Some("a.rs"), None).unwrap();
        let second = pane.add_element("Editor", Some("b.rs"), None).unwrap();
        assert!(pane.remove_element(second));
        assert_eq!(pane.active_element_id(), Some(first));
        assert!(pane.is_element_visible(first));
        assert_eq!(
            rig.events_for(second),
            vec![
                ElementEvent::Mounted,
                ElementEvent::Visibility(true),
                ElementEvent::Visibility(false),
                ElementEvent::Unmounted,
            ]
        );
    }

    #[test]
    fn removing_before_active_shifts_index_silently() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let first = pane.add_element("Editor", Some("a.rs"), None).unwrap();
        let second = pane.add_element("Editor", Some("b.rs"), None).unwrap();
        rig.clear_events();
        assert!(pane.remove_element(first));
        assert_eq!(pane.active_element_index(), Some(0));
        assert_eq!(pane.active_element_id(), Some(second));
        // The surviving tab was already visible; no visibility traffic for it.
        assert_eq!(rig.events_for(second), Vec::new());
    }

    #[test]
    fn removing_last_element_empties_the_pane() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let only = pane.add_element("Editor", None, None).unwrap();
        assert!(pane.remove_element(only));
        assert_eq!(pane.active_element_index(), None);
        assert_eq!(pane.element_count(), 0);
    }

    #[test]
    fn detach_and_attach_do_not_remount() {
        let rig = TestRig::new();
        let mut source = tabs_pane(&rig);
        let mut target = Pane::new(PaneId::new(2), rig.host(), rig.factory());
        target.set_bounds(Rect::new(40, 0, 40, 10));
        let id = source.add_element("Editor", Some("a.rs"), None).unwrap();
        rig.clear_events();

        let element = source.detach_element(id).unwrap();
        target.attach_element(element);

        assert!(!source.has_element(id));
        assert!(target.has_element(id));
        assert_eq!(target.active_element_id(), Some(id));
        assert_eq!(
            rig.events_for(id),
            vec![
                ElementEvent::Visibility(false),
                ElementEvent::Visibility(true)
            ]
        );
    }

    // ---- Selection ----

    #[test]
    fn set_active_element_swaps_visibility() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let first = pane.add_element("Editor", Some("a.rs"), None).unwrap();
        let second = pane.add_element("Editor", Some("b.rs"), None).unwrap();
        rig.clear_events();
        assert!(pane.set_active_element(first));
        assert_eq!(rig.events_for(second), vec![ElementEvent::Visibility(false)]);
        assert_eq!(rig.events_for(first), vec![ElementEvent::Visibility(true)]);
    }

    #[test]
    fn reactivating_current_tab_is_quiet() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let id = pane.add_element("Editor", None, None).unwrap();
        rig.clear_events();
        let dirty_before = rig.dirty_count();
        assert!(pane.set_active_element(id));
        assert_eq!(rig.events_for(id), Vec::new());
        assert_eq!(rig.dirty_count(), dirty_before);
    }

    #[test]
    fn tab_navigation_wraps() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let first = pane.add_element("Editor", Some("a.rs"), None).unwrap();
        let _ = pane.add_element("Editor", Some("b.rs"), None).unwrap();
        let third = pane.add_element("Editor", Some("c.rs"), None).unwrap();
        assert_eq!(pane.active_element_id(), Some(third));
        pane.next_tab();
        assert_eq!(pane.active_element_id(), Some(first));
        pane.prev_tab();
        assert_eq!(pane.active_element_id(), Some(third));
    }

    #[test]
    fn navigation_is_noop_on_empty_pane() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        rig.clear_events();
        pane.next_tab();
        pane.prev_tab();
        assert_eq!(rig.dirty_count(), 0);
    }

    // ---- Accordion ----

    #[test]
    fn accordion_add_is_born_expanded() {
        let rig = TestRig::new();
        let mut pane = accordion_pane(&rig);
        let id = pane.add_element("GitPanel", None, None).unwrap();
        assert!(pane.is_element_visible(id));
        assert_eq!(pane.expanded_element_ids(), vec![id]);
    }

    #[test]
    fn collapse_and_expand_toggle_visibility() {
        let rig = TestRig::new();
        let mut pane = accordion_pane(&rig);
        let id = pane.add_element("GitPanel", None, None).unwrap();
        rig.clear_events();
        assert!(pane.collapse_accordion_section(id));
        assert!(!pane.is_element_visible(id));
        assert!(pane.expand_accordion_section(id));
        assert!(pane.is_element_visible(id));
        assert_eq!(
            rig.events_for(id),
            vec![
                ElementEvent::Visibility(false),
                ElementEvent::Visibility(true)
            ]
        );
    }

    #[test]
    fn accordion_ops_rejected_in_tabs_mode() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let id = pane.add_element("Editor", None, None).unwrap();
        assert!(!pane.toggle_accordion_section(id));
    }

    #[test]
    fn accordion_heights_divide_evenly_by_floor() {
        let rig = TestRig::new();
        let mut pane = accordion_pane(&rig);
        pane.set_bounds(Rect::new(0, 0, 40, 20));
        let a = pane.add_element("Panel", Some("a"), None).unwrap();
        let b = pane.add_element("Panel", Some("b"), None).unwrap();
        let c = pane.add_element("Panel", Some("c"), None).unwrap();
        // 20 rows - 3 headers = 17 rows over 3 sections -> 5 each.
        for id in [a, b, c] {
            assert_eq!(rig.bounds_of(id).height, 5);
        }
        // Headers interleave: header 0, content 0..5, header at 6, etc.
        assert_eq!(rig.bounds_of(a).y, 1);
        assert_eq!(rig.bounds_of(b).y, 7);
        assert_eq!(rig.bounds_of(c).y, 13);
        assert!(pane.collapse_accordion_section(b));
        // 17 rows over 2 expanded sections -> 8 each; collapsed gets zero.
        assert_eq!(rig.bounds_of(a).height, 8);
        assert_eq!(rig.bounds_of(b).height, 0);
        assert_eq!(rig.bounds_of(c).height, 8);
    }

    // ---- Mode switching ----

    #[test]
    fn mode_switch_to_same_mode_is_silent() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let _ = pane.add_element("Editor", None, None).unwrap();
        rig.clear_events();
        let dirty_before = rig.dirty_count();
        pane.set_mode(PaneMode::Tabs);
        assert_eq!(rig.dirty_count(), dirty_before);
        assert!(rig.all_events().is_empty());
    }

    #[test]
    fn mode_switch_resets_visibility_bookkeeping() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let first = pane.add_element("Editor", Some("a.rs"), None).unwrap();
        let second = pane.add_element("Editor", Some("b.rs"), None).unwrap();
        rig.clear_events();
        // Accordion starts with nothing expanded: the active tab hides.
        pane.set_mode(PaneMode::Accordion);
        assert_eq!(rig.events_for(second), vec![ElementEvent::Visibility(false)]);
        assert_eq!(rig.events_for(first), Vec::new());
        // Back to tabs: only the active element shows again.
        rig.clear_events();
        pane.set_mode(PaneMode::Tabs);
        assert_eq!(rig.events_for(second), vec![ElementEvent::Visibility(true)]);
        assert!(!pane.is_element_visible(first));
    }

    // ---- Geometry ----

    #[test]
    fn content_bounds_reserves_tab_bar_row() {
        let rig = TestRig::new();
        let pane = tabs_pane(&rig);
        assert_eq!(pane.content_bounds(), Rect::new(0, 1, 40, 9));
    }

    #[test]
    fn content_bounds_reserves_accordion_headers() {
        let rig = TestRig::new();
        let mut pane = accordion_pane(&rig);
        let _ = pane.add_element("Panel", Some("a"), None).unwrap();
        let _ = pane.add_element("Panel", Some("b"), None).unwrap();
        assert_eq!(pane.content_bounds(), Rect::new(0, 0, 40, 8));
    }

    // ---- Tab chrome ----

    #[test]
    fn long_titles_are_ellipsized_at_twenty_cells() {
        let (label, width) = truncate_title("a_very_long_file_name_indeed.rs");
        assert_eq!(width, 20);
        assert!(label.ends_with('…'));
        let (short, short_width) = truncate_title("main.rs");
        assert_eq!(short, "main.rs");
        assert_eq!(short_width, 7);
    }

    #[test]
    fn tab_bar_draws_title_and_close_glyph() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let _ = pane.add_element("Editor", Some("a.rs"), None).unwrap();
        let mut grid = TestGrid::new(40, 10);
        pane.render(&mut grid);
        // " a.rs × " at the left edge of the bar.
        assert_eq!(grid.row_text(0, 0, 8), " a.rs × ");
    }

    #[test]
    fn clicking_a_tab_activates_it() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let first = pane.add_element("Editor", Some("a.rs"), None).unwrap();
        let _ = pane.add_element("Editor", Some("b.rs"), None).unwrap();
        // First span: " a.rs × " covering x 0..8.
        assert!(pane.handle_mouse(MouseEvent::left_down(2, 0)));
        assert_eq!(pane.active_element_id(), Some(first));
        assert_eq!(rig.focus_requests(), vec![first]);
    }

    #[test]
    fn clicking_the_tab_close_cells_removes_it() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let first = pane.add_element("Editor", Some("a.rs"), None).unwrap();
        let _ = pane.add_element("Editor", Some("b.rs"), None).unwrap();
        // Close region of the first span is x 6..8.
        assert!(pane.handle_mouse(MouseEvent::left_down(6, 0)));
        assert!(!pane.has_element(first));
        assert_eq!(rig.close_notifications(), vec![first]);
    }

    #[test]
    fn clicks_outside_the_bar_are_not_consumed() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let _ = pane.add_element("Editor", Some("a.rs"), None).unwrap();
        assert!(!pane.handle_mouse(MouseEvent::left_down(5, 5)));
        assert!(!pane.handle_mouse(MouseEvent::left_down(30, 0)));
    }

    #[test]
    fn overflow_indicator_opens_dropdown() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        pane.set_bounds(Rect::new(0, 0, 12, 10));
        let _ = pane.add_element("Editor", Some("first.rs"), None).unwrap();
        let _ = pane.add_element("Editor", Some("second.rs"), None).unwrap();
        assert!(pane.handle_mouse(MouseEvent::left_down(11, 0)));
        assert!(rig.dropdown_shown());
    }

    #[test]
    fn accordion_header_click_toggles_section() {
        let rig = TestRig::new();
        let mut pane = accordion_pane(&rig);
        let a = pane.add_element("Panel", Some("a"), None).unwrap();
        let b = pane.add_element("Panel", Some("b"), None).unwrap();
        // Header rows: a at y=0, b just below a's content.
        let b_header = rig.bounds_of(b).y - 1;
        assert!(pane.handle_mouse(MouseEvent::left_down(3, b_header)));
        assert!(!pane.is_element_visible(b));
        assert!(pane.is_element_visible(a));
    }

    // ---- Persistence ----

    #[test]
    fn serialize_captures_tabs_state() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let first = pane.add_element("Editor", Some("a.rs"), None).unwrap();
        let _ = pane.add_element("FileTree", Some("tree"), None).unwrap();
        pane.set_active_element(first);
        let config = pane.serialize();
        assert_eq!(config.mode, PaneMode::Tabs);
        assert_eq!(config.elements.len(), 2);
        assert_eq!(config.elements[0].type_tag, "Editor");
        assert_eq!(config.active_element_id, Some(first));
        assert!(config.expanded_element_ids.is_none());
    }

    #[test]
    fn deserialize_rebuilds_elements_and_selection() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let first = pane.add_element("Editor", Some("a.rs"), None).unwrap();
        let _ = pane.add_element("Editor", Some("b.rs"), None).unwrap();
        pane.set_active_element(first);
        let config = pane.serialize();

        let mut restored = Pane::new(PaneId::new(1), rig.host(), rig.factory());
        restored.set_bounds(Rect::new(0, 0, 40, 10));
        restored.deserialize(&config).unwrap();
        assert_eq!(restored.serialize(), config);
        assert_eq!(restored.active_element_id(), Some(first));
    }

    #[test]
    fn deserialize_accordion_restores_expansion() {
        let rig = TestRig::new();
        let mut pane = accordion_pane(&rig);
        let a = pane.add_element("Panel", Some("a"), None).unwrap();
        let b = pane.add_element("Panel", Some("b"), None).unwrap();
        pane.collapse_accordion_section(a);
        let config = pane.serialize();
        assert_eq!(config.expanded_element_ids, Some(vec![b]));

        let mut restored = Pane::new(PaneId::new(1), rig.host(), rig.factory());
        restored.deserialize(&config).unwrap();
        assert!(!restored.is_element_visible(a));
        assert!(restored.is_element_visible(b));
    }

    #[test]
    fn deserialize_failure_leaves_pane_untouched() {
        let rig = TestRig::new();
        let mut pane = tabs_pane(&rig);
        let id = pane.add_element("Editor", Some("a.rs"), None).unwrap();
        let mut config = pane.serialize();
        config.elements.push(ElementConfig {
            type_tag: "NoSuchKind".to_string(),
            id: ElementId::new(999),
            title: "ghost".to_string(),
            state: Value::Null,
        });
        assert!(pane.deserialize(&config).is_err());
        assert_eq!(pane.element_ids(), vec![id]);
        assert!(pane.is_element_visible(id));
    }
}
