#![forbid(unsafe_code)]

//! Shared doubles for unit tests: a probe element that records its
//! lifecycle, a factory over a fixed tag set, a recording host, and a
//! plain character grid.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use panekit_core::{
    CloseDecision, Element, ElementFactory, ElementFactoryError, ElementId, ElementSeed, PaneId,
    Rect, ScreenBuffer, WorkspaceHost,
};

/// Type tags the probe factory knows how to build.
const KNOWN_TAGS: &[&str] = &["Editor", "FileTree", "GitPanel", "Panel", "Terminal"];

/// One recorded lifecycle signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElementEvent {
    Mounted,
    Unmounted,
    Visibility(bool),
}

struct RigState {
    events: RefCell<Vec<(ElementId, ElementEvent)>>,
    bounds: RefCell<BTreeMap<ElementId, Rect>>,
    dirty: Cell<usize>,
    focus_requests: RefCell<Vec<ElementId>>,
    close_notifications: RefCell<Vec<ElementId>>,
    dropdown_shown: Cell<bool>,
    close_decision: Cell<CloseDecision>,
    settings: RefCell<BTreeMap<String, u16>>,
}

/// Probe element: records lifecycle signals into the shared rig state.
struct ProbeElement {
    id: ElementId,
    type_tag: String,
    title: String,
    bounds: Rect,
    state: Value,
    rig: Rc<RigState>,
}

impl Element for ProbeElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn type_tag(&self) -> &str {
        &self.type_tag
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn on_mount(&mut self) {
        self.rig
            .events
            .borrow_mut()
            .push((self.id, ElementEvent::Mounted));
    }

    fn on_unmount(&mut self) {
        self.rig
            .events
            .borrow_mut()
            .push((self.id, ElementEvent::Unmounted));
    }

    fn on_visibility_change(&mut self, visible: bool) {
        self.rig
            .events
            .borrow_mut()
            .push((self.id, ElementEvent::Visibility(visible)));
    }

    fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
        self.rig.bounds.borrow_mut().insert(self.id, bounds);
    }

    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn render(&mut self, _buffer: &mut dyn ScreenBuffer) {}

    fn state(&self) -> Value {
        self.state.clone()
    }

    fn restore_state(&mut self, state: Value) {
        self.state = state;
    }
}

/// Factory over [`KNOWN_TAGS`], allocating monotonically increasing ids.
struct ProbeFactory {
    next_id: u64,
    rig: Rc<RigState>,
}

impl ElementFactory for ProbeFactory {
    fn create(
        &mut self,
        type_tag: &str,
        seed: ElementSeed,
    ) -> Result<Box<dyn Element>, ElementFactoryError> {
        if !KNOWN_TAGS.contains(&type_tag) {
            return Err(ElementFactoryError::UnknownType {
                type_tag: type_tag.to_string(),
            });
        }
        let id = seed.id.unwrap_or_else(|| {
            let id = ElementId::new(self.next_id);
            self.next_id += 1;
            id
        });
        self.next_id = self.next_id.max(id.get() + 1);
        Ok(Box::new(ProbeElement {
            id,
            type_tag: type_tag.to_string(),
            title: seed.title.unwrap_or_else(|| type_tag.to_string()),
            bounds: Rect::default(),
            state: seed.state.unwrap_or(Value::Null),
            rig: Rc::clone(&self.rig),
        }))
    }
}

/// Recording host: counts dirty signals, captures hooks, echoes settings.
struct RecordingHost {
    rig: Rc<RigState>,
}

impl WorkspaceHost for RecordingHost {
    fn on_dirty(&self) {
        self.rig.dirty.set(self.rig.dirty.get() + 1);
    }

    fn on_focus_request(&self, element: ElementId) {
        self.rig.focus_requests.borrow_mut().push(element);
    }

    fn setting_u16(&self, key: &str, default: u16) -> u16 {
        self.rig
            .settings
            .borrow()
            .get(key)
            .copied()
            .unwrap_or(default)
    }

    fn on_element_close(&self, element: ElementId, _handle: &dyn Element) {
        self.rig.close_notifications.borrow_mut().push(element);
    }

    fn on_element_close_request(
        &self,
        _element: ElementId,
        _handle: &dyn Element,
    ) -> CloseDecision {
        self.rig.close_decision.get()
    }

    fn on_show_tab_dropdown(&self, _pane: PaneId) {
        self.rig.dropdown_shown.set(true);
    }
}

/// Everything a test needs: host, factory, and the recordings they share.
pub(crate) struct TestRig {
    state: Rc<RigState>,
    host: Rc<RecordingHost>,
    factory: Rc<RefCell<ProbeFactory>>,
}

impl TestRig {
    pub(crate) fn new() -> Self {
        let state = Rc::new(RigState {
            events: RefCell::new(Vec::new()),
            bounds: RefCell::new(BTreeMap::new()),
            dirty: Cell::new(0),
            focus_requests: RefCell::new(Vec::new()),
            close_notifications: RefCell::new(Vec::new()),
            dropdown_shown: Cell::new(false),
            close_decision: Cell::new(CloseDecision::Allow),
            settings: RefCell::new(BTreeMap::new()),
        });
        let host = Rc::new(RecordingHost {
            rig: Rc::clone(&state),
        });
        let factory = Rc::new(RefCell::new(ProbeFactory {
            next_id: 1,
            rig: Rc::clone(&state),
        }));
        Self {
            state,
            host,
            factory,
        }
    }

    pub(crate) fn host(&self) -> Rc<dyn WorkspaceHost> {
        Rc::clone(&self.host) as Rc<dyn WorkspaceHost>
    }

    pub(crate) fn factory(&self) -> Rc<RefCell<dyn ElementFactory>> {
        Rc::clone(&self.factory) as Rc<RefCell<dyn ElementFactory>>
    }

    pub(crate) fn events_for(&self, id: ElementId) -> Vec<ElementEvent> {
        self.state
            .events
            .borrow()
            .iter()
            .filter(|(event_id, _)| *event_id == id)
            .map(|(_, event)| *event)
            .collect()
    }

    pub(crate) fn all_events(&self) -> Vec<(ElementId, ElementEvent)> {
        self.state.events.borrow().clone()
    }

    pub(crate) fn clear_events(&self) {
        self.state.events.borrow_mut().clear();
    }

    pub(crate) fn dirty_count(&self) -> usize {
        self.state.dirty.get()
    }

    pub(crate) fn focus_requests(&self) -> Vec<ElementId> {
        self.state.focus_requests.borrow().clone()
    }

    pub(crate) fn close_notifications(&self) -> Vec<ElementId> {
        self.state.close_notifications.borrow().clone()
    }

    pub(crate) fn dropdown_shown(&self) -> bool {
        self.state.dropdown_shown.get()
    }

    pub(crate) fn set_close_decision(&self, decision: CloseDecision) {
        self.state.close_decision.set(decision);
    }

    pub(crate) fn set_setting(&self, key: &str, value: u16) {
        self.state.settings.borrow_mut().insert(key.to_string(), value);
    }

    pub(crate) fn bounds_of(&self, id: ElementId) -> Rect {
        self.state
            .bounds
            .borrow()
            .get(&id)
            .copied()
            .unwrap_or_default()
    }
}

/// Plain character grid for render assertions.
pub(crate) struct TestGrid {
    width: u16,
    height: u16,
    cells: Vec<char>,
}

impl TestGrid {
    pub(crate) fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![' '; usize::from(width) * usize::from(height)],
        }
    }

    pub(crate) fn char_at(&self, x: u16, y: u16) -> char {
        self.cells[usize::from(y) * usize::from(self.width) + usize::from(x)]
    }

    pub(crate) fn row_text(&self, x: u16, y: u16, len: u16) -> String {
        (x..x + len).map(|col| self.char_at(col, y)).collect()
    }
}

impl ScreenBuffer for TestGrid {
    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn set_cell(&mut self, x: u16, y: u16, glyph: char, _fg: &str, _bg: &str) {
        if x < self.width && y < self.height {
            let index = usize::from(y) * usize::from(self.width) + usize::from(x);
            self.cells[index] = glyph;
        }
    }
}
