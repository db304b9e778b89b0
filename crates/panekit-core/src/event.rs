#![forbid(unsafe_code)]

//! Mouse input types.
//!
//! Coordinates are 0-indexed cell positions in the same space as
//! [`crate::geometry::Rect`]. The engine only interprets primary-button
//! presses; everything else is passed through unconsumed so the host can
//! route it elsewhere.

/// A mouse event at a cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    /// What happened.
    pub kind: MouseEventKind,
    /// Column (x) of the event.
    pub column: u16,
    /// Row (y) of the event.
    pub row: u16,
}

impl MouseEvent {
    /// Create a new mouse event.
    #[must_use]
    pub const fn new(kind: MouseEventKind, column: u16, row: u16) -> Self {
        Self { kind, column, row }
    }

    /// Shorthand for a primary-button press.
    #[must_use]
    pub const fn left_down(column: u16, row: u16) -> Self {
        Self::new(MouseEventKind::Down(MouseButton::Left), column, row)
    }
}

/// Kinds of mouse events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    /// Mouse button pressed down.
    Down(MouseButton),
    /// Mouse button released.
    Up(MouseButton),
    /// Mouse dragged while button held.
    Drag(MouseButton),
    /// Mouse moved (no button pressed).
    Moved,
    /// Mouse wheel scrolled up.
    ScrollUp,
    /// Mouse wheel scrolled down.
    ScrollDown,
}

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_down_shorthand() {
        let event = MouseEvent::left_down(10, 20);
        assert_eq!(event.kind, MouseEventKind::Down(MouseButton::Left));
        assert_eq!(event.column, 10);
        assert_eq!(event.row, 20);
    }
}
