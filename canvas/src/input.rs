//! Input model: modes, modifier keys, mouse buttons, and the gesture state machine.
//!
//! `Mode` and `Modifiers` capture the user's intent at the time of a pointer
//! event. `UiState` is what the renderer needs to draw chrome (selection,
//! cursor, active tool). `InputState` is the gesture being tracked between
//! pointer-down and pointer-up, carrying the context needed to compute
//! incremental deltas and the final mutation on release.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::consts::{DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH};
use crate::doc::{ConnectorId, DocStore, NoteId, Side};

/// Active interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Select, move, resize, and connect notes (default).
    #[default]
    Select,
    /// Drag to pan the view.
    Pan,
    /// Freehand pen.
    Draw,
    /// One click places a text note, then back to select.
    PlaceText,
    /// Drag between note handles to connect them.
    Connect,
    /// Click or sweep over strokes and connectors to delete them.
    Erase,
}

impl Mode {
    /// CSS cursor shown while the pointer is idle in this mode.
    #[must_use]
    pub fn cursor(self) -> &'static str {
        match self {
            Self::Select => "default",
            Self::Pan => "grab",
            Self::Draw | Self::Connect => "crosshair",
            Self::PlaceText => "text",
            Self::Erase => "cell",
        }
    }
}

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    /// Meta / Command key.
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Command on macOS.
    #[must_use]
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// A keyboard key as reported by the browser (`"Delete"`, `"Escape"`, `" "`, `"z"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn is_space(&self) -> bool {
        self.0 == " " || self.0 == "Space"
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.0 == "Delete" || self.0 == "Backspace"
    }

    /// Case-insensitive match for single-letter shortcuts.
    #[must_use]
    pub fn is_letter(&self, letter: char) -> bool {
        let mut chars = self.0.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if c.eq_ignore_ascii_case(&letter))
    }
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// Persistent UI state visible to the renderer.
#[derive(Debug, Clone)]
pub struct UiState {
    pub mode: Mode,
    /// Selected notes in selection order.
    pub selected: Vec<NoteId>,
    /// Selected connector. Mutually exclusive with a note selection.
    pub selected_connector: Option<ConnectorId>,
    /// Pan mode was entered by holding Space and reverts on release.
    pub space_pan: bool,
    pub pen_color: String,
    pub pen_width: f64,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            selected: Vec::new(),
            selected_connector: None,
            space_pan: false,
            pen_color: DEFAULT_STROKE_COLOR.to_owned(),
            pen_width: DEFAULT_STROKE_WIDTH,
        }
    }
}

impl UiState {
    #[must_use]
    pub fn is_selected(&self, id: &NoteId) -> bool {
        self.selected.contains(id)
    }

    pub fn select_only(&mut self, id: NoteId) {
        self.selected.clear();
        self.selected.push(id);
        self.selected_connector = None;
    }

    /// Add or remove a note from the selection.
    pub fn toggle(&mut self, id: NoteId) {
        if let Some(idx) = self.selected.iter().position(|s| *s == id) {
            self.selected.remove(idx);
        } else {
            self.selected.push(id);
        }
        self.selected_connector = None;
    }

    pub fn select_connector(&mut self, id: ConnectorId) {
        self.selected.clear();
        self.selected_connector = Some(id);
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
        self.selected_connector = None;
    }

    /// Drop selection entries whose entities no longer exist.
    pub fn prune(&mut self, doc: &DocStore) {
        self.selected.retain(|id| doc.note(id).is_some());
        if self.selected_connector.is_some_and(|id| doc.connector(&id).is_none()) {
            self.selected_connector = None;
        }
    }
}

/// Gesture in progress between pointer-down and pointer-up.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// Dragging the view.
    Panning {
        /// Screen position at the previous event.
        last_screen: Point,
    },
    /// Moving one or more notes together.
    DraggingNotes {
        ids: Vec<NoteId>,
        /// Board position of the pointer at the previous event.
        last_board: Point,
        /// Set once any movement has been applied.
        moved: bool,
    },
    /// Dragging a note's bottom-right grip.
    ResizingNote {
        id: NoteId,
        /// Board position of the pointer at press.
        start_board: Point,
        orig_w: f64,
        orig_h: f64,
        resized: bool,
    },
    /// Collecting pen points.
    Drawing { points: Vec<Point> },
    /// Pending connector from a note handle.
    Connecting {
        from: NoteId,
        side: Side,
        /// Board position of the pointer, for the rubber-band preview.
        cursor: Point,
    },
    /// Primary button held in erase mode.
    Erasing,
}

impl InputState {
    /// Note columns owned by this gesture until release.
    #[must_use]
    pub fn held_fields(&self, note: &NoteId) -> &'static [&'static str] {
        match self {
            Self::DraggingNotes { ids, .. } if ids.contains(note) => &["x", "y"],
            Self::ResizingNote { id, .. } if id == note => &["width", "height"],
            _ => &[],
        }
    }
}
