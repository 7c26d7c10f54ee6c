//! Interaction engine: turns pointer, wheel, and keyboard events into actions.
//!
//! DESIGN
//! ======
//! `EngineCore` owns only interaction state (`UiState` + `InputState`). It
//! reads the document for hit-testing but never mutates it; every state
//! change leaves as an [`Action`] for the mutation pipeline to apply. Moves
//! and resizes are emitted as local-only deltas on every pointer event and
//! committed once on release, so the remote store sees one write per gesture.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use crate::camera::Point;
use crate::consts::{NOTE_MIN_HEIGHT, NOTE_MIN_WIDTH, TEXT_PLACEHOLDER};
use crate::doc::{
    Connector, ConnectorId, DocStore, Note, NoteColor, NoteId, NoteKind, Side, Stroke, StrokeId,
};
use crate::hit::{self, Hit, NotePart};
use crate::input::{Button, InputState, Key, Modifiers, Mode, UiState, WheelDelta};

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    CreateNote(Note),
    /// Shift notes locally; not written remotely.
    MoveNotesLocal { ids: Vec<NoteId>, dx: f64, dy: f64 },
    /// Persist the current positions of these notes.
    CommitPositions { ids: Vec<NoteId> },
    /// Set a note's size locally; not written remotely.
    ResizeNoteLocal { id: NoteId, width: f64, height: f64 },
    /// Persist the current size of a note.
    CommitSize { id: NoteId },
    AddConnector(Connector),
    DeleteConnector(ConnectorId),
    AddStroke(Stroke),
    DeleteStroke(StrokeId),
    DeleteNotes(Vec<NoteId>),
    Undo,
    Redo,
    /// Shift the view by a raw screen delta.
    Pan { dx: f64, dy: f64 },
    ZoomIn,
    ZoomOut,
    /// The host should open a text editor over this note.
    EditTextRequested { id: NoteId },
    SetCursor(String),
    RenderNeeded,
}

/// All interaction logic, independent of any rendering surface.
#[derive(Debug, Default)]
pub struct EngineCore {
    pub ui: UiState,
    pub input: InputState,
    cursor: String,
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Mode ---

    /// Switch tools. Always legal; cancels any gesture in progress.
    pub fn set_mode(&mut self, mode: Mode) -> Vec<Action> {
        self.ui.mode = mode;
        self.ui.space_pan = false;
        self.input = InputState::Idle;
        let mut actions = self.cursor_action(mode.cursor());
        actions.push(Action::RenderNeeded);
        actions
    }

    // --- Queries ---

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.ui.mode
    }

    #[must_use]
    pub fn selection(&self) -> &[NoteId] {
        &self.ui.selected
    }

    /// Source and current board position of a connector being dragged.
    #[must_use]
    pub fn pending_connector(&self) -> Option<(NoteId, Side, Point)> {
        match self.input {
            InputState::Connecting { from, side, cursor } => Some((from, side, cursor)),
            _ => None,
        }
    }

    /// Points of a stroke being drawn.
    #[must_use]
    pub fn pending_stroke(&self) -> Option<&[Point]> {
        match &self.input {
            InputState::Drawing { points } => Some(points),
            _ => None,
        }
    }

    // --- Pointer ---

    pub fn on_pointer_down(&mut self, doc: &DocStore, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        let board_pt = doc.view.screen_to_board(screen_pt);

        if button == Button::Middle {
            self.input = InputState::Panning { last_screen: screen_pt };
            return self.cursor_action("grabbing");
        }
        if button != Button::Primary {
            return Vec::new();
        }

        match self.ui.mode {
            Mode::Select => self.select_down(doc, screen_pt, board_pt, modifiers),
            Mode::Pan => {
                self.input = InputState::Panning { last_screen: screen_pt };
                self.cursor_action("grabbing")
            }
            Mode::Draw => {
                self.input = InputState::Drawing { points: vec![board_pt] };
                vec![Action::RenderNeeded]
            }
            Mode::PlaceText => {
                let pos = doc.view.snap(board_pt);
                let note = Note::new(NoteKind::Text, pos.x, pos.y)
                    .with_content(TEXT_PLACEHOLDER)
                    .with_color(NoteColor::Gray);
                let id = note.id;
                self.ui.mode = Mode::Select;
                self.ui.select_only(id);
                let mut actions = vec![Action::CreateNote(note), Action::EditTextRequested { id }];
                actions.extend(self.cursor_action(Mode::Select.cursor()));
                actions
            }
            Mode::Connect => match hit::hit_note(board_pt, doc, &doc.view) {
                Some((from, NotePart::Handle(side))) => {
                    self.input = InputState::Connecting { from, side, cursor: board_pt };
                    vec![Action::RenderNeeded]
                }
                _ => Vec::new(),
            },
            Mode::Erase => {
                self.input = InputState::Erasing;
                erase_at(doc, board_pt).into_iter().collect()
            }
        }
    }

    fn select_down(&mut self, doc: &DocStore, screen_pt: Point, board_pt: Point, modifiers: Modifiers) -> Vec<Action> {
        match hit::hit_test(board_pt, doc, &doc.view) {
            Some(Hit::Note { id, part: NotePart::Handle(side) }) => {
                self.input = InputState::Connecting { from: id, side, cursor: board_pt };
                vec![Action::RenderNeeded]
            }
            Some(Hit::Note { id, part: NotePart::ResizeGrip }) => {
                let Some(note) = doc.note(&id) else {
                    return Vec::new();
                };
                let size = doc.note_size(note);
                self.ui.select_only(id);
                self.input = InputState::ResizingNote {
                    id,
                    start_board: board_pt,
                    orig_w: size.width,
                    orig_h: size.height,
                    resized: false,
                };
                vec![Action::RenderNeeded]
            }
            Some(Hit::Note { id, part: NotePart::Body }) => {
                if modifiers.shift {
                    self.ui.toggle(id);
                } else if !self.ui.is_selected(&id) {
                    self.ui.select_only(id);
                }
                if self.ui.is_selected(&id) {
                    self.input = InputState::DraggingNotes {
                        ids: self.ui.selected.clone(),
                        last_board: board_pt,
                        moved: false,
                    };
                }
                vec![Action::RenderNeeded]
            }
            Some(Hit::Connector(id)) => {
                self.ui.select_connector(id);
                vec![Action::RenderNeeded]
            }
            Some(Hit::Stroke(_)) | None => {
                if !modifiers.shift {
                    self.ui.clear_selection();
                }
                self.input = InputState::Panning { last_screen: screen_pt };
                vec![Action::RenderNeeded]
            }
        }
    }

    pub fn on_pointer_move(&mut self, doc: &DocStore, screen_pt: Point, _modifiers: Modifiers) -> Vec<Action> {
        let board_pt = doc.view.screen_to_board(screen_pt);
        if matches!(self.input, InputState::Idle) {
            return self.hover(doc, board_pt);
        }

        match &mut self.input {
            InputState::Idle => Vec::new(),
            InputState::Panning { last_screen } => {
                let dx = screen_pt.x - last_screen.x;
                let dy = screen_pt.y - last_screen.y;
                *last_screen = screen_pt;
                vec![Action::Pan { dx, dy }, Action::RenderNeeded]
            }
            InputState::DraggingNotes { ids, last_board, moved } => {
                let dx = board_pt.x - last_board.x;
                let dy = board_pt.y - last_board.y;
                *last_board = board_pt;
                *moved = true;
                vec![Action::MoveNotesLocal { ids: ids.clone(), dx, dy }, Action::RenderNeeded]
            }
            InputState::ResizingNote { id, start_board, orig_w, orig_h, resized } => {
                let width = (*orig_w + board_pt.x - start_board.x).max(NOTE_MIN_WIDTH);
                let height = (*orig_h + board_pt.y - start_board.y).max(NOTE_MIN_HEIGHT);
                *resized = true;
                vec![Action::ResizeNoteLocal { id: *id, width, height }, Action::RenderNeeded]
            }
            InputState::Drawing { points } => {
                points.push(board_pt);
                vec![Action::RenderNeeded]
            }
            InputState::Connecting { cursor, .. } => {
                *cursor = board_pt;
                vec![Action::RenderNeeded]
            }
            InputState::Erasing => erase_at(doc, board_pt).into_iter().collect(),
        }
    }

    pub fn on_pointer_up(&mut self, doc: &DocStore, screen_pt: Point, _button: Button, _modifiers: Modifiers) -> Vec<Action> {
        let board_pt = doc.view.screen_to_board(screen_pt);
        let gesture = std::mem::take(&mut self.input);

        match gesture {
            InputState::Idle | InputState::Erasing => Vec::new(),
            InputState::Panning { .. } => self.cursor_action(self.ui.mode.cursor()),
            InputState::DraggingNotes { ids, moved, .. } => {
                if moved {
                    vec![Action::CommitPositions { ids }, Action::RenderNeeded]
                } else {
                    Vec::new()
                }
            }
            InputState::ResizingNote { id, resized, .. } => {
                if resized {
                    vec![Action::CommitSize { id }, Action::RenderNeeded]
                } else {
                    Vec::new()
                }
            }
            InputState::Drawing { mut points } => {
                if points.last() != Some(&board_pt) {
                    points.push(board_pt);
                }
                if points.len() > 1 {
                    let mut stroke = Stroke::new(points);
                    stroke.color.clone_from(&self.ui.pen_color);
                    stroke.stroke_width = self.ui.pen_width;
                    vec![Action::AddStroke(stroke), Action::RenderNeeded]
                } else {
                    vec![Action::RenderNeeded]
                }
            }
            InputState::Connecting { from, side, .. } => {
                match hit::hit_note(board_pt, doc, &doc.view) {
                    Some((to, NotePart::Handle(target))) if to != from => {
                        vec![Action::AddConnector(Connector::new(from, side, to, target)), Action::RenderNeeded]
                    }
                    _ => vec![Action::RenderNeeded],
                }
            }
        }
    }

    /// Double-click edits a note or deletes a stroke.
    pub fn on_double_click(&mut self, doc: &DocStore, screen_pt: Point) -> Vec<Action> {
        let board_pt = doc.view.screen_to_board(screen_pt);
        match hit::hit_test(board_pt, doc, &doc.view) {
            Some(Hit::Note { id, .. }) => vec![Action::EditTextRequested { id }],
            Some(Hit::Stroke(id)) => vec![Action::DeleteStroke(id), Action::RenderNeeded],
            Some(Hit::Connector(_)) | None => Vec::new(),
        }
    }

    // --- Wheel ---

    /// Command+wheel zooms; a plain wheel pans by the inverted delta.
    pub fn on_wheel(&mut self, _screen_pt: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        if modifiers.command() {
            if delta.dy < 0.0 {
                vec![Action::ZoomIn, Action::RenderNeeded]
            } else if delta.dy > 0.0 {
                vec![Action::ZoomOut, Action::RenderNeeded]
            } else {
                Vec::new()
            }
        } else {
            vec![Action::Pan { dx: -delta.dx, dy: -delta.dy }, Action::RenderNeeded]
        }
    }

    // --- Keyboard ---

    pub fn on_key_down(&mut self, key: &Key, modifiers: Modifiers) -> Vec<Action> {
        if key.is_space() {
            if self.ui.mode == Mode::Select && !self.ui.space_pan {
                self.ui.mode = Mode::Pan;
                self.ui.space_pan = true;
                return self.cursor_action(Mode::Pan.cursor());
            }
            return Vec::new();
        }

        if modifiers.command() && key.is_letter('z') {
            return vec![if modifiers.shift { Action::Redo } else { Action::Undo }];
        }
        if modifiers.command() && key.is_letter('y') {
            return vec![Action::Redo];
        }

        if key.0 == "Escape" {
            self.ui.clear_selection();
            self.ui.space_pan = false;
            self.ui.mode = Mode::Select;
            self.input = InputState::Idle;
            let mut actions = self.cursor_action(Mode::Select.cursor());
            actions.push(Action::RenderNeeded);
            return actions;
        }

        if key.is_delete() {
            if let Some(id) = self.ui.selected_connector.take() {
                return vec![Action::DeleteConnector(id), Action::RenderNeeded];
            }
            if !self.ui.selected.is_empty() {
                let ids = std::mem::take(&mut self.ui.selected);
                return vec![Action::DeleteNotes(ids), Action::RenderNeeded];
            }
        }

        Vec::new()
    }

    pub fn on_key_up(&mut self, key: &Key, _modifiers: Modifiers) -> Vec<Action> {
        if key.is_space() && self.ui.space_pan {
            self.ui.space_pan = false;
            self.ui.mode = Mode::Select;
            if matches!(self.input, InputState::Panning { .. }) {
                self.input = InputState::Idle;
            }
            return self.cursor_action(Mode::Select.cursor());
        }
        Vec::new()
    }

    // --- Helpers ---

    fn hover(&mut self, doc: &DocStore, board_pt: Point) -> Vec<Action> {
        let cursor = if self.ui.mode == Mode::Select || self.ui.mode == Mode::Connect {
            match hit::hit_note(board_pt, doc, &doc.view) {
                Some((_, NotePart::Handle(_))) => "crosshair",
                Some((_, NotePart::ResizeGrip)) if self.ui.mode == Mode::Select => "nwse-resize",
                Some((_, NotePart::Body)) if self.ui.mode == Mode::Select => "move",
                _ => self.ui.mode.cursor(),
            }
        } else {
            self.ui.mode.cursor()
        };
        self.cursor_action(cursor)
    }

    /// Emit `SetCursor` only when the cursor actually changes.
    fn cursor_action(&mut self, cursor: &str) -> Vec<Action> {
        if self.cursor == cursor {
            return Vec::new();
        }
        cursor.clone_into(&mut self.cursor);
        vec![Action::SetCursor(cursor.to_owned())]
    }
}

/// Delete whatever stroke or connector is under the pointer.
fn erase_at(doc: &DocStore, board_pt: Point) -> Option<Action> {
    if let Some(id) = hit::hit_stroke(board_pt, doc, &doc.view) {
        return Some(Action::DeleteStroke(id));
    }
    hit::hit_connector(board_pt, doc, &doc.view).map(Action::DeleteConnector)
}
