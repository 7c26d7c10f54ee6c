use super::*;
use crate::doc::{Connector, Note, NoteKind};

// =============================================================
// Mode
// =============================================================

#[test]
fn mode_default_is_select() {
    assert_eq!(Mode::default(), Mode::Select);
}

#[test]
fn mode_cursors() {
    assert_eq!(Mode::Select.cursor(), "default");
    assert_eq!(Mode::Pan.cursor(), "grab");
    assert_eq!(Mode::Draw.cursor(), "crosshair");
    assert_eq!(Mode::PlaceText.cursor(), "text");
}

// =============================================================
// Modifiers / Key
// =============================================================

#[test]
fn command_is_ctrl_or_meta() {
    assert!(!Modifiers::default().command());
    assert!(Modifiers { ctrl: true, ..Default::default() }.command());
    assert!(Modifiers { meta: true, ..Default::default() }.command());
    assert!(!Modifiers { shift: true, alt: true, ..Default::default() }.command());
}

#[test]
fn key_classification() {
    assert!(Key::new(" ").is_space());
    assert!(Key::new("Space").is_space());
    assert!(Key::new("Delete").is_delete());
    assert!(Key::new("Backspace").is_delete());
    assert!(!Key::new("d").is_delete());
    assert!(Key::new("z").is_letter('z'));
    assert!(Key::new("Z").is_letter('z'));
    assert!(!Key::new("zz").is_letter('z'));
    assert!(!Key::new("").is_letter('z'));
}

// =============================================================
// UiState
// =============================================================

#[test]
fn ui_default_pen() {
    let ui = UiState::default();
    assert_eq!(ui.pen_color, "#ef4444");
    assert!((ui.pen_width - 3.0).abs() < f64::EPSILON);
    assert!(ui.selected.is_empty());
}

#[test]
fn toggle_adds_then_removes() {
    let mut ui = UiState::default();
    let a = uuid::Uuid::new_v4();
    let b = uuid::Uuid::new_v4();
    ui.toggle(a);
    ui.toggle(b);
    assert_eq!(ui.selected, vec![a, b]);
    ui.toggle(a);
    assert_eq!(ui.selected, vec![b]);
}

#[test]
fn note_and_connector_selection_are_exclusive() {
    let mut ui = UiState::default();
    let note = uuid::Uuid::new_v4();
    let conn = uuid::Uuid::new_v4();
    ui.select_only(note);
    ui.select_connector(conn);
    assert!(ui.selected.is_empty());
    assert_eq!(ui.selected_connector, Some(conn));
    ui.select_only(note);
    assert_eq!(ui.selected_connector, None);
    assert!(ui.is_selected(&note));
}

#[test]
fn prune_drops_missing_entities() {
    let mut doc = DocStore::new();
    let a = Note::new(NoteKind::Card, 0.0, 0.0);
    let b = Note::new(NoteKind::Card, 400.0, 0.0);
    let (a_id, b_id) = (a.id, b.id);
    doc.push_note(a);
    doc.push_note(b);
    let conn = Connector::new(a_id, Side::Right, b_id, Side::Left);
    let conn_id = conn.id;
    doc.push_connector(conn);

    let mut ui = UiState::default();
    ui.selected = vec![a_id, b_id, uuid::Uuid::new_v4()];
    ui.prune(&doc);
    assert_eq!(ui.selected, vec![a_id, b_id]);

    ui.select_connector(conn_id);
    doc.remove_note(&a_id);
    ui.prune(&doc);
    assert_eq!(ui.selected_connector, None);
}

// =============================================================
// InputState
// =============================================================

#[test]
fn input_state_default_is_idle() {
    assert!(matches!(InputState::default(), InputState::Idle));
}

#[test]
fn gestures_hold_their_columns() {
    let dragged = uuid::Uuid::new_v4();
    let other = uuid::Uuid::new_v4();
    let drag = InputState::DraggingNotes { ids: vec![dragged], last_board: Point::new(0.0, 0.0), moved: true };
    assert_eq!(drag.held_fields(&dragged), &["x", "y"]);
    assert!(drag.held_fields(&other).is_empty());

    let resize = InputState::ResizingNote {
        id: dragged,
        start_board: Point::new(0.0, 0.0),
        orig_w: 200.0,
        orig_h: 150.0,
        resized: false,
    };
    assert_eq!(resize.held_fields(&dragged), &["width", "height"]);
    assert!(InputState::Idle.held_fields(&dragged).is_empty());
}
