#![allow(clippy::float_cmp)]

use super::*;
use crate::camera::ViewState;
use crate::doc::ConnectorStyle;

// =============================================================
// Helpers
// =============================================================

fn no_modifiers() -> Modifiers {
    Modifiers::default()
}

fn shift() -> Modifiers {
    Modifiers { shift: true, ..Default::default() }
}

fn ctrl() -> Modifiers {
    Modifiers { ctrl: true, ..Default::default() }
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn add_card(doc: &mut DocStore, x: f64, y: f64) -> NoteId {
    let note = Note::new(NoteKind::Card, x, y);
    let id = note.id;
    doc.push_note(note);
    id
}

fn click(engine: &mut EngineCore, doc: &DocStore, at: Point, modifiers: Modifiers) -> Vec<Action> {
    let mut actions = engine.on_pointer_down(doc, at, Button::Primary, modifiers);
    actions.extend(engine.on_pointer_up(doc, at, Button::Primary, modifiers));
    actions
}

fn has(actions: &[Action], pred: impl Fn(&Action) -> bool) -> bool {
    actions.iter().any(pred)
}

// =============================================================
// Modes
// =============================================================

#[test]
fn set_mode_cancels_gesture_and_sets_cursor() {
    let doc = DocStore::new();
    let mut engine = EngineCore::new();
    engine.set_mode(Mode::Draw);
    engine.on_pointer_down(&doc, pt(0.0, 0.0), Button::Primary, no_modifiers());
    assert!(engine.pending_stroke().is_some());

    let actions = engine.set_mode(Mode::Erase);
    assert!(engine.pending_stroke().is_none());
    assert!(matches!(engine.input, InputState::Idle));
    assert!(actions.contains(&Action::SetCursor("cell".into())));
}

#[test]
fn space_enters_pan_only_from_select_and_reverts() {
    let mut engine = EngineCore::new();
    engine.on_key_down(&Key::new(" "), no_modifiers());
    assert_eq!(engine.mode(), Mode::Pan);
    engine.on_key_up(&Key::new(" "), no_modifiers());
    assert_eq!(engine.mode(), Mode::Select);

    engine.set_mode(Mode::Draw);
    engine.on_key_down(&Key::new(" "), no_modifiers());
    assert_eq!(engine.mode(), Mode::Draw);
    engine.on_key_up(&Key::new(" "), no_modifiers());
    assert_eq!(engine.mode(), Mode::Draw);
}

#[test]
fn explicit_pan_mode_survives_space_release() {
    let mut engine = EngineCore::new();
    engine.set_mode(Mode::Pan);
    engine.on_key_up(&Key::new(" "), no_modifiers());
    assert_eq!(engine.mode(), Mode::Pan);
}

#[test]
fn escape_clears_selection_and_returns_to_select() {
    let mut doc = DocStore::new();
    let id = add_card(&mut doc, 0.0, 0.0);
    let mut engine = EngineCore::new();
    click(&mut engine, &doc, pt(100.0, 100.0), no_modifiers());
    assert_eq!(engine.selection(), &[id]);
    engine.set_mode(Mode::Erase);
    engine.on_key_down(&Key::new("Escape"), no_modifiers());
    assert!(engine.selection().is_empty());
    assert_eq!(engine.mode(), Mode::Select);
}

// =============================================================
// Select mode
// =============================================================

#[test]
fn click_on_note_selects_it_alone() {
    let mut doc = DocStore::new();
    let a = add_card(&mut doc, 0.0, 0.0);
    let b = add_card(&mut doc, 500.0, 0.0);
    let mut engine = EngineCore::new();
    click(&mut engine, &doc, pt(100.0, 100.0), no_modifiers());
    click(&mut engine, &doc, pt(600.0, 100.0), no_modifiers());
    assert_eq!(engine.selection(), &[b]);
    assert!(!engine.ui.is_selected(&a));
}

#[test]
fn shift_click_toggles_membership() {
    let mut doc = DocStore::new();
    let a = add_card(&mut doc, 0.0, 0.0);
    let b = add_card(&mut doc, 500.0, 0.0);
    let mut engine = EngineCore::new();
    click(&mut engine, &doc, pt(100.0, 100.0), no_modifiers());
    click(&mut engine, &doc, pt(600.0, 100.0), shift());
    assert_eq!(engine.selection(), &[a, b]);
    click(&mut engine, &doc, pt(100.0, 100.0), shift());
    assert_eq!(engine.selection(), &[b]);
}

#[test]
fn click_on_empty_canvas_clears_unless_shift() {
    let mut doc = DocStore::new();
    let a = add_card(&mut doc, 0.0, 0.0);
    let mut engine = EngineCore::new();
    click(&mut engine, &doc, pt(100.0, 100.0), no_modifiers());
    click(&mut engine, &doc, pt(2000.0, 2000.0), shift());
    assert_eq!(engine.selection(), &[a]);
    click(&mut engine, &doc, pt(2000.0, 2000.0), no_modifiers());
    assert!(engine.selection().is_empty());
}

#[test]
fn drag_moves_locally_then_commits_once() {
    let mut doc = DocStore::new();
    let a = add_card(&mut doc, 0.0, 0.0);
    let mut engine = EngineCore::new();

    engine.on_pointer_down(&doc, pt(100.0, 100.0), Button::Primary, no_modifiers());
    let m1 = engine.on_pointer_move(&doc, pt(110.0, 105.0), no_modifiers());
    let m2 = engine.on_pointer_move(&doc, pt(130.0, 125.0), no_modifiers());
    assert!(m1.contains(&Action::MoveNotesLocal { ids: vec![a], dx: 10.0, dy: 5.0 }));
    assert!(m2.contains(&Action::MoveNotesLocal { ids: vec![a], dx: 20.0, dy: 20.0 }));
    assert!(!has(&m2, |x| matches!(x, Action::CommitPositions { .. })));

    let up = engine.on_pointer_up(&doc, pt(130.0, 125.0), Button::Primary, no_modifiers());
    assert!(up.contains(&Action::CommitPositions { ids: vec![a] }));
}

#[test]
fn click_without_move_commits_nothing() {
    let mut doc = DocStore::new();
    add_card(&mut doc, 0.0, 0.0);
    let mut engine = EngineCore::new();
    let actions = click(&mut engine, &doc, pt(100.0, 100.0), no_modifiers());
    assert!(!has(&actions, |x| matches!(x, Action::CommitPositions { .. })));
}

#[test]
fn dragging_member_of_selection_moves_all_selected() {
    let mut doc = DocStore::new();
    let a = add_card(&mut doc, 0.0, 0.0);
    let b = add_card(&mut doc, 500.0, 0.0);
    let mut engine = EngineCore::new();
    click(&mut engine, &doc, pt(100.0, 100.0), no_modifiers());
    click(&mut engine, &doc, pt(600.0, 100.0), shift());

    engine.on_pointer_down(&doc, pt(100.0, 100.0), Button::Primary, no_modifiers());
    let moved = engine.on_pointer_move(&doc, pt(150.0, 100.0), no_modifiers());
    assert!(moved.contains(&Action::MoveNotesLocal { ids: vec![a, b], dx: 50.0, dy: 0.0 }));
}

#[test]
fn drag_delta_is_in_board_units() {
    let mut doc = DocStore::new();
    doc.view = ViewState { zoom: 2.0, ..Default::default() };
    let a = add_card(&mut doc, 0.0, 0.0);
    let mut engine = EngineCore::new();
    engine.on_pointer_down(&doc, pt(200.0, 200.0), Button::Primary, no_modifiers());
    let moved = engine.on_pointer_move(&doc, pt(240.0, 200.0), no_modifiers());
    assert!(moved.contains(&Action::MoveNotesLocal { ids: vec![a], dx: 20.0, dy: 0.0 }));
}

#[test]
fn click_on_connector_selects_it_and_clears_notes() {
    let mut doc = DocStore::new();
    let a = add_card(&mut doc, 0.0, 0.0);
    let b = add_card(&mut doc, 600.0, 0.0);
    let mut conn = Connector::new(a, Side::Right, b, Side::Left);
    conn.style = ConnectorStyle::Straight;
    let cid = conn.id;
    doc.push_connector(conn);

    let mut engine = EngineCore::new();
    click(&mut engine, &doc, pt(100.0, 100.0), no_modifiers());
    click(&mut engine, &doc, pt(460.0, 100.0), no_modifiers());
    assert_eq!(engine.ui.selected_connector, Some(cid));
    assert!(engine.selection().is_empty());
}

#[test]
fn resize_clamps_to_minimum_and_commits() {
    let mut doc = DocStore::new();
    let a = add_card(&mut doc, 0.0, 0.0);
    let mut engine = EngineCore::new();
    engine.on_pointer_down(&doc, pt(315.0, 195.0), Button::Primary, no_modifiers());
    let grow = engine.on_pointer_move(&doc, pt(415.0, 245.0), no_modifiers());
    assert!(grow.contains(&Action::ResizeNoteLocal { id: a, width: 420.0, height: 250.0 }));
    let shrink = engine.on_pointer_move(&doc, pt(0.0, 0.0), no_modifiers());
    assert!(shrink.contains(&Action::ResizeNoteLocal { id: a, width: 200.0, height: 150.0 }));
    let up = engine.on_pointer_up(&doc, pt(0.0, 0.0), Button::Primary, no_modifiers());
    assert!(up.contains(&Action::CommitSize { id: a }));
}

#[test]
fn double_click_note_requests_edit() {
    let mut doc = DocStore::new();
    let a = add_card(&mut doc, 0.0, 0.0);
    let mut engine = EngineCore::new();
    let actions = engine.on_double_click(&doc, pt(50.0, 50.0));
    assert_eq!(actions, vec![Action::EditTextRequested { id: a }]);
}

#[test]
fn double_click_stroke_deletes_it() {
    let mut doc = DocStore::new();
    let stroke = Stroke::new(vec![pt(0.0, 0.0), pt(100.0, 0.0)]);
    let sid = stroke.id;
    doc.push_stroke(stroke);
    let mut engine = EngineCore::new();
    let actions = engine.on_double_click(&doc, pt(50.0, 1.0));
    assert!(actions.contains(&Action::DeleteStroke(sid)));
}

// =============================================================
// Connect
// =============================================================

#[test]
fn handle_drag_to_other_handle_adds_connector() {
    let mut doc = DocStore::new();
    let a = add_card(&mut doc, 100.0, 100.0);
    let b = add_card(&mut doc, 600.0, 100.0);
    let mut engine = EngineCore::new();
    engine.set_mode(Mode::Connect);

    engine.on_pointer_down(&doc, pt(420.0, 200.0), Button::Primary, no_modifiers());
    engine.on_pointer_move(&doc, pt(500.0, 200.0), no_modifiers());
    assert_eq!(engine.pending_connector(), Some((a, Side::Right, pt(500.0, 200.0))));

    let up = engine.on_pointer_up(&doc, pt(601.0, 201.0), Button::Primary, no_modifiers());
    let conn = up
        .iter()
        .find_map(|x| match x {
            Action::AddConnector(c) => Some(c.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!((conn.from_id, conn.to_id), (a, b));
    assert_eq!(conn.source_handle, Some(Side::Right));
    assert_eq!(conn.target_handle, Some(Side::Left));
    assert_eq!(conn.style, ConnectorStyle::Curve);
    assert_eq!(conn.color, "#6b7280");
    assert!(engine.pending_connector().is_none());
}

#[test]
fn handle_drag_works_in_select_mode() {
    let mut doc = DocStore::new();
    add_card(&mut doc, 100.0, 100.0);
    add_card(&mut doc, 600.0, 100.0);
    let mut engine = EngineCore::new();
    engine.on_pointer_down(&doc, pt(420.0, 200.0), Button::Primary, no_modifiers());
    let up = engine.on_pointer_up(&doc, pt(600.0, 200.0), Button::Primary, no_modifiers());
    assert!(has(&up, |x| matches!(x, Action::AddConnector(_))));
}

#[test]
fn release_on_canvas_or_same_note_cancels() {
    let mut doc = DocStore::new();
    add_card(&mut doc, 100.0, 100.0);
    let mut engine = EngineCore::new();
    engine.set_mode(Mode::Connect);

    engine.on_pointer_down(&doc, pt(420.0, 200.0), Button::Primary, no_modifiers());
    let up = engine.on_pointer_up(&doc, pt(900.0, 900.0), Button::Primary, no_modifiers());
    assert!(!has(&up, |x| matches!(x, Action::AddConnector(_))));

    engine.on_pointer_down(&doc, pt(420.0, 200.0), Button::Primary, no_modifiers());
    let up = engine.on_pointer_up(&doc, pt(100.0, 200.0), Button::Primary, no_modifiers());
    assert!(!has(&up, |x| matches!(x, Action::AddConnector(_))));
}

#[test]
fn connect_mode_press_off_handle_does_nothing() {
    let mut doc = DocStore::new();
    add_card(&mut doc, 100.0, 100.0);
    let mut engine = EngineCore::new();
    engine.set_mode(Mode::Connect);
    let actions = engine.on_pointer_down(&doc, pt(200.0, 150.0), Button::Primary, no_modifiers());
    assert!(actions.is_empty());
    assert!(matches!(engine.input, InputState::Idle));
}

// =============================================================
// Draw / text / erase / pan
// =============================================================

#[test]
fn draw_commits_multi_point_stroke() {
    let doc = DocStore::new();
    let mut engine = EngineCore::new();
    engine.set_mode(Mode::Draw);
    engine.on_pointer_down(&doc, pt(0.0, 0.0), Button::Primary, no_modifiers());
    engine.on_pointer_move(&doc, pt(10.0, 10.0), no_modifiers());
    engine.on_pointer_move(&doc, pt(20.0, 5.0), no_modifiers());
    let up = engine.on_pointer_up(&doc, pt(20.0, 5.0), Button::Primary, no_modifiers());
    let stroke = up
        .iter()
        .find_map(|x| match x {
            Action::AddStroke(s) => Some(s.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(stroke.points, vec![pt(0.0, 0.0), pt(10.0, 10.0), pt(20.0, 5.0)]);
    assert_eq!(stroke.color, "#ef4444");
    assert_eq!(stroke.stroke_width, 3.0);
}

#[test]
fn draw_single_point_is_discarded() {
    let doc = DocStore::new();
    let mut engine = EngineCore::new();
    engine.set_mode(Mode::Draw);
    let actions = click(&mut engine, &doc, pt(5.0, 5.0), no_modifiers());
    assert!(!has(&actions, |x| matches!(x, Action::AddStroke(_))));
}

#[test]
fn draw_points_are_board_space() {
    let mut doc = DocStore::new();
    doc.view = ViewState { x: 100.0, y: 0.0, zoom: 2.0, ..Default::default() };
    let mut engine = EngineCore::new();
    engine.set_mode(Mode::Draw);
    engine.on_pointer_down(&doc, pt(100.0, 0.0), Button::Primary, no_modifiers());
    engine.on_pointer_move(&doc, pt(300.0, 200.0), no_modifiers());
    assert_eq!(engine.pending_stroke(), Some(&[pt(0.0, 0.0), pt(100.0, 100.0)][..]));
}

#[test]
fn place_text_creates_one_text_note_then_reverts() {
    let doc = DocStore::new();
    let mut engine = EngineCore::new();
    engine.set_mode(Mode::PlaceText);
    let actions = engine.on_pointer_down(&doc, pt(40.0, 60.0), Button::Primary, no_modifiers());
    let note = actions
        .iter()
        .find_map(|x| match x {
            Action::CreateNote(n) => Some(n.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(note.kind, NoteKind::Text);
    assert_eq!(note.title, "");
    assert_eq!(note.content, "Type here...");
    assert_eq!(note.color, NoteColor::Gray);
    assert_eq!((note.x, note.y), (40.0, 60.0));
    assert_eq!(engine.mode(), Mode::Select);

    let again = engine.on_pointer_down(&doc, pt(900.0, 900.0), Button::Primary, no_modifiers());
    assert!(!has(&again, |x| matches!(x, Action::CreateNote(_))));
}

#[test]
fn erase_click_and_sweep() {
    let mut doc = DocStore::new();
    let s1 = Stroke::new(vec![pt(0.0, 0.0), pt(100.0, 0.0)]);
    let s2 = Stroke::new(vec![pt(0.0, 300.0), pt(100.0, 300.0)]);
    let (id1, id2) = (s1.id, s2.id);
    doc.push_stroke(s1);
    doc.push_stroke(s2);
    let mut engine = EngineCore::new();
    engine.set_mode(Mode::Erase);

    let down = engine.on_pointer_down(&doc, pt(50.0, 0.0), Button::Primary, no_modifiers());
    assert_eq!(down, vec![Action::DeleteStroke(id1)]);
    let sweep = engine.on_pointer_move(&doc, pt(50.0, 300.0), no_modifiers());
    assert_eq!(sweep, vec![Action::DeleteStroke(id2)]);
    engine.on_pointer_up(&doc, pt(50.0, 300.0), Button::Primary, no_modifiers());

    let hover = engine.on_pointer_move(&doc, pt(50.0, 0.0), no_modifiers());
    assert!(!has(&hover, |x| matches!(x, Action::DeleteStroke(_))));
}

#[test]
fn pan_mode_emits_raw_screen_delta() {
    let mut doc = DocStore::new();
    doc.view.zoom = 3.0;
    let mut engine = EngineCore::new();
    engine.set_mode(Mode::Pan);
    engine.on_pointer_down(&doc, pt(10.0, 10.0), Button::Primary, no_modifiers());
    let moved = engine.on_pointer_move(&doc, pt(25.0, 5.0), no_modifiers());
    assert!(moved.contains(&Action::Pan { dx: 15.0, dy: -5.0 }));
}

#[test]
fn middle_button_pans_in_any_mode() {
    let doc = DocStore::new();
    let mut engine = EngineCore::new();
    engine.set_mode(Mode::Draw);
    engine.on_pointer_down(&doc, pt(0.0, 0.0), Button::Middle, no_modifiers());
    let moved = engine.on_pointer_move(&doc, pt(-4.0, 8.0), no_modifiers());
    assert!(moved.contains(&Action::Pan { dx: -4.0, dy: 8.0 }));
    assert!(engine.pending_stroke().is_none());
}

// =============================================================
// Wheel / keyboard
// =============================================================

#[test]
fn wheel_pans_inverted_without_modifier() {
    let mut engine = EngineCore::new();
    let actions = engine.on_wheel(pt(0.0, 0.0), WheelDelta { dx: 3.0, dy: -7.0 }, no_modifiers());
    assert!(actions.contains(&Action::Pan { dx: -3.0, dy: 7.0 }));
}

#[test]
fn ctrl_wheel_zooms() {
    let mut engine = EngineCore::new();
    let up = engine.on_wheel(pt(0.0, 0.0), WheelDelta { dx: 0.0, dy: -1.0 }, ctrl());
    assert!(up.contains(&Action::ZoomIn));
    let meta = Modifiers { meta: true, ..Default::default() };
    let down = engine.on_wheel(pt(0.0, 0.0), WheelDelta { dx: 0.0, dy: 4.0 }, meta);
    assert!(down.contains(&Action::ZoomOut));
}

#[test]
fn undo_redo_shortcuts() {
    let mut engine = EngineCore::new();
    assert_eq!(engine.on_key_down(&Key::new("z"), ctrl()), vec![Action::Undo]);
    let ctrl_shift = Modifiers { ctrl: true, shift: true, ..Default::default() };
    assert_eq!(engine.on_key_down(&Key::new("Z"), ctrl_shift), vec![Action::Redo]);
    assert_eq!(engine.on_key_down(&Key::new("y"), ctrl()), vec![Action::Redo]);
    assert!(engine.on_key_down(&Key::new("z"), no_modifiers()).is_empty());
}

#[test]
fn delete_prefers_connector_then_notes() {
    let mut doc = DocStore::new();
    let a = add_card(&mut doc, 0.0, 0.0);
    let mut engine = EngineCore::new();
    let cid = uuid::Uuid::new_v4();
    engine.ui.select_connector(cid);
    let first = engine.on_key_down(&Key::new("Delete"), no_modifiers());
    assert!(first.contains(&Action::DeleteConnector(cid)));

    click(&mut engine, &doc, pt(100.0, 100.0), no_modifiers());
    let second = engine.on_key_down(&Key::new("Backspace"), no_modifiers());
    assert!(second.contains(&Action::DeleteNotes(vec![a])));
    assert!(engine.selection().is_empty());

    assert!(engine.on_key_down(&Key::new("Delete"), no_modifiers()).is_empty());
}

#[test]
fn hover_cursor_changes_only_on_transition() {
    let mut doc = DocStore::new();
    add_card(&mut doc, 0.0, 0.0);
    let mut engine = EngineCore::new();
    let first = engine.on_pointer_move(&doc, pt(100.0, 50.0), no_modifiers());
    assert!(first.contains(&Action::SetCursor("move".into())));
    let second = engine.on_pointer_move(&doc, pt(110.0, 50.0), no_modifiers());
    assert!(second.is_empty());
    let grip = engine.on_pointer_move(&doc, pt(315.0, 195.0), no_modifiers());
    assert!(grip.contains(&Action::SetCursor("nwse-resize".into())));
}
