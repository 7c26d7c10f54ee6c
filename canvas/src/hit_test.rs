use super::*;
use crate::doc::{NoteKind, Stroke};

fn card(doc: &mut DocStore, x: f64, y: f64) -> NoteId {
    let note = Note::new(NoteKind::Card, x, y);
    let id = note.id;
    doc.push_note(note);
    id
}

// =============================================================
// Notes
// =============================================================

#[test]
fn empty_board_hits_nothing() {
    let doc = DocStore::new();
    assert_eq!(hit_test(Point::new(0.0, 0.0), &doc, &ViewState::default()), None);
}

#[test]
fn body_hit_inside_fallback_size() {
    let mut doc = DocStore::new();
    let id = card(&mut doc, 100.0, 100.0);
    let view = ViewState::default();
    assert_eq!(hit_note(Point::new(200.0, 150.0), &doc, &view), Some((id, NotePart::Body)));
    assert_eq!(hit_note(Point::new(450.0, 150.0), &doc, &view), None);
}

#[test]
fn topmost_note_wins() {
    let mut doc = DocStore::new();
    let _below = card(&mut doc, 0.0, 0.0);
    let above = card(&mut doc, 50.0, 50.0);
    let view = ViewState::default();
    assert_eq!(hit_note(Point::new(100.0, 100.0), &doc, &view), Some((above, NotePart::Body)));
}

#[test]
fn handles_sit_on_vertical_center_of_each_side() {
    let mut doc = DocStore::new();
    let id = card(&mut doc, 100.0, 100.0);
    let note = doc.note(&id).unwrap().clone();
    assert_eq!(handle_position(&doc, &note, Side::Left), Point::new(100.0, 200.0));
    assert_eq!(handle_position(&doc, &note, Side::Right), Point::new(420.0, 200.0));

    let view = ViewState::default();
    assert_eq!(hit_note(Point::new(103.0, 198.0), &doc, &view), Some((id, NotePart::Handle(Side::Left))));
    assert_eq!(hit_note(Point::new(425.0, 200.0), &doc, &view), Some((id, NotePart::Handle(Side::Right))));
}

#[test]
fn handle_slop_shrinks_when_zoomed_in() {
    let mut doc = DocStore::new();
    let id = card(&mut doc, 0.0, 0.0);
    let near = Point::new(-6.0, 100.0);
    let zoomed_out = ViewState::default();
    let zoomed_in = ViewState { zoom: 4.0, ..Default::default() };
    assert_eq!(hit_note(near, &doc, &zoomed_out), Some((id, NotePart::Handle(Side::Left))));
    assert_eq!(hit_note(near, &doc, &zoomed_in), None);
}

#[test]
fn resize_grip_in_bottom_right_corner() {
    let mut doc = DocStore::new();
    let id = card(&mut doc, 0.0, 0.0);
    let view = ViewState::default();
    assert_eq!(hit_note(Point::new(315.0, 195.0), &doc, &view), Some((id, NotePart::ResizeGrip)));
}

// =============================================================
// Connectors
// =============================================================

fn connected_pair(style: ConnectorStyle) -> (DocStore, ConnectorId) {
    let mut doc = DocStore::new();
    let a = card(&mut doc, 0.0, 0.0);
    let b = card(&mut doc, 600.0, 300.0);
    let mut conn = Connector::new(a, Side::Right, b, Side::Left);
    conn.style = style;
    let id = conn.id;
    doc.push_connector(conn);
    (doc, id)
}

#[test]
fn straight_connector_hit_along_segment() {
    let (doc, id) = connected_pair(ConnectorStyle::Straight);
    let view = ViewState::default();
    // From (320, 100) to (600, 400); midpoint (460, 250).
    assert_eq!(hit_connector(Point::new(460.0, 250.0), &doc, &view), Some(id));
    assert_eq!(hit_connector(Point::new(460.0, 150.0), &doc, &view), None);
}

#[test]
fn step_connector_hit_on_vertical_leg() {
    let (doc, id) = connected_pair(ConnectorStyle::Step);
    let view = ViewState::default();
    assert_eq!(hit_connector(Point::new(460.0, 300.0), &doc, &view), Some(id));
}

#[test]
fn curve_connector_path_starts_and_ends_on_handles() {
    let (doc, id) = connected_pair(ConnectorStyle::Curve);
    let conn = doc.connector(&id).unwrap();
    let path = connector_path(&doc, conn).unwrap();
    assert_eq!(path.first().copied(), Some(Point::new(320.0, 100.0)));
    assert_eq!(path.last().copied(), Some(Point::new(600.0, 400.0)));
    assert_eq!(path.len(), CURVE_SAMPLES + 1);
    let view = ViewState::default();
    assert_eq!(hit_connector(path[CURVE_SAMPLES / 2], &doc, &view), Some(id));
}

#[test]
fn dangling_connector_has_no_path() {
    let (mut doc, id) = connected_pair(ConnectorStyle::Curve);
    let conn = doc.connector(&id).unwrap().clone();
    doc.remove_note(&conn.to_id);
    assert!(connector_path(&doc, &conn).is_none());
}

// =============================================================
// Strokes
// =============================================================

#[test]
fn stroke_hit_near_polyline() {
    let mut doc = DocStore::new();
    let stroke = Stroke::new(vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0), Point::new(100.0, 100.0)]);
    let id = stroke.id;
    doc.push_stroke(stroke);
    let view = ViewState::default();
    assert_eq!(hit_stroke(Point::new(50.0, 5.0), &doc, &view), Some(id));
    assert_eq!(hit_stroke(Point::new(104.0, 60.0), &doc, &view), Some(id));
    assert_eq!(hit_stroke(Point::new(50.0, 50.0), &doc, &view), None);
}

#[test]
fn notes_take_precedence_over_strokes() {
    let mut doc = DocStore::new();
    let stroke = Stroke::new(vec![Point::new(0.0, 50.0), Point::new(500.0, 50.0)]);
    doc.push_stroke(stroke);
    let id = card(&mut doc, 100.0, 0.0);
    let view = ViewState::default();
    assert_eq!(hit_test(Point::new(200.0, 50.0), &doc, &view), Some(Hit::Note { id, part: NotePart::Body }));
}

// =============================================================
// Geometry
// =============================================================

#[test]
fn polyline_distance_edge_cases() {
    assert!(polyline_distance(Point::new(0.0, 0.0), &[]).is_infinite());
    let single = [Point::new(3.0, 4.0)];
    assert!((polyline_distance(Point::new(0.0, 0.0), &single) - 5.0).abs() < 1e-9);
    let degenerate = [Point::new(1.0, 1.0), Point::new(1.0, 1.0)];
    assert!((polyline_distance(Point::new(1.0, 4.0), &degenerate) - 3.0).abs() < 1e-9);
}
