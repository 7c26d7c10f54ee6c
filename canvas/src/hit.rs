//! Hit-testing against notes, connectors, and strokes.
//!
//! All tests take a board-space point. Slop for handles and thin geometry is
//! a fixed screen distance converted through the current zoom, so targets
//! keep the same on-screen size at every zoom level.

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::camera::{Point, ViewState};
use crate::consts::{CURVE_CONTROL_OFFSET, CURVE_SAMPLES, HANDLE_RADIUS_PX, RESIZE_GRIP_SIZE};
use crate::doc::{Connector, ConnectorId, ConnectorStyle, DocStore, Note, NoteId, Side, StrokeId};

/// Which part of a note was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotePart {
    Body,
    /// Connection handle on the left or right edge.
    Handle(Side),
    /// Bottom-right resize grip.
    ResizeGrip,
}

/// Result of a hit test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Note { id: NoteId, part: NotePart },
    Connector(ConnectorId),
    Stroke(StrokeId),
}

/// Board-space center of a note's connection handle.
#[must_use]
pub fn handle_position(doc: &DocStore, note: &Note, side: Side) -> Point {
    let size = doc.note_size(note);
    let y = note.y + size.height / 2.0;
    match side {
        Side::Left => Point::new(note.x, y),
        Side::Right => Point::new(note.x + size.width, y),
    }
}

/// Test everything under `pt`: note handles and grips, then note bodies,
/// then connectors, then strokes. Notes are tested topmost first.
#[must_use]
pub fn hit_test(pt: Point, doc: &DocStore, view: &ViewState) -> Option<Hit> {
    if let Some((id, part)) = hit_note(pt, doc, view) {
        return Some(Hit::Note { id, part });
    }
    if let Some(id) = hit_connector(pt, doc, view) {
        return Some(Hit::Connector(id));
    }
    hit_stroke(pt, doc, view).map(Hit::Stroke)
}

/// Topmost note under `pt`, preferring handles and grips over bodies.
#[must_use]
pub fn hit_note(pt: Point, doc: &DocStore, view: &ViewState) -> Option<(NoteId, NotePart)> {
    let slop = view.screen_dist_to_board(HANDLE_RADIUS_PX);

    for note in doc.notes().iter().rev() {
        for side in [Side::Left, Side::Right] {
            if handle_position(doc, note, side).distance(pt) <= slop {
                return Some((note.id, NotePart::Handle(side)));
            }
        }
        let size = doc.note_size(note);
        let right = note.x + size.width;
        let bottom = note.y + size.height;
        if pt.x >= right - RESIZE_GRIP_SIZE && pt.x <= right && pt.y >= bottom - RESIZE_GRIP_SIZE && pt.y <= bottom {
            return Some((note.id, NotePart::ResizeGrip));
        }
    }

    doc.notes()
        .iter()
        .rev()
        .find(|note| {
            let size = doc.note_size(note);
            pt.x >= note.x && pt.x <= note.x + size.width && pt.y >= note.y && pt.y <= note.y + size.height
        })
        .map(|note| (note.id, NotePart::Body))
}

/// Last-drawn connector whose path passes within slop of `pt`.
#[must_use]
pub fn hit_connector(pt: Point, doc: &DocStore, view: &ViewState) -> Option<ConnectorId> {
    let slop = view.screen_dist_to_board(HANDLE_RADIUS_PX);
    doc.connectors()
        .iter()
        .rev()
        .find(|conn| {
            connector_path(doc, conn)
                .is_some_and(|path| polyline_distance(pt, &path) <= slop + conn.stroke_width / 2.0)
        })
        .map(|conn| conn.id)
}

/// Last-drawn stroke passing within slop of `pt`.
#[must_use]
pub fn hit_stroke(pt: Point, doc: &DocStore, view: &ViewState) -> Option<StrokeId> {
    let slop = view.screen_dist_to_board(HANDLE_RADIUS_PX);
    doc.strokes()
        .iter()
        .rev()
        .find(|stroke| polyline_distance(pt, &stroke.points) <= slop + stroke.stroke_width / 2.0)
        .map(|stroke| stroke.id)
}

/// Polyline approximation of a connector's rendered path.
///
/// Returns `None` if either endpoint note is missing. A missing source side
/// defaults to right, a missing target side to left.
#[must_use]
pub fn connector_path(doc: &DocStore, conn: &Connector) -> Option<Vec<Point>> {
    let from = doc.note(&conn.from_id)?;
    let to = doc.note(&conn.to_id)?;
    let source_side = conn.source_handle.unwrap_or(Side::Right);
    let target_side = conn.target_handle.unwrap_or(Side::Left);
    let start = handle_position(doc, from, source_side);
    let end = handle_position(doc, to, target_side);

    Some(match conn.style {
        ConnectorStyle::Straight => vec![start, end],
        ConnectorStyle::Step => {
            let mid_x = (start.x + end.x) / 2.0;
            vec![start, Point::new(mid_x, start.y), Point::new(mid_x, end.y), end]
        }
        ConnectorStyle::Curve => {
            let c1 = Point::new(start.x + side_offset(source_side), start.y);
            let c2 = Point::new(end.x + side_offset(target_side), end.y);
            sample_cubic(start, c1, c2, end)
        }
    })
}

fn side_offset(side: Side) -> f64 {
    match side {
        Side::Left => -CURVE_CONTROL_OFFSET,
        Side::Right => CURVE_CONTROL_OFFSET,
    }
}

#[allow(clippy::cast_precision_loss)]
fn sample_cubic(p0: Point, p1: Point, p2: Point, p3: Point) -> Vec<Point> {
    (0..=CURVE_SAMPLES)
        .map(|i| {
            let t = i as f64 / CURVE_SAMPLES as f64;
            let u = 1.0 - t;
            let a = u * u * u;
            let b = 3.0 * u * u * t;
            let c = 3.0 * u * t * t;
            let d = t * t * t;
            Point::new(
                a * p0.x + b * p1.x + c * p2.x + d * p3.x,
                a * p0.y + b * p1.y + c * p2.y + d * p3.y,
            )
        })
        .collect()
}

/// Shortest distance from `pt` to a polyline. Infinite for an empty path.
#[must_use]
pub fn polyline_distance(pt: Point, path: &[Point]) -> f64 {
    match path {
        [] => f64::INFINITY,
        [only] => only.distance(pt),
        _ => path
            .windows(2)
            .map(|w| segment_distance(pt, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

fn segment_distance(pt: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq <= f64::EPSILON {
        return a.distance(pt);
    }
    let t = (((pt.x - a.x) * dx + (pt.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    Point::new(a.x + t * dx, a.y + t * dy).distance(pt)
}
