//! Id-keyed diff between two board snapshots, expressed as remote writes.
//!
//! Used by undo, redo, and reset to bring the remote store in line with a
//! wholesale local state replacement. Entities are compared by their
//! persisted row, so session-local fields never produce writes.
//!
//! Ordering keeps referential integrity at every step: connector deletes run
//! before note deletes, and note inserts before connector inserts. Replaying
//! the same diff twice is harmless because inserts are upserts and deleting
//! a missing row succeeds.

#[cfg(test)]
#[path = "diff_test.rs"]
mod diff_test;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::doc::{BoardId, BoardSnapshot};
use crate::rows::{ConnectorRow, Fields, NoteRow, RemoteOp, Row, StrokeRow, Table, to_fields};

/// Per-kind result of comparing two id-keyed collections.
struct KindDiff<R> {
    inserted: Vec<R>,
    updated: Vec<R>,
    deleted: Vec<Uuid>,
}

fn diff_rows<R, K>(old: &[R], new: &[R], id_of: K) -> KindDiff<R>
where
    R: Clone + PartialEq,
    K: Fn(&R) -> Uuid,
{
    let old_by_id: HashMap<Uuid, &R> = old.iter().map(|r| (id_of(r), r)).collect();
    let new_ids: HashSet<Uuid> = new.iter().map(&id_of).collect();

    let mut inserted = Vec::new();
    let mut updated = Vec::new();
    for row in new {
        match old_by_id.get(&id_of(row)) {
            None => inserted.push(row.clone()),
            Some(prev) if *prev != row => updated.push(row.clone()),
            Some(_) => {}
        }
    }
    let deleted = old.iter().map(&id_of).filter(|id| !new_ids.contains(id)).collect();

    KindDiff { inserted, updated, deleted }
}

fn update_op<R: Serialize>(table: Table, id: Uuid, row: &R) -> Option<RemoteOp> {
    let mut fields: Fields = match to_fields(row) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::warn!(table = table.as_str(), %id, error = %e, "diff: row not serializable");
            return None;
        }
    };
    fields.remove("id");
    fields.remove("board_id");
    Some(RemoteOp::Update { table, id, fields })
}

/// Compute the remote writes that turn `old` into `new`.
#[must_use]
pub fn diff_snapshots(old: &BoardSnapshot, new: &BoardSnapshot, board_id: BoardId) -> Vec<RemoteOp> {
    let note_rows = |s: &BoardSnapshot| -> Vec<NoteRow> {
        s.notes.iter().map(|n| NoteRow::from_note(n, board_id)).collect()
    };
    let conn_rows = |s: &BoardSnapshot| -> Vec<ConnectorRow> {
        s.connectors.iter().map(|c| ConnectorRow::from_connector(c, board_id)).collect()
    };
    let stroke_rows = |s: &BoardSnapshot| -> Vec<StrokeRow> {
        s.strokes.iter().map(|st| StrokeRow::from_stroke(st, board_id)).collect()
    };

    let notes = diff_rows(&note_rows(old), &note_rows(new), |r| r.id);
    let conns = diff_rows(&conn_rows(old), &conn_rows(new), |r| r.id);
    let strokes = diff_rows(&stroke_rows(old), &stroke_rows(new), |r| r.id);

    let mut ops = Vec::new();

    // Deletes, dependents first.
    ops.extend(conns.deleted.iter().map(|id| RemoteOp::Delete { table: Table::Connectors, id: *id }));
    ops.extend(strokes.deleted.iter().map(|id| RemoteOp::Delete { table: Table::Strokes, id: *id }));
    ops.extend(notes.deleted.iter().map(|id| RemoteOp::Delete { table: Table::Notes, id: *id }));

    // Inserts and updates, referenced rows first.
    ops.extend(notes.inserted.into_iter().map(|r| RemoteOp::Insert(Row::Note(r))));
    ops.extend(notes.updated.iter().filter_map(|r| update_op(Table::Notes, r.id, r)));
    ops.extend(conns.inserted.into_iter().map(|r| RemoteOp::Insert(Row::Connector(r))));
    ops.extend(conns.updated.iter().filter_map(|r| update_op(Table::Connectors, r.id, r)));
    ops.extend(strokes.inserted.into_iter().map(|r| RemoteOp::Insert(Row::Stroke(r))));
    ops.extend(strokes.updated.iter().filter_map(|r| update_op(Table::Strokes, r.id, r)));

    ops
}
