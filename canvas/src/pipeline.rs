//! Optimistic mutation pipeline: apply locally, then hand a remote write to a sink.
//!
//! DESIGN
//! ======
//! Every state-changing operation follows the same three steps:
//!
//! 1. push a pre-mutation snapshot if the change is its own undo step,
//! 2. mutate the `DocStore` synchronously,
//! 3. submit one or more [`RemoteOp`]s to the [`OpSink`].
//!
//! The sink must not block; the host implementation enqueues onto a bounded
//! channel drained by a background task. Remote failures never roll back
//! the local change.
//!
//! ERROR HANDLING
//! ==============
//! Unknown ids, self-connections, and empty strokes are silent no-ops.
//! A read-only pipeline ignores every document mutation but still pans and
//! zooms.

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;

use serde::Serialize;
use uuid::Uuid;

use crate::camera::{Point, ViewState, ZoomLimits};
use crate::consts::DUPLICATE_OFFSET;
use crate::diff::diff_snapshots;
use crate::doc::{
    BoardId, BoardSnapshot, Category, Connector, ConnectorId, ConnectorPatch, DocStore, Note,
    NoteColor, NoteId, NotePatch, Stroke, StrokeId,
};
use crate::engine::Action;
use crate::history::History;
use crate::input::UiState;
use crate::reconcile::{ChangeOutcome, PendingWrites, apply_change, without_fields};
use crate::rows::{ChangeEvent, ChangeKind, ConnectorRow, NoteRow, RemoteOp, Row, StrokeRow, Table, to_fields};

/// Destination for remote writes. Implementations must return immediately.
pub trait OpSink: Send {
    fn submit(&self, op: RemoteOp);
}

/// Sink that drops every write. Used for detached local boards.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OpSink for NullSink {
    fn submit(&self, _op: RemoteOp) {}
}

/// Owns the board document and history, and routes every mutation to the sink.
pub struct Pipeline {
    board_id: BoardId,
    doc: DocStore,
    history: History,
    sink: Box<dyn OpSink>,
    pending: PendingWrites,
    limits: ZoomLimits,
    read_only: bool,
}

impl Pipeline {
    #[must_use]
    pub fn new(board_id: BoardId, sink: Box<dyn OpSink>) -> Self {
        Self {
            board_id,
            doc: DocStore::new(),
            history: History::default(),
            sink,
            pending: PendingWrites::default(),
            limits: ZoomLimits::default(),
            read_only: false,
        }
    }

    #[must_use]
    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history = History::new(depth);
        self
    }

    #[must_use]
    pub fn with_zoom_limits(mut self, limits: ZoomLimits) -> Self {
        self.limits = limits;
        self
    }

    // --- Accessors ---

    #[must_use]
    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    #[must_use]
    pub fn doc(&self) -> &DocStore {
        &self.doc
    }

    /// Direct document access for inbound remote changes. Nothing done
    /// through this reference is written remotely or recorded in history.
    pub fn doc_mut(&mut self) -> &mut DocStore {
        &mut self.doc
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Local writes whose feed echo has not arrived yet.
    #[must_use]
    pub fn pending_writes(&self) -> &PendingWrites {
        &self.pending
    }

    /// Replace the whole document with freshly loaded contents. No history,
    /// no writes. Zoom is clamped to the configured limits.
    pub fn load(&mut self, snapshot: BoardSnapshot, view: ViewState) {
        self.doc.restore(snapshot);
        self.pending.clear();
        self.set_view(view);
    }

    // --- Remote plumbing ---

    fn submit(&mut self, op: RemoteOp) {
        self.pending.record(&op);
        self.sink.submit(op);
    }

    /// A submitted write will never echo (it failed or was dropped).
    pub fn write_failed(&mut self, kind: ChangeKind, id: &Uuid) {
        if kind != ChangeKind::Delete {
            self.pending.acknowledge(id);
        }
    }

    /// Merge one inbound feed event.
    ///
    /// The first insert or update for an id with a local write outstanding
    /// is that write's echo and is not merged. `held` lists note columns an
    /// active gesture owns; they are stripped from the event first.
    pub fn apply_remote(&mut self, event: &ChangeEvent, ui: &mut UiState, held: &[&str]) -> ChangeOutcome {
        if let Some(id) = event.id() {
            match event.kind {
                ChangeKind::Insert | ChangeKind::Update if self.pending.acknowledge(&id) => {
                    return ChangeOutcome::Echo;
                }
                ChangeKind::Delete => self.pending.forget(&id),
                _ => {}
            }
        }
        if held.is_empty() || event.table != Table::Notes {
            apply_change(&mut self.doc, self.board_id, event, ui)
        } else {
            apply_change(&mut self.doc, self.board_id, &without_fields(event, held), ui)
        }
    }

    fn submit_update<P: Serialize>(&mut self, table: Table, id: Uuid, patch: &P) {
        match to_fields(patch) {
            Ok(fields) if fields.is_empty() => {}
            Ok(fields) => self.submit(RemoteOp::Update { table, id, fields }),
            Err(e) => tracing::warn!(table = table.as_str(), %id, error = %e, "pipeline: patch not serializable"),
        }
    }

    fn insert_note_row(&mut self, note: &Note) {
        let row = NoteRow::from_note(note, self.board_id);
        self.submit(RemoteOp::Insert(Row::Note(row)));
    }

    fn delete_connector_rows(&mut self, removed: &[Connector]) {
        for conn in removed {
            self.submit(RemoteOp::Delete { table: Table::Connectors, id: conn.id });
        }
    }

    // --- History ---

    /// Record the current state as an undo step.
    pub fn push_history(&mut self) {
        if self.read_only {
            return;
        }
        self.history.push(self.doc.snapshot());
    }

    /// Restore the previous state. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        if self.read_only {
            return false;
        }
        let current = self.doc.snapshot();
        let Some(previous) = self.history.undo(current.clone()) else {
            return false;
        };
        self.replace_state(&current, previous);
        true
    }

    /// Re-apply an undone state. Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        if self.read_only {
            return false;
        }
        let current = self.doc.snapshot();
        let Some(next) = self.history.redo(current.clone()) else {
            return false;
        };
        self.replace_state(&current, next);
        true
    }

    fn replace_state(&mut self, current: &BoardSnapshot, target: BoardSnapshot) {
        let ops = diff_snapshots(current, &target, self.board_id);
        self.doc.restore(target);
        for op in ops {
            self.submit(op);
        }
    }

    // --- Notes ---

    /// Insert a note on top. Duplicate ids are ignored.
    pub fn add_note(&mut self, note: Note) {
        if self.read_only || self.doc.note(&note.id).is_some() {
            return;
        }
        self.push_history();
        self.insert_note_row(&note);
        self.doc.push_note(note);
    }

    /// Field-level edit without an undo step (text edits, tags, drags).
    pub fn update_note(&mut self, id: &NoteId, patch: &NotePatch) {
        if self.read_only || patch.is_empty() {
            return;
        }
        if self.doc.apply_note_patch(id, patch) {
            self.submit_update(Table::Notes, *id, patch);
        }
    }

    /// Move one note to an absolute position and persist it.
    pub fn move_note(&mut self, id: &NoteId, x: f64, y: f64) {
        self.update_note(id, &NotePatch::position(x, y));
    }

    /// Shift notes during a drag. Local only.
    pub fn move_notes_local(&mut self, ids: &[NoteId], dx: f64, dy: f64) {
        if self.read_only {
            return;
        }
        self.doc.translate_notes(ids, dx, dy);
    }

    /// Persist the final positions after a drag, snapping when enabled.
    pub fn commit_positions(&mut self, ids: &[NoteId]) {
        if self.read_only {
            return;
        }
        for id in ids {
            let Some(note) = self.doc.note(id) else {
                continue;
            };
            let pos = self.doc.view.snap(Point::new(note.x, note.y));
            let patch = NotePatch::position(pos.x, pos.y);
            self.doc.apply_note_patch(id, &patch);
            self.submit_update(Table::Notes, *id, &patch);
        }
    }

    /// Set a note's size during a resize drag. Local only.
    pub fn resize_note_local(&mut self, id: &NoteId, width: f64, height: f64) {
        if self.read_only {
            return;
        }
        self.doc.apply_note_patch(id, &NotePatch::size(width, height));
    }

    /// Persist a note's current explicit size.
    pub fn commit_size(&mut self, id: &NoteId) {
        if self.read_only {
            return;
        }
        let Some(note) = self.doc.note(id) else {
            return;
        };
        let patch = NotePatch { width: Some(note.width), height: Some(note.height), ..Default::default() };
        self.submit_update(Table::Notes, *id, &patch);
    }

    /// Delete a note and every connector touching it.
    pub fn delete_note(&mut self, id: &NoteId) {
        self.delete_notes(std::slice::from_ref(id));
    }

    /// Delete several notes as one undo step.
    pub fn delete_notes(&mut self, ids: &[NoteId]) {
        if self.read_only || !ids.iter().any(|id| self.doc.note(id).is_some()) {
            return;
        }
        self.push_history();
        for id in ids {
            if let Some((_, orphans)) = self.doc.remove_note(id) {
                self.delete_connector_rows(&orphans);
                self.submit(RemoteOp::Delete { table: Table::Notes, id: *id });
            }
        }
    }

    /// Copy a note at a small offset. Returns the new id.
    pub fn duplicate_note(&mut self, id: &NoteId) -> Option<NoteId> {
        if self.read_only {
            return None;
        }
        let source = self.doc.note(id)?;
        let mut copy = source.clone();
        copy.id = Uuid::new_v4();
        copy.x += DUPLICATE_OFFSET;
        copy.y += DUPLICATE_OFFSET;
        copy.title = format!("{} (Copy)", source.title);
        let new_id = copy.id;
        self.add_note(copy);
        Some(new_id)
    }

    /// Recolor notes as one undo step.
    pub fn recolor_notes(&mut self, ids: &[NoteId], color: NoteColor) {
        if self.read_only || !ids.iter().any(|id| self.doc.note(id).is_some()) {
            return;
        }
        self.push_history();
        let patch = NotePatch::color(color);
        for id in ids {
            if self.doc.apply_note_patch(id, &patch) {
                self.submit_update(Table::Notes, *id, &patch);
            }
        }
    }

    /// Raise a note in the local z-order. Not persisted.
    pub fn bring_to_front(&mut self, id: &NoteId) {
        if !self.read_only {
            self.doc.raise_note(id);
        }
    }

    /// Lower a note in the local z-order. Not persisted.
    pub fn send_to_back(&mut self, id: &NoteId) {
        if !self.read_only {
            self.doc.lower_note(id);
        }
    }

    /// Remove every connector touching a note.
    pub fn disconnect_note(&mut self, id: &NoteId) {
        if self.read_only || !self.doc.connectors().iter().any(|c| c.touches(id)) {
            return;
        }
        self.push_history();
        let removed = self.doc.remove_connectors_touching(id);
        self.delete_connector_rows(&removed);
    }

    /// Append a tag unless already present.
    pub fn add_tag(&mut self, id: &NoteId, tag: &str) {
        let Some(note) = self.doc.note(id) else {
            return;
        };
        if note.tags.iter().any(|t| t == tag) {
            return;
        }
        let mut tags = note.tags.clone();
        tags.push(tag.to_owned());
        self.update_note(id, &NotePatch { tags: Some(tags), ..Default::default() });
    }

    pub fn remove_tag(&mut self, id: &NoteId, tag: &str) {
        let Some(note) = self.doc.note(id) else {
            return;
        };
        if !note.tags.iter().any(|t| t == tag) {
            return;
        }
        let tags = note.tags.iter().filter(|t| *t != tag).cloned().collect();
        self.update_note(id, &NotePatch { tags: Some(tags), ..Default::default() });
    }

    // --- Connectors ---

    /// Link two notes. Self-loops, missing endpoints, and duplicate ids are ignored.
    pub fn add_connector(&mut self, conn: Connector) {
        if self.read_only
            || conn.from_id == conn.to_id
            || self.doc.note(&conn.from_id).is_none()
            || self.doc.note(&conn.to_id).is_none()
            || self.doc.connector(&conn.id).is_some()
        {
            return;
        }
        self.push_history();
        let row = ConnectorRow::from_connector(&conn, self.board_id);
        self.submit(RemoteOp::Insert(Row::Connector(row)));
        self.doc.push_connector(conn);
    }

    /// Restyle a connector without an undo step.
    pub fn update_connector(&mut self, id: &ConnectorId, patch: &ConnectorPatch) {
        if self.read_only || patch.is_empty() {
            return;
        }
        if self.doc.apply_connector_patch(id, patch) {
            self.submit_update(Table::Connectors, *id, patch);
        }
    }

    pub fn delete_connector(&mut self, id: &ConnectorId) {
        if self.read_only || self.doc.connector(id).is_none() {
            return;
        }
        self.push_history();
        self.doc.remove_connector(id);
        self.submit(RemoteOp::Delete { table: Table::Connectors, id: *id });
    }

    // --- Strokes ---

    pub fn add_stroke(&mut self, stroke: Stroke) {
        if self.read_only || stroke.points.is_empty() || self.doc.stroke(&stroke.id).is_some() {
            return;
        }
        self.push_history();
        let row = StrokeRow::from_stroke(&stroke, self.board_id);
        self.submit(RemoteOp::Insert(Row::Stroke(row)));
        self.doc.push_stroke(stroke);
    }

    pub fn delete_stroke(&mut self, id: &StrokeId) {
        if self.read_only || self.doc.stroke(id).is_none() {
            return;
        }
        self.push_history();
        self.doc.remove_stroke(id);
        self.submit(RemoteOp::Delete { table: Table::Strokes, id: *id });
    }

    // --- Board ---

    /// Clear every entity and reset the view, as one undo step.
    pub fn reset(&mut self) {
        if self.read_only {
            return;
        }
        self.push_history();
        let current = self.doc.snapshot();
        self.replace_state(&current, BoardSnapshot::default());
        self.doc.view = ViewState::default();
    }

    // --- View ---

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.doc.view.pan_by(dx, dy);
    }

    pub fn zoom_in(&mut self) {
        self.doc.view.zoom_in(&self.limits);
    }

    pub fn zoom_out(&mut self) {
        self.doc.view.zoom_out(&self.limits);
    }

    /// Replace the view, clamping zoom to the configured limits.
    pub fn set_view(&mut self, mut view: ViewState) {
        view.zoom = self.limits.clamp(view.zoom);
        self.doc.view = view;
    }

    // --- Categories and filter ---

    pub fn add_category(&mut self, name: &str, color: &str) {
        self.doc.add_category(Category::new(name, color));
    }

    pub fn remove_category(&mut self, name: &str) {
        self.doc.remove_category(name);
        if self.doc.active_category.as_deref() == Some(name) {
            self.doc.active_category = None;
        }
    }

    pub fn set_category_color(&mut self, name: &str, color: &str) {
        self.doc.set_category_color(name, color);
    }

    pub fn set_active_category(&mut self, name: Option<&str>) {
        self.doc.active_category = name.map(str::to_owned);
    }

    pub fn set_search_query(&mut self, query: &str) {
        query.clone_into(&mut self.doc.search_query);
    }

    /// Whether a note passes the current search and category filter.
    #[must_use]
    pub fn note_matches_filter(&self, note: &Note) -> bool {
        self.doc.note_matches_filter(note)
    }

    // --- Engine actions ---

    /// Apply mutation intents from the engine. Host hints (`RenderNeeded`,
    /// `SetCursor`, `EditTextRequested`) are returned for the caller.
    pub fn apply(&mut self, actions: Vec<Action>, ui: &mut UiState) -> Vec<Action> {
        let mut hints = Vec::new();
        let mut prune = false;
        for action in actions {
            match action {
                Action::CreateNote(note) => self.add_note(note),
                Action::MoveNotesLocal { ids, dx, dy } => self.move_notes_local(&ids, dx, dy),
                Action::CommitPositions { ids } => self.commit_positions(&ids),
                Action::ResizeNoteLocal { id, width, height } => self.resize_note_local(&id, width, height),
                Action::CommitSize { id } => self.commit_size(&id),
                Action::AddConnector(conn) => self.add_connector(conn),
                Action::DeleteConnector(id) => {
                    self.delete_connector(&id);
                    prune = true;
                }
                Action::AddStroke(stroke) => self.add_stroke(stroke),
                Action::DeleteStroke(id) => self.delete_stroke(&id),
                Action::DeleteNotes(ids) => {
                    self.delete_notes(&ids);
                    prune = true;
                }
                Action::Undo => {
                    prune |= self.undo();
                    hints.push(Action::RenderNeeded);
                }
                Action::Redo => {
                    prune |= self.redo();
                    hints.push(Action::RenderNeeded);
                }
                Action::Pan { dx, dy } => self.pan(dx, dy),
                Action::ZoomIn => self.zoom_in(),
                Action::ZoomOut => self.zoom_out(),
                hint @ (Action::EditTextRequested { .. } | Action::SetCursor(_) | Action::RenderNeeded) => {
                    hints.push(hint);
                }
            }
        }
        if prune {
            ui.prune(&self.doc);
        }
        hints
    }
}
