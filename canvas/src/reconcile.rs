//! Merge inbound change-feed events into local state.
//!
//! DESIGN
//! ======
//! The feed reports every committed write, including this client's own.
//! Echoes of local inserts are suppressed by id presence: the entity is
//! already in the store, so the insert is dropped. Updates are shallow
//! merges of the incoming columns (last writer wins per field). Deletes
//! cascade exactly like local deletes.
//!
//! The store publishes whole rows, so the echo of a local update carries
//! every column as of that write. [`PendingWrites`] counts this client's
//! unacknowledged inserts and updates per id; the first matching event for
//! each is consumed as an echo instead of being merged over newer local
//! edits. Columns held by an active drag or resize are stripped from
//! foreign updates with [`without_fields`].
//!
//! ERROR HANDLING
//! ==============
//! Events for another board, or with records that don't decode, are dropped
//! with a `warn!` and reported as [`ChangeOutcome::Ignored`].

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod reconcile_test;

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::doc::{BoardId, DocStore};
use crate::input::UiState;
use crate::rows::{
    ChangeEvent, ChangeKind, ConnectorRow, NoteRow, RemoteOp, Row, StrokeRow, Table, merge_fields,
};

/// What applying one feed event did to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    Inserted,
    /// Insert for an id already present locally.
    Echo,
    Updated,
    Deleted,
    /// Unknown id, foreign board, or undecodable record.
    Ignored,
}

impl ChangeOutcome {
    /// Whether local state changed.
    #[must_use]
    pub fn changed(self) -> bool {
        matches!(self, Self::Inserted | Self::Updated | Self::Deleted)
    }
}

// =============================================================================
// PENDING WRITES
// =============================================================================

/// Locally originated inserts and updates not yet seen on the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingWrites {
    counts: HashMap<Uuid, usize>,
}

impl PendingWrites {
    /// Count a submitted write. Deletes never suppress anything.
    pub fn record(&mut self, op: &RemoteOp) {
        if matches!(op.kind(), ChangeKind::Insert | ChangeKind::Update) {
            *self.counts.entry(op.id()).or_default() += 1;
        }
    }

    /// Consume one outstanding write for `id`. Returns false if none was pending.
    pub fn acknowledge(&mut self, id: &Uuid) -> bool {
        let Some(count) = self.counts.get_mut(id) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(id);
        }
        true
    }

    /// Drop every outstanding write for `id` (the row is gone).
    pub fn forget(&mut self, id: &Uuid) {
        self.counts.remove(id);
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    #[must_use]
    pub fn is_pending(&self, id: &Uuid) -> bool {
        self.counts.contains_key(id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Copy of `event` with `fields` removed from its record. `id` and
/// `board_id` are never removed.
#[must_use]
pub fn without_fields(event: &ChangeEvent, fields: &[&str]) -> ChangeEvent {
    let mut stripped = event.clone();
    for field in fields {
        if !matches!(*field, "id" | "board_id") {
            stripped.record.remove(*field);
        }
    }
    stripped
}

/// Apply one feed event to the store, pruning the selection after deletes.
pub fn apply_change(doc: &mut DocStore, board_id: BoardId, event: &ChangeEvent, ui: &mut UiState) -> ChangeOutcome {
    let Some(id) = event.id() else {
        warn!(%board_id, table = event.table.as_str(), "reconcile: event without id");
        return ChangeOutcome::Ignored;
    };
    match event.board_id() {
        Some(b) if b == board_id => {}
        other => {
            warn!(%board_id, event_board = ?other, %id, "reconcile: event for another board");
            return ChangeOutcome::Ignored;
        }
    }

    match event.kind {
        ChangeKind::Insert => apply_insert(doc, board_id, event, id),
        ChangeKind::Update => apply_update(doc, board_id, event, id),
        ChangeKind::Delete => {
            let outcome = apply_delete(doc, event.table, id);
            if outcome == ChangeOutcome::Deleted {
                ui.prune(doc);
            }
            outcome
        }
    }
}

fn apply_insert(doc: &mut DocStore, board_id: BoardId, event: &ChangeEvent, id: Uuid) -> ChangeOutcome {
    if doc.contains(&id) {
        return ChangeOutcome::Echo;
    }
    let row = match Row::from_record(event.table, &event.record) {
        Ok(row) => row,
        Err(e) => {
            warn!(%board_id, %id, table = event.table.as_str(), error = %e, "reconcile: undecodable insert");
            return ChangeOutcome::Ignored;
        }
    };
    let inserted = match row {
        Row::Note(r) => doc.push_note(r.into_note()),
        Row::Connector(r) => doc.push_connector(r.into_connector()),
        Row::Stroke(r) => doc.push_stroke(r.into_stroke()),
    };
    if inserted {
        ChangeOutcome::Inserted
    } else {
        warn!(%board_id, %id, table = event.table.as_str(), "reconcile: insert rejected by store");
        ChangeOutcome::Ignored
    }
}

fn apply_update(doc: &mut DocStore, board_id: BoardId, event: &ChangeEvent, id: Uuid) -> ChangeOutcome {
    let merged = match event.table {
        Table::Notes => doc.note_mut(&id).map(|note| {
            merge_fields(&NoteRow::from_note(note, board_id), &event.record).map(|row| {
                let collaborators = std::mem::take(&mut note.collaborators);
                *note = row.into_note();
                note.collaborators = collaborators;
            })
        }),
        Table::Connectors => doc.connector_mut(&id).map(|conn| {
            merge_fields(&ConnectorRow::from_connector(conn, board_id), &event.record)
                .map(|row| *conn = row.into_connector())
        }),
        Table::Strokes => doc.stroke_mut(&id).map(|stroke| {
            merge_fields(&StrokeRow::from_stroke(stroke, board_id), &event.record)
                .map(|row| *stroke = row.into_stroke())
        }),
    };

    match merged {
        None => ChangeOutcome::Ignored,
        Some(Ok(())) => ChangeOutcome::Updated,
        Some(Err(e)) => {
            warn!(%board_id, %id, table = event.table.as_str(), error = %e, "reconcile: undecodable update");
            ChangeOutcome::Ignored
        }
    }
}

fn apply_delete(doc: &mut DocStore, table: Table, id: Uuid) -> ChangeOutcome {
    let removed = match table {
        Table::Notes => doc.remove_note(&id).is_some(),
        Table::Connectors => doc.remove_connector(&id).is_some(),
        Table::Strokes => doc.remove_stroke(&id).is_some(),
    };
    if removed { ChangeOutcome::Deleted } else { ChangeOutcome::Ignored }
}

// =============================================================================
// CONNECTION STATUS
// =============================================================================

/// Change-feed subscription state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    /// The next state if `to` is a legal transition from here.
    ///
    /// Legal: connecting → connected, connected → disconnected,
    /// disconnected → connecting.
    #[must_use]
    pub fn transition(self, to: Self) -> Option<Self> {
        match (self, to) {
            (Self::Connecting, Self::Connected)
            | (Self::Connected, Self::Disconnected)
            | (Self::Disconnected, Self::Connecting) => Some(to),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

/// Status shown in the sync badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Connecting,
    Connected,
    Disconnected,
    Saving,
}

/// Connection state plus write-path health.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    connection: ConnectionStatus,
    pending_writes: usize,
    last_error: Option<String>,
}

impl SyncStatus {
    #[must_use]
    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    /// Apply a transition. Returns false (and leaves the state alone) when illegal.
    pub fn set_connection(&mut self, to: ConnectionStatus) -> bool {
        match self.connection.transition(to) {
            Some(next) => {
                self.connection = next;
                true
            }
            None => false,
        }
    }

    pub fn set_pending_writes(&mut self, pending: usize) {
        self.pending_writes = pending;
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn badge(&self) -> Badge {
        match self.connection {
            ConnectionStatus::Connecting => Badge::Connecting,
            ConnectionStatus::Disconnected => Badge::Disconnected,
            ConnectionStatus::Connected if self.pending_writes > 0 => Badge::Saving,
            ConnectionStatus::Connected => Badge::Connected,
        }
    }
}
