//! Remote store contract: row CRUD, board records, and a per-board change feed.
//!
//! DESIGN
//! ======
//! The engine only ever produces [`RemoteOp`]s and consumes [`ChangeEvent`]s;
//! this trait is the seam between those and a concrete backend. Two backends
//! ship here: [`memory::MemoryStore`] for tests and local use, and
//! [`pg::PgStore`] over Postgres with `LISTEN/NOTIFY` as the feed.
//!
//! Inserts are upserts and deleting a missing row succeeds, so replaying the
//! same diff twice leaves the same rows behind.
//!
//! ERROR HANDLING
//! ==============
//! Backends return [`RemoteError`]. Callers on the write path log and record
//! the error; nothing is retried or rolled back.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use canvas::doc::{BoardId, BoardSnapshot, UserId};
use canvas::rows::{BoardRow, ChangeEvent, Fields, RemoteOp, Row, Table};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record encoding error: {0}")]
    Record(#[from] serde_json::Error),
    #[error("board not found: {0}")]
    BoardNotFound(BoardId),
    #[error("unknown column `{column}` on {table}")]
    UnknownColumn { table: &'static str, column: String },
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One message on a change-feed subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// The subscription is live; events from here on are delivered.
    Connected,
    Change(ChangeEvent),
    /// The subscription ended. No further messages follow.
    Disconnected,
}

/// Receiving end of a change feed for one board.
///
/// Dropping the subscription stops any background listener feeding it.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<FeedMessage>,
    task: Option<JoinHandle<()>>,
    ended: bool,
}

impl Subscription {
    #[must_use]
    pub fn new(rx: mpsc::Receiver<FeedMessage>, task: Option<JoinHandle<()>>) -> Self {
        Self { rx, task, ended: false }
    }

    /// Next message, or `None` once the feed is closed.
    pub async fn recv(&mut self) -> Option<FeedMessage> {
        let msg = self.rx.recv().await;
        self.observe(msg)
    }

    /// Non-blocking poll used by tests and synchronous hosts. `None` means
    /// nothing is queued, or the feed has already reported its end.
    pub fn try_recv(&mut self) -> Option<FeedMessage> {
        match self.rx.try_recv() {
            Ok(msg) => self.observe(Some(msg)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self.observe(None),
        }
    }

    /// A sender that vanished without saying so is reported as one
    /// `Disconnected`.
    fn observe(&mut self, msg: Option<FeedMessage>) -> Option<FeedMessage> {
        match msg {
            Some(FeedMessage::Disconnected) | None if !self.ended => {
                self.ended = true;
                Some(FeedMessage::Disconnected)
            }
            Some(FeedMessage::Disconnected) | None => None,
            Some(msg) => Some(msg),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Row storage plus change feed, keyed by board.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upsert a full row.
    async fn insert(&self, row: &Row) -> Result<(), RemoteError>;

    /// Set the given columns on an existing row. A missing row is not an error.
    async fn update(&self, table: Table, id: Uuid, fields: &Fields) -> Result<(), RemoteError>;

    /// Remove a row. A missing row is not an error.
    async fn delete(&self, table: Table, id: Uuid) -> Result<(), RemoteError>;

    /// Every note, connector and stroke of a board, in creation order.
    async fn select_all(&self, board_id: BoardId) -> Result<BoardSnapshot, RemoteError>;

    /// Open a change feed for one board.
    async fn subscribe(&self, board_id: BoardId) -> Result<Subscription, RemoteError>;

    async fn fetch_board(&self, board_id: BoardId) -> Result<Option<BoardRow>, RemoteError>;

    async fn insert_board(&self, board: &BoardRow) -> Result<(), RemoteError>;

    /// Overwrite title, view state, last-modified and visibility.
    async fn update_board(&self, board: &BoardRow) -> Result<(), RemoteError>;

    /// Delete a board and everything on it.
    async fn delete_board(&self, board_id: BoardId) -> Result<(), RemoteError>;

    /// Boards owned by `owner_id`, most recently modified first.
    async fn list_boards(&self, owner_id: UserId) -> Result<Vec<BoardRow>, RemoteError>;
}

/// Execute one pipeline write against a store.
///
/// # Errors
///
/// Propagates the backend error unchanged.
pub async fn apply_op(store: &dyn RemoteStore, op: &RemoteOp) -> Result<(), RemoteError> {
    match op {
        RemoteOp::Insert(row) => store.insert(row).await,
        RemoteOp::Update { table, id, fields } => store.update(*table, *id, fields).await,
        RemoteOp::Delete { table, id } => store.delete(*table, *id).await,
    }
}

/// Decode raw records into a snapshot, skipping rows that don't decode.
pub(crate) fn snapshot_from_records(board_id: BoardId, records: Vec<(Table, Fields)>) -> BoardSnapshot {
    let mut snapshot = BoardSnapshot::default();
    for (table, record) in records {
        match Row::from_record(table, &record) {
            Ok(Row::Note(r)) => snapshot.notes.push(r.into_note()),
            Ok(Row::Connector(r)) => snapshot.connectors.push(r.into_connector()),
            Ok(Row::Stroke(r)) => snapshot.strokes.push(r.into_stroke()),
            Err(e) => warn!(%board_id, table = table.as_str(), error = %e, "remote: skipping undecodable row"),
        }
    }
    snapshot
}
