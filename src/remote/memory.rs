//! In-process store with a live change feed and fault injection.
//!
//! DESIGN
//! ======
//! Rows are kept as column maps in creation order, exactly the shape a
//! database would hand back. Every committed change is published to the
//! subscribers of its board, including the writer's own changes, so echo
//! suppression is exercised the same way it is against Postgres. Deleting a
//! note cascades to the connectors that touch it, and each cascaded delete
//! is published too.
//!
//! Fault injection: [`MemoryStore::set_fail_writes`] makes every row write
//! fail, [`MemoryStore::set_fail_subscribe`] makes `subscribe` fail, and
//! [`MemoryStore::disconnect_all`] ends every open feed.

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use canvas::doc::{BoardId, BoardSnapshot, UserId};
use canvas::rows::{BoardRow, ChangeEvent, ChangeKind, Fields, Row, Table};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{FeedMessage, RemoteError, RemoteStore, Subscription, snapshot_from_records};

const DEFAULT_FEED_CAPACITY: usize = 1024;
const TABLES: [Table; 3] = [Table::Notes, Table::Connectors, Table::Strokes];

struct Subscriber {
    board_id: BoardId,
    tx: mpsc::Sender<FeedMessage>,
}

#[derive(Default)]
struct Inner {
    boards: HashMap<BoardId, BoardRow>,
    tables: HashMap<Table, Vec<Fields>>,
    subscribers: Vec<Subscriber>,
}

impl Inner {
    fn rows(&self, table: Table) -> &[Fields] {
        self.tables.get(&table).map_or(&[], Vec::as_slice)
    }

    fn rows_mut(&mut self, table: Table) -> &mut Vec<Fields> {
        self.tables.entry(table).or_default()
    }

    fn position(&self, table: Table, id: Uuid) -> Option<usize> {
        self.rows(table).iter().position(|r| uuid_column(r, "id") == Some(id))
    }

    fn publish(&mut self, kind: ChangeKind, table: Table, record: Fields) {
        let Some(board_id) = uuid_column(&record, "board_id") else {
            return;
        };
        let event = ChangeEvent { kind, table, record };
        self.subscribers.retain(|sub| !sub.tx.is_closed());
        for sub in self.subscribers.iter().filter(|s| s.board_id == board_id) {
            match sub.tx.try_send(FeedMessage::Change(event.clone())) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(%board_id, table = table.as_str(), "memory feed full; dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    fn remove_row(&mut self, table: Table, id: Uuid) -> bool {
        let Some(pos) = self.position(table, id) else {
            return false;
        };
        let removed = self.rows_mut(table).remove(pos);
        let mut tombstone = Fields::new();
        tombstone.insert("id".into(), Value::String(id.to_string()));
        if let Some(board) = removed.get("board_id") {
            tombstone.insert("board_id".into(), board.clone());
        }
        self.publish(ChangeKind::Delete, table, tombstone);
        true
    }
}

fn uuid_column(record: &Fields, key: &str) -> Option<Uuid> {
    let raw = record.get(key)?.as_str()?;
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => None,
    }
}

/// Shared in-memory backend. Cheap to wrap in an `Arc` and hand to several sessions.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    feed_capacity: usize,
    fail_writes: AtomicBool,
    fail_subscribe: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    #[must_use]
    pub fn with_feed_capacity(feed_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            feed_capacity: feed_capacity.max(1),
            fail_writes: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
        }
    }

    /// Make every subsequent row write fail with [`RemoteError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `subscribe` fail with [`RemoteError::Unavailable`].
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// End every open feed with [`FeedMessage::Disconnected`].
    pub async fn disconnect_all(&self) {
        let mut inner = self.inner.lock().await;
        for sub in inner.subscribers.drain(..) {
            if sub.tx.try_send(FeedMessage::Disconnected).is_err() {
                debug!(board_id = %sub.board_id, "memory feed already gone");
            }
        }
    }

    /// Number of rows currently stored in `table` for `board_id`.
    pub async fn row_count(&self, board_id: BoardId, table: Table) -> usize {
        let inner = self.inner.lock().await;
        inner.rows(table).iter().filter(|r| uuid_column(r, "board_id") == Some(board_id)).count()
    }

    fn check_writable(&self) -> Result<(), RemoteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn insert(&self, row: &Row) -> Result<(), RemoteError> {
        self.check_writable()?;
        let record = row.to_record()?;
        let table = row.table();
        let mut inner = self.inner.lock().await;

        if !inner.boards.contains_key(&row.board_id()) {
            return Err(RemoteError::BoardNotFound(row.board_id()));
        }
        if let Row::Connector(conn) = row {
            let has = |id| inner.position(Table::Notes, id).is_some();
            if conn.from_id == conn.to_id || !has(conn.from_id) || !has(conn.to_id) {
                return Err(RemoteError::Constraint(format!("connector {} endpoints", conn.id)));
            }
        }

        let kind = match inner.position(table, row.id()) {
            Some(pos) => {
                inner.rows_mut(table)[pos] = record.clone();
                ChangeKind::Update
            }
            None => {
                inner.rows_mut(table).push(record.clone());
                ChangeKind::Insert
            }
        };
        inner.publish(kind, table, record);
        Ok(())
    }

    async fn update(&self, table: Table, id: Uuid, fields: &Fields) -> Result<(), RemoteError> {
        self.check_writable()?;
        let mut inner = self.inner.lock().await;
        let Some(pos) = inner.position(table, id) else {
            return Ok(());
        };

        let mut merged = inner.rows(table)[pos].clone();
        for (key, value) in fields {
            if key == "id" || key == "board_id" {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
        let row = Row::from_record(table, &merged)?;
        let record = row.to_record()?;
        inner.rows_mut(table)[pos] = record.clone();
        inner.publish(ChangeKind::Update, table, record);
        Ok(())
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<(), RemoteError> {
        self.check_writable()?;
        let mut inner = self.inner.lock().await;
        if table == Table::Notes {
            let touching: Vec<Uuid> = inner
                .rows(Table::Connectors)
                .iter()
                .filter(|r| uuid_column(r, "from_id") == Some(id) || uuid_column(r, "to_id") == Some(id))
                .filter_map(|r| uuid_column(r, "id"))
                .collect();
            for conn_id in touching {
                inner.remove_row(Table::Connectors, conn_id);
            }
        }
        inner.remove_row(table, id);
        Ok(())
    }

    async fn select_all(&self, board_id: BoardId) -> Result<BoardSnapshot, RemoteError> {
        let inner = self.inner.lock().await;
        let records = TABLES
            .iter()
            .flat_map(|&table| {
                inner
                    .rows(table)
                    .iter()
                    .filter(move |r| uuid_column(r, "board_id") == Some(board_id))
                    .map(move |r| (table, r.clone()))
            })
            .collect();
        Ok(snapshot_from_records(board_id, records))
    }

    async fn subscribe(&self, board_id: BoardId) -> Result<Subscription, RemoteError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("subscribe disabled".into()));
        }
        let (tx, rx) = mpsc::channel(self.feed_capacity);
        if tx.try_send(FeedMessage::Connected).is_err() {
            return Err(RemoteError::Unavailable("feed closed".into()));
        }
        self.inner.lock().await.subscribers.push(Subscriber { board_id, tx });
        debug!(%board_id, "memory feed subscribed");
        Ok(Subscription::new(rx, None))
    }

    async fn fetch_board(&self, board_id: BoardId) -> Result<Option<BoardRow>, RemoteError> {
        Ok(self.inner.lock().await.boards.get(&board_id).cloned())
    }

    async fn insert_board(&self, board: &BoardRow) -> Result<(), RemoteError> {
        self.inner.lock().await.boards.insert(board.id, board.clone());
        Ok(())
    }

    async fn update_board(&self, board: &BoardRow) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock().await;
        match inner.boards.get_mut(&board.id) {
            Some(existing) => {
                existing.title.clone_from(&board.title);
                existing.view_state = board.view_state;
                existing.last_modified = board.last_modified;
                existing.is_public = board.is_public;
                Ok(())
            }
            None => Err(RemoteError::BoardNotFound(board.id)),
        }
    }

    async fn delete_board(&self, board_id: BoardId) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock().await;
        if inner.boards.remove(&board_id).is_none() {
            return Err(RemoteError::BoardNotFound(board_id));
        }
        for table in [Table::Connectors, Table::Strokes, Table::Notes] {
            let ids: Vec<Uuid> = inner
                .rows(table)
                .iter()
                .filter(|r| uuid_column(r, "board_id") == Some(board_id))
                .filter_map(|r| uuid_column(r, "id"))
                .collect();
            for id in ids {
                inner.remove_row(table, id);
            }
        }
        Ok(())
    }

    async fn list_boards(&self, owner_id: UserId) -> Result<Vec<BoardRow>, RemoteError> {
        let inner = self.inner.lock().await;
        let mut boards: Vec<BoardRow> =
            inner.boards.values().filter(|b| b.owner_id == Some(owner_id)).cloned().collect();
        boards.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(boards)
    }
}
