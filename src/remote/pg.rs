//! Postgres backend. Rows live in `notes` / `connectors` / `strokes`; the
//! change feed is `LISTEN board_changes`, fed by the triggers in
//! `src/db/migrations/0002_change_feed.sql`.
//!
//! DESIGN
//! ======
//! Row writes go through `jsonb_populate_record`, so the JSON column map the
//! engine produces is the only encoding; column names come from a fixed
//! per-table list and never from the caller. Reads use `to_jsonb(row)` for
//! the same reason.
//!
//! Each subscription owns a dedicated `PgListener` on a background task.
//! When the listener loses its connection the task emits
//! [`FeedMessage::Disconnected`] and exits; the session resubscribes and
//! refetches. Notifications trimmed for size (record holds only `id` and
//! `board_id`) are completed by reading the row back.

#[cfg(test)]
#[path = "pg_test.rs"]
mod pg_test;

use async_trait::async_trait;
use canvas::camera::ViewState;
use canvas::doc::{BoardId, BoardSnapshot, UserId};
use canvas::rows::{BoardRow, ChangeEvent, ChangeKind, Fields, Row, Table};
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{FeedMessage, RemoteError, RemoteStore, Subscription, snapshot_from_records};

/// NOTIFY channel written by the change-feed triggers.
pub const CHANGE_CHANNEL: &str = "board_changes";

const DEFAULT_FEED_CAPACITY: usize = 1024;

const NOTE_COLUMNS: &[&str] =
    &["id", "board_id", "x", "y", "title", "content", "type", "color", "tags", "image_url", "width", "height"];
const CONNECTOR_COLUMNS: &[&str] =
    &["id", "board_id", "from_id", "to_id", "source_handle", "target_handle", "type", "color", "stroke_width"];
const STROKE_COLUMNS: &[&str] = &["id", "board_id", "points", "color", "stroke_width"];

fn columns(table: Table) -> &'static [&'static str] {
    match table {
        Table::Notes => NOTE_COLUMNS,
        Table::Connectors => CONNECTOR_COLUMNS,
        Table::Strokes => STROKE_COLUMNS,
    }
}

fn quoted(cols: &[&str]) -> String {
    cols.iter().map(|c| format!("\"{c}\"")).collect::<Vec<_>>().join(", ")
}

/// `INSERT ... ON CONFLICT (id) DO UPDATE` over every column of `table`.
fn upsert_sql(table: Table) -> String {
    let cols = columns(table);
    let list = quoted(cols);
    let updates = cols
        .iter()
        .filter(|c| **c != "id")
        .map(|c| format!("\"{c}\" = EXCLUDED.\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let t = table.as_str();
    format!(
        "INSERT INTO {t} ({list}) SELECT {list} FROM jsonb_populate_record(NULL::{t}, $1) \
         ON CONFLICT (\"id\") DO UPDATE SET {updates}"
    )
}

/// `UPDATE` of just the given columns, each checked against the table's column list.
fn update_sql(table: Table, fields: &Fields) -> Result<Option<String>, RemoteError> {
    let allowed = columns(table);
    let mut sets = Vec::new();
    for key in fields.keys() {
        if key == "id" || key == "board_id" {
            continue;
        }
        if !allowed.contains(&key.as_str()) {
            return Err(RemoteError::UnknownColumn { table: table.as_str(), column: key.clone() });
        }
        sets.push(format!("\"{key}\" = src.\"{key}\""));
    }
    if sets.is_empty() {
        return Ok(None);
    }
    let t = table.as_str();
    Ok(Some(format!(
        "UPDATE {t} AS dst SET {} FROM jsonb_populate_record(NULL::{t}, $2) AS src WHERE dst.\"id\" = $1",
        sets.join(", ")
    )))
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    feed_capacity: usize,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool, feed_capacity: DEFAULT_FEED_CAPACITY }
    }

    #[must_use]
    pub fn with_feed_capacity(mut self, feed_capacity: usize) -> Self {
        self.feed_capacity = feed_capacity.max(1);
        self
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn fetch_record(pool: &PgPool, table: Table, id: Uuid) -> Result<Option<Fields>, sqlx::Error> {
    let sql = format!("SELECT to_jsonb(t) - 'created_at' FROM {} t WHERE t.\"id\" = $1", table.as_str());
    let value: Option<Value> = sqlx::query_scalar(&sql).bind(id).fetch_optional(pool).await?;
    Ok(match value {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    })
}

type BoardTuple = (Uuid, Option<Uuid>, String, Json<ViewState>, i64, bool);

fn board_from_tuple((id, owner_id, title, view_state, last_modified, is_public): BoardTuple) -> BoardRow {
    BoardRow { id, owner_id, title, view_state: view_state.0, last_modified, is_public }
}

#[async_trait]
impl RemoteStore for PgStore {
    async fn insert(&self, row: &Row) -> Result<(), RemoteError> {
        let record = row.to_record()?;
        sqlx::query(&upsert_sql(row.table()))
            .bind(Value::Object(record))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update(&self, table: Table, id: Uuid, fields: &Fields) -> Result<(), RemoteError> {
        let Some(sql) = update_sql(table, fields)? else {
            return Ok(());
        };
        sqlx::query(&sql)
            .bind(id)
            .bind(Value::Object(fields.clone()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<(), RemoteError> {
        let sql = format!("DELETE FROM {} WHERE \"id\" = $1", table.as_str());
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn select_all(&self, board_id: BoardId) -> Result<BoardSnapshot, RemoteError> {
        let mut records = Vec::new();
        for table in [Table::Notes, Table::Connectors, Table::Strokes] {
            let sql = format!(
                "SELECT to_jsonb(t) - 'created_at' FROM {} t WHERE t.board_id = $1 ORDER BY t.created_at, t.id",
                table.as_str()
            );
            let values: Vec<Value> = sqlx::query_scalar(&sql).bind(board_id).fetch_all(&self.pool).await?;
            for value in values {
                if let Value::Object(map) = value {
                    records.push((table, map));
                }
            }
        }
        Ok(snapshot_from_records(board_id, records))
    }

    async fn subscribe(&self, board_id: BoardId) -> Result<Subscription, RemoteError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let (tx, rx) = mpsc::channel(self.feed_capacity);
        if tx.send(FeedMessage::Connected).await.is_err() {
            return Err(RemoteError::Unavailable("feed closed".into()));
        }
        info!(%board_id, channel = CHANGE_CHANNEL, "change feed subscribed");

        let pool = self.pool.clone();
        let task = tokio::spawn(async move {
            run_listener(listener, pool, board_id, tx).await;
        });
        Ok(Subscription::new(rx, Some(task)))
    }

    async fn fetch_board(&self, board_id: BoardId) -> Result<Option<BoardRow>, RemoteError> {
        let row = sqlx::query_as::<_, BoardTuple>(
            "SELECT id, owner_id, title, view_state, last_modified, is_public FROM boards WHERE id = $1",
        )
        .bind(board_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(board_from_tuple))
    }

    async fn insert_board(&self, board: &BoardRow) -> Result<(), RemoteError> {
        sqlx::query(
            "INSERT INTO boards (id, owner_id, title, view_state, last_modified, is_public)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(board.id)
        .bind(board.owner_id)
        .bind(&board.title)
        .bind(Json(board.view_state))
        .bind(board.last_modified)
        .bind(board.is_public)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_board(&self, board: &BoardRow) -> Result<(), RemoteError> {
        let result = sqlx::query(
            "UPDATE boards SET title = $2, view_state = $3, last_modified = $4, is_public = $5 WHERE id = $1",
        )
        .bind(board.id)
        .bind(&board.title)
        .bind(Json(board.view_state))
        .bind(board.last_modified)
        .bind(board.is_public)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RemoteError::BoardNotFound(board.id));
        }
        Ok(())
    }

    async fn delete_board(&self, board_id: BoardId) -> Result<(), RemoteError> {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1").bind(board_id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RemoteError::BoardNotFound(board_id));
        }
        Ok(())
    }

    async fn list_boards(&self, owner_id: UserId) -> Result<Vec<BoardRow>, RemoteError> {
        let rows = sqlx::query_as::<_, BoardTuple>(
            "SELECT id, owner_id, title, view_state, last_modified, is_public
             FROM boards
             WHERE owner_id = $1
             ORDER BY last_modified DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(board_from_tuple).collect())
    }
}

// =============================================================================
// LISTENER
// =============================================================================

async fn run_listener(mut listener: PgListener, pool: PgPool, board_id: BoardId, tx: mpsc::Sender<FeedMessage>) {
    loop {
        let notification = match listener.try_recv().await {
            Ok(Some(n)) => n,
            Ok(None) => {
                warn!(%board_id, "change feed connection lost");
                break;
            }
            Err(e) => {
                warn!(%board_id, error = %e, "change feed receive failed");
                break;
            }
        };

        let event = match serde_json::from_str::<ChangeEvent>(notification.payload()) {
            Ok(event) => event,
            Err(e) => {
                warn!(%board_id, error = %e, "change feed: undecodable payload");
                continue;
            }
        };
        if event.board_id() != Some(board_id) {
            continue;
        }
        let Some(event) = complete_event(&pool, event).await else {
            continue;
        };
        if tx.send(FeedMessage::Change(event)).await.is_err() {
            debug!(%board_id, "change feed receiver dropped");
            return;
        }
    }

    if tx.send(FeedMessage::Disconnected).await.is_err() {
        debug!(%board_id, "change feed receiver dropped before disconnect");
    }
}

/// Refetch the row for inserts and updates whose record was trimmed to its keys.
async fn complete_event(pool: &PgPool, mut event: ChangeEvent) -> Option<ChangeEvent> {
    if event.kind == ChangeKind::Delete || event.record.len() > 2 {
        return Some(event);
    }
    let id = event.id()?;
    match fetch_record(pool, event.table, id).await {
        Ok(Some(record)) => {
            event.record = record;
            Some(event)
        }
        Ok(None) => None,
        Err(e) => {
            warn!(%id, table = event.table.as_str(), error = %e, "change feed: refetch failed");
            None
        }
    }
}
