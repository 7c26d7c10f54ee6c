use canvas::doc::{Note, NoteKind};
use canvas::rows::{NoteRow, Row};
use serde_json::json;

use super::*;
use crate::remote::memory::MemoryStore;
use canvas::rows::BoardRow;

// =============================================================================
// Helpers
// =============================================================================

async fn store_with_board() -> (Arc<MemoryStore>, BoardId) {
    let store = Arc::new(MemoryStore::new());
    let board = BoardRow::new(None, "Writer", 0);
    store.insert_board(&board).await.expect("insert board");
    (store, board.id)
}

fn insert_op(board_id: BoardId, x: f64) -> (Uuid, RemoteOp) {
    let note = Note::new(NoteKind::Card, x, 0.0);
    (note.id, RemoteOp::Insert(Row::Note(NoteRow::from_note(&note, board_id))))
}

// =============================================================================
// Ordering and delivery
// =============================================================================

#[tokio::test]
async fn writes_reach_store_in_submission_order() {
    let (store, board) = store_with_board().await;
    let (writer, handle) = spawn_remote_writer(store.clone(), board, 16);

    let (id, insert) = insert_op(board, 1.0);
    writer.submit(insert);
    let mut fields = canvas::rows::Fields::new();
    fields.insert("x".into(), json!(2.0));
    writer.submit(RemoteOp::Update { table: Table::Notes, id, fields });
    let mut fields = canvas::rows::Fields::new();
    fields.insert("x".into(), json!(3.0));
    writer.submit(RemoteOp::Update { table: Table::Notes, id, fields });

    drop(writer);
    let failures = handle.finish().await;
    assert!(failures.is_empty());

    let snapshot = store.select_all(board).await.expect("select");
    assert_eq!(snapshot.notes.len(), 1);
    assert!((snapshot.notes[0].x - 3.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn pending_counts_unanswered_writes() {
    let (store, board) = store_with_board().await;
    let (writer, handle) = spawn_remote_writer(store, board, 16);
    writer.submit(insert_op(board, 0.0).1);
    writer.submit(insert_op(board, 1.0).1);
    assert_eq!(handle.pending(), 2);

    drop(writer);
    let pending = Arc::clone(&handle.pending);
    let failures = handle.finish().await;
    assert!(failures.is_empty());
    assert_eq!(pending.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn failed_write_is_reported_not_retried() {
    let (store, board) = store_with_board().await;
    store.set_fail_writes(true);
    let (writer, handle) = spawn_remote_writer(store.clone(), board, 16);
    let (id, insert) = insert_op(board, 0.0);
    writer.submit(insert);

    drop(writer);
    let failures = handle.finish().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].id, id);
    assert_eq!(failures[0].kind, ChangeKind::Insert);
    assert_eq!(failures[0].table, Table::Notes);

    store.set_fail_writes(false);
    assert_eq!(store.row_count(board, Table::Notes).await, 0);
}

#[tokio::test]
async fn full_queue_drops_and_reports() {
    let (store, board) = store_with_board().await;
    let (writer, mut handle) = spawn_remote_writer(store.clone(), board, 1);

    // The worker cannot run until this task yields, so the second write finds the queue full.
    writer.submit(insert_op(board, 0.0).1);
    let (dropped, second) = insert_op(board, 1.0);
    writer.submit(second);

    let failures = handle.drain_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].id, dropped);
    assert_eq!(failures[0].message, "write queue full");
    assert_eq!(handle.pending(), 1);

    drop(writer);
    assert!(handle.finish().await.is_empty());
    assert_eq!(store.row_count(board, Table::Notes).await, 1);
}
