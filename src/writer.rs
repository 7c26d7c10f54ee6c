//! Remote writer: the host side of the mutation pipeline's write path.
//!
//! DESIGN
//! ======
//! [`RemoteWriter`] is the [`OpSink`] handed to the engine's pipeline. It
//! enqueues with `try_send` onto a bounded channel so local edits never wait
//! on the store. One background task per session drains the queue in order
//! and calls the [`RemoteStore`]; writes from one session therefore reach
//! the store in submission order.
//!
//! ERROR HANDLING
//! ==============
//! A failed write is logged with `error!` and reported as a
//! [`WriteFailure`]. The local change stays; there is no retry and no
//! rollback. A full or closed queue drops the write with `warn!` and is
//! reported the same way.

#[cfg(test)]
#[path = "writer_test.rs"]
mod writer_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use canvas::doc::BoardId;
use canvas::pipeline::OpSink;
use canvas::rows::{ChangeKind, RemoteOp, Table};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::remote::{RemoteStore, apply_op};

/// A write that did not reach the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub kind: ChangeKind,
    pub table: Table,
    pub id: Uuid,
    pub message: String,
}

impl WriteFailure {
    fn new(op: &RemoteOp, message: impl Into<String>) -> Self {
        Self { kind: op.kind(), table: op.table(), id: op.id(), message: message.into() }
    }
}

/// Non-blocking sink feeding the background writer task.
pub struct RemoteWriter {
    board_id: BoardId,
    tx: mpsc::Sender<RemoteOp>,
    pending: Arc<AtomicUsize>,
    failures: mpsc::UnboundedSender<WriteFailure>,
}

impl RemoteWriter {
    fn report(&self, failure: WriteFailure) {
        if self.failures.send(failure).is_err() {
            debug!(board_id = %self.board_id, "write failure receiver dropped");
        }
    }
}

impl OpSink for RemoteWriter {
    fn submit(&self, op: RemoteOp) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        match self.tx.try_send(op) {
            Ok(()) => {}
            Err(TrySendError::Full(op)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                warn!(board_id = %self.board_id, id = %op.id(), kind = op.kind().as_str(), "write queue full; dropping write");
                self.report(WriteFailure::new(&op, "write queue full"));
            }
            Err(TrySendError::Closed(op)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                warn!(board_id = %self.board_id, id = %op.id(), kind = op.kind().as_str(), "write queue closed; dropping write");
                self.report(WriteFailure::new(&op, "write queue closed"));
            }
        }
    }
}

/// Session-side view of the writer task: queue depth, failures, shutdown.
pub struct WriterHandle {
    pending: Arc<AtomicUsize>,
    failures: mpsc::UnboundedReceiver<WriteFailure>,
    task: JoinHandle<()>,
}

impl WriterHandle {
    /// Writes submitted but not yet answered by the store.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Failures reported since the last call.
    pub fn drain_failures(&mut self) -> Vec<WriteFailure> {
        let mut out = Vec::new();
        while let Ok(failure) = self.failures.try_recv() {
            out.push(failure);
        }
        out
    }

    /// Wait for the queue to drain and the task to stop. The matching
    /// [`RemoteWriter`] must already be dropped.
    pub async fn finish(mut self) -> Vec<WriteFailure> {
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "remote writer task ended abnormally");
        }
        self.drain_failures()
    }
}

/// Spawn the writer task for one board and return its sink and handle.
#[must_use]
pub fn spawn_remote_writer(
    store: Arc<dyn RemoteStore>,
    board_id: BoardId,
    capacity: usize,
) -> (RemoteWriter, WriterHandle) {
    let capacity = capacity.max(1);
    let (tx, mut rx) = mpsc::channel::<RemoteOp>(capacity);
    let (failures_tx, failures_rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));

    info!(%board_id, queue_capacity = capacity, "remote writer configured");

    let worker_pending = Arc::clone(&pending);
    let worker_failures = failures_tx.clone();
    let task = tokio::spawn(async move {
        while let Some(op) = rx.recv().await {
            if let Err(e) = apply_op(store.as_ref(), &op).await {
                error!(
                    %board_id,
                    kind = op.kind().as_str(),
                    table = op.table().as_str(),
                    id = %op.id(),
                    error = %e,
                    "remote write failed"
                );
                if worker_failures.send(WriteFailure::new(&op, e.to_string())).is_err() {
                    debug!(%board_id, "write failure receiver dropped");
                }
            }
            worker_pending.fetch_sub(1, Ordering::SeqCst);
        }
        debug!(%board_id, "remote writer stopped");
    });

    let writer = RemoteWriter { board_id, tx, pending: Arc::clone(&pending), failures: failures_tx };
    let handle = WriterHandle { pending, failures: failures_rx, task };
    (writer, handle)
}
