//! Board session: one open board, its engine, its writer, and its feed.
//!
//! DESIGN
//! ======
//! `BoardSession` is the composition root for a single board. It owns the
//! engine's [`Pipeline`] (document + history), the [`EngineCore`] input
//! state machine, the writer task that drains remote writes, the change-feed
//! subscription, and the [`SyncStatus`] badge. Everything is mutated through
//! `&mut self`; nothing here is shared across tasks.
//!
//! The host drives it with two kinds of calls: input events (pointer, key,
//! wheel) that flow through the engine into the pipeline, and feed messages
//! (from [`BoardSession::next_feed`]) handed to [`BoardSession::handle_feed`].
//! After a disconnect the host calls [`BoardSession::resync`], which
//! resubscribes and then refetches the whole board. Missed events are not
//! replayed.
//!
//! ERROR HANDLING
//! ==============
//! A board that cannot be loaded is terminal: `open` returns
//! [`SessionError::BoardNotFound`]. Remote write failures never reach the
//! caller; they are folded into the badge's last error.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use canvas::camera::Point;
use canvas::doc::{BoardId, UserId};
use canvas::engine::{Action, EngineCore};
use canvas::input::{Button, Key, Modifiers, Mode, WheelDelta};
use canvas::pipeline::Pipeline;
use canvas::reconcile::{ChangeOutcome, ConnectionStatus, SyncStatus};
use canvas::rows::BoardRow;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::remote::{FeedMessage, RemoteError, RemoteStore, Subscription};
use crate::writer::{WriteFailure, WriterHandle, spawn_remote_writer};

const DEFAULT_BOARD_TITLE: &str = "Untitled Board";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("board not found: {0}")]
    BoardNotFound(BoardId),
    #[error("board {0} is not visible to this user")]
    Denied(BoardId),
    #[error("board {0} is read-only for this user")]
    ReadOnly(BoardId),
    #[error("remote store error: {0}")]
    Remote(#[from] RemoteError),
}

/// Milliseconds since the Unix epoch, saturating.
#[must_use]
pub fn now_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
        Err(_) => 0,
    }
}

/// What a feed message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    Change(ChangeOutcome),
    /// Connection status moved to the given state.
    Status(ConnectionStatus),
    /// A status message that was not a legal transition from the current state.
    Ignored,
}

pub struct BoardSession {
    store: Arc<dyn RemoteStore>,
    config: SessionConfig,
    board: BoardRow,
    viewer: Option<UserId>,
    pipeline: Pipeline,
    engine: EngineCore,
    status: SyncStatus,
    writer: WriterHandle,
    feed: Option<Subscription>,
}

impl BoardSession {
    // --- Board management ---

    /// Create an empty private board owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Remote`] if the insert fails.
    pub async fn create_board(
        store: &dyn RemoteStore,
        owner: Option<UserId>,
        title: Option<&str>,
    ) -> Result<BoardRow, SessionError> {
        let title = match title {
            Some(t) if !t.trim().is_empty() => t.trim(),
            _ => DEFAULT_BOARD_TITLE,
        };
        let board = BoardRow::new(owner, title, now_ms());
        store.insert_board(&board).await?;
        info!(board_id = %board.id, owner = ?owner, "board created");
        Ok(board)
    }

    /// # Errors
    ///
    /// Returns [`SessionError::Remote`] if the query fails.
    pub async fn list_boards(store: &dyn RemoteStore, owner: UserId) -> Result<Vec<BoardRow>, SessionError> {
        Ok(store.list_boards(owner).await?)
    }

    /// Load a board and its contents. The session is read-only when `viewer`
    /// does not own the board. Private boards are only visible to their owner.
    ///
    /// # Errors
    ///
    /// [`SessionError::BoardNotFound`] if the board is missing or cannot be
    /// read; [`SessionError::Denied`] for another user's private board.
    pub async fn open(
        store: Arc<dyn RemoteStore>,
        board_id: BoardId,
        viewer: Option<UserId>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let board = match store.fetch_board(board_id).await {
            Ok(Some(board)) => board,
            Ok(None) => return Err(SessionError::BoardNotFound(board_id)),
            Err(e) => {
                warn!(%board_id, error = %e, "board load failed");
                return Err(SessionError::BoardNotFound(board_id));
            }
        };
        let read_only = !board.is_editable_by(viewer);
        if read_only && !board.is_public {
            return Err(SessionError::Denied(board_id));
        }

        let snapshot = match store.select_all(board_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(%board_id, error = %e, "board contents load failed");
                return Err(SessionError::BoardNotFound(board_id));
            }
        };

        let (sink, writer) = spawn_remote_writer(Arc::clone(&store), board_id, config.write_queue_capacity);
        let mut pipeline = Pipeline::new(board_id, Box::new(sink))
            .with_history_depth(config.history_depth)
            .with_zoom_limits(config.zoom);
        info!(
            %board_id,
            notes = snapshot.notes.len(),
            connectors = snapshot.connectors.len(),
            strokes = snapshot.strokes.len(),
            read_only,
            "board opened"
        );
        pipeline.load(snapshot, board.view_state);
        pipeline.set_read_only(read_only);

        Ok(Self {
            store,
            config,
            board,
            viewer,
            pipeline,
            engine: EngineCore::new(),
            status: SyncStatus::default(),
            writer,
            feed: None,
        })
    }

    /// Persist title, view state and last-modified.
    ///
    /// # Errors
    ///
    /// [`SessionError::ReadOnly`] for non-owners; otherwise the store error.
    pub async fn save_board(&mut self) -> Result<(), SessionError> {
        self.require_writable()?;
        self.board.view_state = self.pipeline.doc().view;
        self.board.last_modified = now_ms();
        self.store.update_board(&self.board).await?;
        debug!(board_id = %self.board.id, "board saved");
        Ok(())
    }

    /// Rename locally; persisted by the next [`save_board`](Self::save_board).
    pub fn set_title(&mut self, title: &str) {
        if self.pipeline.is_read_only() {
            return;
        }
        title.trim().clone_into(&mut self.board.title);
    }

    /// Flip visibility and persist it. Returns the new value.
    ///
    /// # Errors
    ///
    /// [`SessionError::ReadOnly`] for non-owners; otherwise the store error.
    pub async fn toggle_public(&mut self) -> Result<bool, SessionError> {
        self.require_writable()?;
        self.board.is_public = !self.board.is_public;
        self.board.last_modified = now_ms();
        if let Err(e) = self.store.update_board(&self.board).await {
            self.board.is_public = !self.board.is_public;
            return Err(e.into());
        }
        info!(board_id = %self.board.id, is_public = self.board.is_public, "board visibility changed");
        Ok(self.board.is_public)
    }

    /// Delete the board and everything on it, then shut the session down.
    ///
    /// # Errors
    ///
    /// [`SessionError::ReadOnly`] for non-owners; otherwise the store error.
    /// The session is consumed either way.
    pub async fn delete_board(self) -> Result<(), SessionError> {
        self.require_writable()?;
        let board_id = self.board.id;
        let store = Arc::clone(&self.store);
        self.close().await;
        store.delete_board(board_id).await?;
        info!(%board_id, "board deleted");
        Ok(())
    }

    fn require_writable(&self) -> Result<(), SessionError> {
        if self.pipeline.is_read_only() {
            return Err(SessionError::ReadOnly(self.board.id));
        }
        Ok(())
    }

    // --- Accessors ---

    #[must_use]
    pub fn board(&self) -> &BoardRow {
        &self.board
    }

    #[must_use]
    pub fn board_id(&self) -> BoardId {
        self.board.id
    }

    #[must_use]
    pub fn viewer(&self) -> Option<UserId> {
        self.viewer
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.pipeline.is_read_only()
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Direct access for operations with no input gesture (recolor, tags,
    /// duplicate, categories, reset).
    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    #[must_use]
    pub fn engine(&self) -> &EngineCore {
        &self.engine
    }

    /// Current badge state, with write-path health folded in.
    pub fn sync_status(&mut self) -> &SyncStatus {
        self.fold_write_failures();
        self.status.set_pending_writes(self.writer.pending());
        &self.status
    }

    /// Record failed writes on the badge. A failed write never echoes, so
    /// the pipeline stops waiting for it.
    fn fold_write_failures(&mut self) {
        for WriteFailure { kind, table, id, message } in self.writer.drain_failures() {
            self.pipeline.write_failed(kind, &id);
            self.status.record_error(format!("{} {} {id}: {message}", kind.as_str(), table.as_str()));
        }
    }

    // --- Input ---

    fn dispatch(&mut self, actions: Vec<Action>) -> Vec<Action> {
        self.pipeline.apply(actions, &mut self.engine.ui)
    }

    pub fn set_mode(&mut self, mode: Mode) -> Vec<Action> {
        let actions = self.engine.set_mode(mode);
        self.dispatch(actions)
    }

    pub fn pointer_down(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        let actions = self.engine.on_pointer_down(self.pipeline.doc(), screen_pt, button, modifiers);
        self.dispatch(actions)
    }

    pub fn pointer_move(&mut self, screen_pt: Point, modifiers: Modifiers) -> Vec<Action> {
        let actions = self.engine.on_pointer_move(self.pipeline.doc(), screen_pt, modifiers);
        self.dispatch(actions)
    }

    pub fn pointer_up(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        let actions = self.engine.on_pointer_up(self.pipeline.doc(), screen_pt, button, modifiers);
        self.dispatch(actions)
    }

    pub fn double_click(&mut self, screen_pt: Point) -> Vec<Action> {
        let actions = self.engine.on_double_click(self.pipeline.doc(), screen_pt);
        self.dispatch(actions)
    }

    pub fn wheel(&mut self, screen_pt: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        let actions = self.engine.on_wheel(screen_pt, delta, modifiers);
        self.dispatch(actions)
    }

    pub fn key_down(&mut self, key: &Key, modifiers: Modifiers) -> Vec<Action> {
        let actions = self.engine.on_key_down(key, modifiers);
        self.dispatch(actions)
    }

    pub fn key_up(&mut self, key: &Key, modifiers: Modifiers) -> Vec<Action> {
        let actions = self.engine.on_key_up(key, modifiers);
        self.dispatch(actions)
    }

    // --- Change feed ---

    /// Subscribe to the board's change feed.
    ///
    /// # Errors
    ///
    /// Returns the store error; the badge stays at `connecting`.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        let board_id = self.board.id;
        self.feed = None;
        if self.status.set_connection(ConnectionStatus::Connecting) {
            info!(%board_id, status = ConnectionStatus::Connecting.as_str(), "sync status");
        }
        match self.store.subscribe(board_id).await {
            Ok(sub) => {
                self.feed = Some(sub);
                Ok(())
            }
            Err(e) => {
                warn!(%board_id, error = %e, "subscribe failed");
                self.status.record_error(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Next feed message. `None` when there is no live subscription.
    pub async fn next_feed(&mut self) -> Option<FeedMessage> {
        match self.feed.as_mut() {
            Some(feed) => feed.recv().await,
            None => None,
        }
    }

    /// Next feed message if one is already queued.
    pub fn poll_feed(&mut self) -> Option<FeedMessage> {
        self.feed.as_mut().and_then(Subscription::try_recv)
    }

    /// Apply one feed message to local state and the badge.
    pub fn handle_feed(&mut self, msg: FeedMessage) -> FeedOutcome {
        let board_id = self.board.id;
        match msg {
            FeedMessage::Change(event) => {
                self.fold_write_failures();
                let held = event.id().map_or(&[][..], |id| self.engine.input.held_fields(&id));
                let outcome = self.pipeline.apply_remote(&event, &mut self.engine.ui, held);
                debug!(%board_id, kind = event.kind.as_str(), table = event.table.as_str(), ?outcome, "feed change");
                FeedOutcome::Change(outcome)
            }
            FeedMessage::Connected => self.transition(ConnectionStatus::Connected),
            FeedMessage::Disconnected => {
                self.feed = None;
                self.transition(ConnectionStatus::Disconnected)
            }
        }
    }

    /// Drain every queued feed message. Returns how many changed local state.
    pub fn pump_feed(&mut self) -> usize {
        let mut changed = 0;
        while let Some(msg) = self.poll_feed() {
            if let FeedOutcome::Change(outcome) = self.handle_feed(msg) {
                if outcome.changed() {
                    changed += 1;
                }
            }
        }
        changed
    }

    fn transition(&mut self, to: ConnectionStatus) -> FeedOutcome {
        if self.status.set_connection(to) {
            info!(board_id = %self.board.id, status = to.as_str(), "sync status");
            FeedOutcome::Status(to)
        } else {
            FeedOutcome::Ignored
        }
    }

    /// Resubscribe and reload the board contents. History, view and
    /// selection survive; selected ids that vanished are pruned.
    ///
    /// # Errors
    ///
    /// Returns the store error from either step.
    pub async fn resync(&mut self) -> Result<(), SessionError> {
        self.connect().await?;
        let board_id = self.board.id;
        let snapshot = self.store.select_all(board_id).await?;
        let view = self.pipeline.doc().view;
        self.pipeline.load(snapshot, view);
        self.engine.ui.prune(self.pipeline.doc());
        info!(%board_id, notes = self.pipeline.doc().notes().len(), "board resynced");
        Ok(())
    }

    /// Stop the feed and wait for queued writes to reach the store.
    pub async fn close(self) -> Vec<WriteFailure> {
        let Self { pipeline, writer, feed, board, .. } = self;
        drop(feed);
        drop(pipeline);
        let failures = writer.finish().await;
        debug!(board_id = %board.id, failures = failures.len(), "session closed");
        failures
    }
}
