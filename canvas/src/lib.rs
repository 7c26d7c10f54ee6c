//! Canvas state and synchronization engine for the note board.
//!
//! This crate is pure and synchronous: no I/O, no async runtime. It owns
//! the entity model, turns raw pointer and keyboard input into mutation
//! intents, applies those intents optimistically while handing remote writes
//! to a sink, keeps snapshot-based undo/redo, and merges the remote change
//! feed back into local state. The host crate supplies the sink and feeds
//! change events in.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`doc`] | Notes, connectors, strokes, categories, snapshots, and [`doc::DocStore`] |
//! | [`rows`] | Persisted row shapes, [`rows::RemoteOp`], and feed [`rows::ChangeEvent`]s |
//! | [`camera`] | View state and screen/board coordinate conversions |
//! | [`input`] | Modes, modifiers, and the gesture state machine |
//! | [`hit`] | Hit-testing against notes, handles, connectors, and strokes |
//! | [`engine`] | [`engine::EngineCore`]: input events in, [`engine::Action`]s out |
//! | [`pipeline`] | Optimistic local apply + remote write submission |
//! | [`history`] | Bounded undo/redo snapshot stacks |
//! | [`diff`] | Snapshot diff expressed as remote writes |
//! | [`reconcile`] | Change-feed merge, echo suppression, connection status |
//! | [`consts`] | Shared numeric constants (zoom limits, minimum sizes, etc.) |

pub mod camera;
pub mod consts;
pub mod diff;
pub mod doc;
pub mod engine;
pub mod hit;
pub mod history;
pub mod input;
pub mod pipeline;
pub mod reconcile;
pub mod rows;
