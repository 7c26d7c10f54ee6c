//! Async host for the canvas engine.
//!
//! The `canvas` crate is pure and synchronous. This crate supplies what it
//! leaves out: a remote store with a change feed, a background writer that
//! drains the engine's remote writes, and [`session::BoardSession`], which
//! ties one open board to both.
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `NOTEBOARD_*` / `DATABASE_URL` environment configuration |
//! | [`db`] | Postgres pool and migrations |
//! | [`remote`] | [`remote::RemoteStore`] contract, memory and Postgres backends |
//! | [`writer`] | Bounded write queue and its background task |
//! | [`session`] | Board open/save/delete, input dispatch, feed handling |
//! | [`identity`] | Current-user and upload collaborators |

pub mod config;
pub mod db;
pub mod identity;
pub mod remote;
pub mod session;
pub mod writer;
