//! # papier-store
//!
//! Local persisted mirror of remote conversation state, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers keyed by
//! repository, channel, and message.  Staleness bookkeeping
//! (`last_synced_at` per channel and repository) lets the sync layer
//! decide when the mirror is trustworthy.

pub mod channels;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod repositories;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
