//! # papier-sync
//!
//! The asynchronous heart of papier: keeps the local store mirrored
//! against a remote file-hosting repository of message files.
//!
//! - [`gateway::RemoteGateway`] is the abstract capability the engine
//!   depends on: list/fetch/create/update/delete files by path, plus a
//!   cheap conditional "has anything changed" probe.  The concrete HTTP
//!   transport lives outside this workspace.
//! - [`engine::SyncEngine`] is the single API consumed by UI layers:
//!   read-through/write-through caching with staleness checks and
//!   optimistic-concurrency conflict detection via version tokens.
//! - [`poller::PollerSet`] runs one cancelable background task per open
//!   channel, nudging consumers to refresh when the remote reports a
//!   change.
//! - [`quota::RateLimitState`] tracks the process-wide remote write quota
//!   reported on every gateway response.

pub mod engine;
pub mod gateway;
pub mod poller;
pub mod quota;

mod error;

#[cfg(test)]
mod testing;

pub use engine::{SyncConfig, SyncEngine};
pub use error::SyncError;
pub use gateway::RemoteGateway;
pub use poller::{PollerConfig, PollerSet};
pub use quota::{QuotaLevel, RateLimitState};
