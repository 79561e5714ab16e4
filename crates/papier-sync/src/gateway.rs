//! The abstract remote file-hosting capability the engine depends on.
//!
//! A concrete implementation translates these calls into whatever API the
//! remote store exposes (HTTP, auth, pagination); that transport is out of
//! scope here and lives outside the workspace.  Tests run against an
//! in-memory implementation.
//!
//! Methods return `impl Future + Send` so the engine can stay generic and
//! pollers can be spawned onto the runtime; implementors just write
//! `async fn`.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use papier_shared::types::{RevisionMarker, VersionToken};

/// Remote quota reported on a response: `remaining` of `limit` writes
/// until `reset_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub remaining: u32,
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One entry of a directory listing.
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
    pub version_token: VersionToken,
}

/// A directory listing.
#[derive(Debug, Clone)]
pub struct Listing {
    pub entries: Vec<RemoteEntry>,
    pub quota: Option<QuotaSnapshot>,
}

/// A fetched file: content plus the token identifying this exact content.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub content: String,
    pub version_token: VersionToken,
    pub quota: Option<QuotaSnapshot>,
}

/// Result of a successful create or update.
#[derive(Debug, Clone)]
pub struct WriteReceipt {
    pub version_token: VersionToken,
    pub quota: Option<QuotaSnapshot>,
}

/// Result of a successful delete.
#[derive(Debug, Clone)]
pub struct DeleteReceipt {
    pub quota: Option<QuotaSnapshot>,
}

/// Result of the cheap conditional change probe.
#[derive(Debug, Clone)]
pub struct ChangeProbe {
    /// Whether anything changed since the supplied marker.
    pub changed: bool,
    /// Marker to carry into the next probe.
    pub marker: RevisionMarker,
    pub quota: Option<QuotaSnapshot>,
}

/// The newest commit touching a path.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: String,
    pub quota: Option<QuotaSnapshot>,
}

/// Errors a gateway implementation may report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Rate limited")]
    RateLimited,

    /// The expected version token does not match current remote state.
    #[error("Version token mismatch")]
    Conflict,

    #[error("Transport error: {0}")]
    Transport(String),
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Abstract remote file store, addressed by slash-separated paths relative
/// to the repository root.
pub trait RemoteGateway: Send + Sync {
    /// List the entries of a directory.
    fn list(&self, path: &str) -> impl Future<Output = GatewayResult<Listing>> + Send;

    /// Fetch a file's content and version token.
    fn get(&self, path: &str) -> impl Future<Output = GatewayResult<RemoteFile>> + Send;

    /// Create a file.  Fails if the path already exists.
    fn create(
        &self,
        path: &str,
        content: &str,
    ) -> impl Future<Output = GatewayResult<WriteReceipt>> + Send;

    /// Replace a file's content, conditional on `expected` matching the
    /// current remote token.  Fails with [`GatewayError::Conflict`]
    /// otherwise.
    fn update(
        &self,
        path: &str,
        content: &str,
        expected: &VersionToken,
    ) -> impl Future<Output = GatewayResult<WriteReceipt>> + Send;

    /// Delete a file, with the same conditional semantics as `update`.
    fn delete(
        &self,
        path: &str,
        expected: &VersionToken,
    ) -> impl Future<Output = GatewayResult<DeleteReceipt>> + Send;

    /// Cheap conditional check: has anything changed since `marker`?
    /// `None` means the caller holds no marker yet.
    fn has_changed(
        &self,
        marker: Option<&RevisionMarker>,
    ) -> impl Future<Output = GatewayResult<ChangeProbe>> + Send;

    /// The newest commit touching `path` (empty path: the whole
    /// repository).
    fn latest_commit(&self, path: &str) -> impl Future<Output = GatewayResult<CommitInfo>> + Send;
}
