//! Domain model structs persisted in the local SQLite mirror.
//!
//! [`papier_shared::Message`] is the third persisted model; it lives in
//! the shared crate because the codec produces it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use papier_shared::types::{ChannelKey, MessageId, RepoKey};

/// A channel: one directory of message files, mirrored locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    /// Composite key `owner/name/channel`.
    pub key: ChannelKey,
    /// Channel (directory) name.
    pub name: String,
    /// Messages newer than the read marker.
    pub unread_count: u32,
    /// Id of the newest message the user has seen.
    pub last_read_message_id: Option<MessageId>,
    /// Set only after a successful full listing of the channel.
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// A repository: the remote sync scope a set of channels belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repository {
    /// Composite key `owner/name`.
    pub key: RepoKey,
    /// Last time any channel of this repository completed a full sync.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Newest remote commit id observed for this repository.
    pub last_remote_commit: Option<String>,
}
