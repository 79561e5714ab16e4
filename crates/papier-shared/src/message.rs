//! The [`Message`] domain model.
//!
//! Derives `Serialize`/`Deserialize` so it can be handed directly to UI
//! layers, like every other papier model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MessageId, VersionToken};

/// A single message, decoded from (or about to become) one file in a
/// channel directory.
///
/// Immutable except for `body` and `edited_at`, which change only through
/// an explicit edit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Filename minus extension; unique within a channel.
    pub id: MessageId,
    /// Full filename, matching the message filename grammar.
    pub filename: String,
    /// Sender identifier, lowercase alphanumeric.
    pub sender: String,
    /// Creation time, normalized to UTC.
    pub created_at: DateTime<Utc>,
    /// Filename of the message this one replies to.  A weak reference:
    /// it is not validated to exist, and dangling values are legal.
    pub reply_to: Option<String>,
    /// Ordered set of short tag strings.
    pub tags: Vec<String>,
    /// Present only after an edit.
    pub edited_at: Option<DateTime<Utc>>,
    /// Free-form content, leading/trailing whitespace trimmed.
    pub body: String,
    /// Remote content token; `None` for locally authored, not-yet-synced
    /// messages.  Required to update or delete.
    pub version_token: Option<VersionToken>,
}
