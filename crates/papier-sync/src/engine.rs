//! The sync engine: the single API UI layers consume.
//!
//! Reads go through the local store when the cached snapshot is fresh;
//! otherwise the channel's directory is re-listed, decoded, and installed
//! as one atomic snapshot.  Writes go to the remote first and are mirrored
//! into the store only after remote success (write-through), so a
//! `send_message` is locally visible immediately even while the channel
//! snapshot is still fresh.
//!
//! Mutations on one channel are serialized through a per-channel lock;
//! operations on different channels proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use papier_shared::codec;
use papier_shared::constants::DEFAULT_STALENESS_SECS;
use papier_shared::types::{ChannelKey, MessageId, RepoKey};
use papier_shared::Message;
use papier_store::{Channel, Database, Repository};

use crate::error::SyncError;
use crate::gateway::{EntryKind, GatewayError, QuotaSnapshot, RemoteGateway};
use crate::quota::RateLimitState;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum age (seconds) of a cached channel snapshot before a read
    /// goes back to the remote.
    pub staleness_secs: i64,
    /// Opaque credential handed to the gateway out-of-band.  `None` means
    /// remote writes are refused with `Unauthorized`.
    pub credential: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            staleness_secs: DEFAULT_STALENESS_SECS,
            credential: None,
        }
    }
}

/// Orchestrates the local store, the message codec, and a remote gateway.
pub struct SyncEngine<G> {
    gateway: Arc<G>,
    store: Mutex<Database>,
    channel_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    quota: RateLimitState,
    config: SyncConfig,
}

impl<G: RemoteGateway> SyncEngine<G> {
    pub fn new(gateway: Arc<G>, store: Database, config: SyncConfig) -> Self {
        Self {
            gateway,
            store: Mutex::new(store),
            channel_locks: Mutex::new(HashMap::new()),
            quota: RateLimitState::new(),
            config,
        }
    }

    /// Shared gateway handle (for pollers).
    pub fn gateway(&self) -> Arc<G> {
        Arc::clone(&self.gateway)
    }

    /// Shared quota state handle.
    pub fn quota(&self) -> RateLimitState {
        self.quota.clone()
    }

    /// Messages of a channel, ascending by creation date.
    ///
    /// Returns the cached set when it is fresh and non-empty (zero gateway
    /// calls); otherwise lists the channel directory, fetches and decodes
    /// every entry matching the message filename grammar, and installs the
    /// result as one snapshot.  A single malformed file, or one deleted
    /// between the listing and its fetch, is logged and skipped, never
    /// fatal to the rest of the channel.
    pub async fn fetch_messages(
        &self,
        key: &ChannelKey,
        force_refresh: bool,
    ) -> Result<Vec<Message>, SyncError> {
        let lock = self.channel_lock(key).await;
        let _serialized = lock.lock().await;

        if !force_refresh {
            let store = self.store.lock().await;
            if !store.is_stale(key, self.config.staleness_secs)? {
                let cached = store.get_channel_messages(key)?;
                if !cached.is_empty() {
                    tracing::debug!(channel = %key, count = cached.len(), "serving fresh cache");
                    return Ok(cached);
                }
            }
        }

        let listing = self.gateway.list(key.dir_path()).await?;
        self.note_quota(&listing.quota);

        let mut messages = Vec::new();
        for entry in listing.entries {
            if entry.kind != EntryKind::File || !codec::is_message_filename(&entry.name) {
                continue;
            }
            let file = match self.gateway.get(&key.file_path(&entry.name)).await {
                Ok(file) => file,
                // Deleted by another client between the list and the get.
                Err(GatewayError::NotFound) => {
                    tracing::warn!(channel = %key, file = %entry.name,
                        "listed file vanished before fetch; skipping");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            self.note_quota(&file.quota);

            match codec::decode(&entry.name, &file.content) {
                Ok(mut message) => {
                    message.version_token = Some(file.version_token);
                    messages.push(message);
                }
                Err(e) => {
                    tracing::warn!(channel = %key, file = %entry.name, error = %e,
                        "skipping malformed message file");
                }
            }
        }
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut store = self.store.lock().await;
        store.replace_channel_messages(key, messages)?;
        let cached = store.get_channel_messages(key)?;
        tracing::info!(channel = %key, count = cached.len(), "channel refreshed");
        Ok(cached)
    }

    /// Encode and create a new message file remotely, then mirror it into
    /// the local cache.
    pub async fn send_message(
        &self,
        key: &ChannelKey,
        sender: &str,
        body: &str,
        reply_to: Option<&str>,
        tags: &[String],
    ) -> Result<Message, SyncError> {
        self.require_credential()?;

        let (filename, document) = codec::encode(sender, body, reply_to, tags, Utc::now())
            .map_err(SyncError::InvalidMessage)?;
        let receipt = self
            .gateway
            .create(&key.file_path(&filename), &document)
            .await?;
        self.note_quota(&receipt.quota);

        // Decode what was actually written so the cached copy is canonical.
        let mut message = codec::decode(&filename, &document)?;
        message.version_token = Some(receipt.version_token);

        let lock = self.channel_lock(key).await;
        let _serialized = lock.lock().await;
        self.store.lock().await.upsert_message(key, &message)?;

        tracing::info!(channel = %key, id = %message.id, "message sent");
        Ok(message)
    }

    /// Replace a message's body, stamping `edited`, conditional on the
    /// version token held in `message`.
    ///
    /// A token mismatch surfaces as [`SyncError::Conflict`] with the local
    /// cache untouched; the caller must refetch before retrying.
    pub async fn edit_message(
        &self,
        key: &ChannelKey,
        message: &Message,
        new_body: &str,
    ) -> Result<Message, SyncError> {
        self.require_credential()?;
        let token = message
            .version_token
            .as_ref()
            .ok_or(SyncError::MissingVersionToken)?;

        let document = codec::encode_edited(message, new_body, Utc::now());
        let receipt = self
            .gateway
            .update(&key.file_path(&message.filename), &document, token)
            .await?;
        self.note_quota(&receipt.quota);

        let mut updated = codec::decode(&message.filename, &document)?;
        updated.version_token = Some(receipt.version_token);

        let lock = self.channel_lock(key).await;
        let _serialized = lock.lock().await;
        self.store.lock().await.upsert_message(key, &updated)?;

        tracing::info!(channel = %key, id = %updated.id, "message edited");
        Ok(updated)
    }

    /// Delete a message remotely, conditional on its version token, and
    /// drop it from the local cache.
    ///
    /// On `Conflict` the local copy is removed anyway -- the caller's
    /// intent is that the message disappear -- but the conflict is still
    /// reported so the caller can refetch.
    pub async fn delete_message(&self, key: &ChannelKey, message: &Message) -> Result<(), SyncError> {
        self.require_credential()?;
        let token = message
            .version_token
            .as_ref()
            .ok_or(SyncError::MissingVersionToken)?;

        let result = self
            .gateway
            .delete(&key.file_path(&message.filename), token)
            .await;

        match result {
            Ok(receipt) => {
                self.note_quota(&receipt.quota);
                let lock = self.channel_lock(key).await;
                let _serialized = lock.lock().await;
                self.store.lock().await.remove_message(key, &message.id)?;
                tracing::info!(channel = %key, id = %message.id, "message deleted");
                Ok(())
            }
            Err(GatewayError::Conflict) => {
                let lock = self.channel_lock(key).await;
                let _serialized = lock.lock().await;
                self.store.lock().await.remove_message(key, &message.id)?;
                tracing::warn!(channel = %key, id = %message.id,
                    "delete conflicted; local copy dropped anyway");
                Err(SyncError::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Move the channel's read marker and clear its unread count.
    pub async fn mark_read(
        &self,
        key: &ChannelKey,
        message_id: &MessageId,
    ) -> Result<(), SyncError> {
        self.store.lock().await.mark_channel_read(key, message_id)?;
        Ok(())
    }

    /// Channel bookkeeping record (unread count, read marker, last sync).
    pub async fn channel_info(&self, key: &ChannelKey) -> Result<Channel, SyncError> {
        Ok(self.store.lock().await.get_channel(key)?)
    }

    /// Record the repository's newest remote commit id.
    pub async fn refresh_repository_head(&self, repo: &RepoKey) -> Result<Repository, SyncError> {
        let commit = self.gateway.latest_commit("").await?;
        self.note_quota(&commit.quota);

        let store = self.store.lock().await;
        store.set_repository_synced(repo, Some(&commit.id))?;
        Ok(store.get_repository(repo)?)
    }

    fn require_credential(&self) -> Result<(), SyncError> {
        if self.config.credential.is_none() {
            return Err(SyncError::Unauthorized);
        }
        Ok(())
    }

    fn note_quota(&self, quota: &Option<QuotaSnapshot>) {
        if let Some(snapshot) = quota {
            self.quota.observe(snapshot);
        }
    }

    async fn channel_lock(&self, key: &ChannelKey) -> Arc<Mutex<()>> {
        let mut locks = self.channel_locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
