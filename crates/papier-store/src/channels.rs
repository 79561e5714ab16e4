//! CRUD and staleness bookkeeping for [`Channel`] records.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use papier_shared::constants::DEFAULT_STALENESS_SECS;
use papier_shared::types::{ChannelKey, MessageId, RepoKey};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Channel;

impl Database {
    /// Make sure a channel row (and its repository row) exists.
    pub fn upsert_channel(&self, key: &ChannelKey) -> Result<()> {
        ensure_channel(self.conn(), key)?;
        Ok(())
    }

    /// Fetch a single channel.
    pub fn get_channel(&self, key: &ChannelKey) -> Result<Channel> {
        self.conn()
            .query_row(
                "SELECT key, name, unread_count, last_read_message_id, last_synced_at
                 FROM channels
                 WHERE key = ?1",
                params![key.to_string()],
                row_to_channel,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List all channels of a repository, ordered by name.
    pub fn list_channels(&self, repo: &RepoKey) -> Result<Vec<Channel>> {
        let mut stmt = self.conn().prepare(
            "SELECT key, name, unread_count, last_read_message_id, last_synced_at
             FROM channels
             WHERE repo_key = ?1
             ORDER BY name ASC",
        )?;

        let rows = stmt.query_map(params![repo.to_string()], row_to_channel)?;

        let mut channels = Vec::new();
        for row in rows {
            channels.push(row?);
        }
        Ok(channels)
    }

    /// True when the channel's cached snapshot cannot be trusted: no
    /// successful sync has occurred, or the last one is older than
    /// `threshold_secs`.
    pub fn is_stale(&self, key: &ChannelKey, threshold_secs: i64) -> Result<bool> {
        let last_synced: Option<Option<String>> = self
            .conn()
            .query_row(
                "SELECT last_synced_at FROM channels WHERE key = ?1",
                params![key.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(Some(last_synced)) = last_synced else {
            return Ok(true);
        };

        let last_synced: DateTime<Utc> = DateTime::parse_from_rfc3339(&last_synced)
            .map(|dt| dt.with_timezone(&Utc))?;

        Ok((Utc::now() - last_synced).num_seconds() > threshold_secs)
    }

    /// [`Database::is_stale`] with the default 60-second threshold.
    pub fn is_stale_default(&self, key: &ChannelKey) -> Result<bool> {
        self.is_stale(key, DEFAULT_STALENESS_SECS)
    }

    /// Move the read marker to `message_id` and clear the unread count.
    pub fn mark_channel_read(&self, key: &ChannelKey, message_id: &MessageId) -> Result<()> {
        ensure_channel(self.conn(), key)?;
        self.conn().execute(
            "UPDATE channels SET last_read_message_id = ?2, unread_count = 0 WHERE key = ?1",
            params![key.to_string(), message_id.as_str()],
        )?;
        Ok(())
    }

    /// Delete a channel (cascades to its messages).  Returns `true` if a
    /// row was deleted.
    pub fn delete_channel(&self, key: &ChannelKey) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM channels WHERE key = ?1",
            params![key.to_string()],
        )?;
        Ok(affected > 0)
    }
}

/// Insert the repository and channel rows for `key` if absent.  Callable
/// inside a transaction.
pub(crate) fn ensure_channel(conn: &Connection, key: &ChannelKey) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO repositories (key) VALUES (?1)",
        params![key.repo.to_string()],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO channels (key, repo_key, name) VALUES (?1, ?2, ?3)",
        params![key.to_string(), key.repo.to_string(), key.channel],
    )?;
    Ok(())
}

/// Map a `rusqlite::Row` to a [`Channel`].
fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<Channel> {
    let key_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let unread_count: u32 = row.get(2)?;
    let last_read: Option<String> = row.get(3)?;
    let last_synced_str: Option<String> = row.get(4)?;

    let key = ChannelKey::parse(&key_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let last_synced_at = last_synced_str
        .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Channel {
        key,
        name,
        unread_count,
        last_read_message_id: last_read.map(MessageId),
        last_synced_at,
    })
}

#[cfg(test)]
mod tests {
    use papier_shared::types::RepoKey;

    use super::*;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn test_key() -> ChannelKey {
        ChannelKey::new(RepoKey::new("alice", "notes"), "general")
    }

    #[test]
    fn unknown_channel_is_stale() {
        let (_dir, db) = test_db();
        assert!(db.is_stale(&test_key(), 60).unwrap());
        assert!(db.is_stale_default(&test_key()).unwrap());
    }

    #[test]
    fn channel_without_sync_is_stale() {
        let (_dir, db) = test_db();
        db.upsert_channel(&test_key()).unwrap();
        assert!(db.is_stale(&test_key(), 60).unwrap());
    }

    #[test]
    fn get_channel_maps_missing_to_not_found() {
        let (_dir, db) = test_db();
        assert!(matches!(
            db.get_channel(&test_key()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn list_channels_by_repo() {
        let (_dir, db) = test_db();
        let repo = RepoKey::new("alice", "notes");
        db.upsert_channel(&ChannelKey::new(repo.clone(), "zeta"))
            .unwrap();
        db.upsert_channel(&ChannelKey::new(repo.clone(), "alpha"))
            .unwrap();
        db.upsert_channel(&ChannelKey::new(RepoKey::new("bob", "other"), "misc"))
            .unwrap();

        let channels = db.list_channels(&repo).unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name, "alpha");
        assert_eq!(channels[1].name, "zeta");
    }

    #[test]
    fn mark_read_sets_marker_and_clears_unread() {
        let (_dir, db) = test_db();
        let key = test_key();
        let marker = MessageId("20250115T103045-alice-abc123".to_string());

        db.mark_channel_read(&key, &marker).unwrap();

        let channel = db.get_channel(&key).unwrap();
        assert_eq!(channel.last_read_message_id, Some(marker));
        assert_eq!(channel.unread_count, 0);
    }
}
