//! Message set operations: snapshot replace, write-through upsert,
//! removal, ordered reads.
//!
//! All mutations here are atomic at the granularity the sync layer needs:
//! a snapshot replace either fully installs the new set or leaves the old
//! one untouched, and retention trimming happens inside the same
//! transaction as the write that could exceed the bound.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use papier_shared::constants::CHANNEL_RETENTION_LIMIT;
use papier_shared::types::{ChannelKey, MessageId, VersionToken};
use papier_shared::Message;

use crate::channels::ensure_channel;
use crate::database::Database;
use crate::error::Result;

impl Database {
    /// All cached messages of a channel, ascending by creation date.
    /// Empty if the channel has never been synced.
    pub fn get_channel_messages(&self, key: &ChannelKey) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, filename, sender, created_at, reply_to, tags, edited_at, body, version_token
             FROM messages
             WHERE channel_key = ?1
             ORDER BY created_at ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![key.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Atomically discard the channel's prior message set and install the
    /// new one, trimmed to the most recent [`CHANNEL_RETENTION_LIMIT`] by
    /// date, then stamp `last_synced_at`.
    ///
    /// The unread count is recomputed against the channel's read marker in
    /// the same transaction.  No reader ever observes a mix of the old and
    /// new sets.
    pub fn replace_channel_messages(
        &mut self,
        key: &ChannelKey,
        mut messages: Vec<Message>,
    ) -> Result<()> {
        messages.sort_by(|a, b| (a.created_at, &a.id.0).cmp(&(b.created_at, &b.id.0)));
        if messages.len() > CHANNEL_RETENTION_LIMIT {
            let excess = messages.len() - CHANNEL_RETENTION_LIMIT;
            messages.drain(..excess);
        }

        let channel_key = key.to_string();
        let now = Utc::now().to_rfc3339();
        let count = messages.len();

        let tx = self.conn_mut().transaction()?;
        ensure_channel(&tx, key)?;

        tx.execute(
            "DELETE FROM messages WHERE channel_key = ?1",
            params![channel_key],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO messages
                     (channel_key, id, filename, sender, created_at, reply_to,
                      tags, edited_at, body, version_token)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for message in &messages {
                let tags_json = serde_json::to_string(&message.tags)?;
                insert.execute(params![
                    channel_key,
                    message.id.as_str(),
                    message.filename,
                    message.sender,
                    message.created_at.to_rfc3339(),
                    message.reply_to,
                    tags_json,
                    message.edited_at.map(|dt| dt.to_rfc3339()),
                    message.body,
                    message.version_token.as_ref().map(|t| t.0.clone()),
                ])?;
            }
        }

        let unread = unread_count(&tx, &channel_key)?;
        tx.execute(
            "UPDATE channels SET unread_count = ?2, last_synced_at = ?3 WHERE key = ?1",
            params![channel_key, unread, now],
        )?;
        tx.execute(
            "UPDATE repositories SET last_synced_at = ?2 WHERE key = ?1",
            params![key.repo.to_string(), now],
        )?;
        tx.commit()?;

        tracing::debug!(channel = %key, count, unread, "channel snapshot replaced");
        Ok(())
    }

    /// Insert or overwrite a single message without touching
    /// `last_synced_at` (used after a local write-through).  Evicts the
    /// oldest message if the retention bound would be exceeded.
    pub fn upsert_message(&mut self, key: &ChannelKey, message: &Message) -> Result<()> {
        let channel_key = key.to_string();

        let tags_json = serde_json::to_string(&message.tags)?;

        let tx = self.conn_mut().transaction()?;
        ensure_channel(&tx, key)?;

        tx.execute(
            "INSERT OR REPLACE INTO messages
                 (channel_key, id, filename, sender, created_at, reply_to,
                  tags, edited_at, body, version_token)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                channel_key,
                message.id.as_str(),
                message.filename,
                message.sender,
                message.created_at.to_rfc3339(),
                message.reply_to,
                tags_json,
                message.edited_at.map(|dt| dt.to_rfc3339()),
                message.body,
                message.version_token.as_ref().map(|t| t.0.clone()),
            ],
        )?;
        tx.execute(
            "DELETE FROM messages
             WHERE channel_key = ?1
               AND id NOT IN (SELECT id FROM messages
                              WHERE channel_key = ?1
                              ORDER BY created_at DESC, id DESC
                              LIMIT ?2)",
            params![channel_key, CHANNEL_RETENTION_LIMIT],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Remove a single message.  Returns `true` if a row was deleted.
    pub fn remove_message(&self, key: &ChannelKey, id: &MessageId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM messages WHERE channel_key = ?1 AND id = ?2",
            params![key.to_string(), id.as_str()],
        )?;
        Ok(affected > 0)
    }
}

/// Messages newer than the channel's read marker.  Zero when the marker is
/// unset or no longer resolves to a cached message.
fn unread_count(conn: &rusqlite::Connection, channel_key: &str) -> rusqlite::Result<u32> {
    let marker: Option<String> = conn
        .query_row(
            "SELECT last_read_message_id FROM channels WHERE key = ?1",
            params![channel_key],
            |row| row.get(0),
        )
        .optional()?
        .flatten();

    let Some(marker) = marker else { return Ok(0) };

    let marker_created: Option<String> = conn
        .query_row(
            "SELECT created_at FROM messages WHERE channel_key = ?1 AND id = ?2",
            params![channel_key, marker],
            |row| row.get(0),
        )
        .optional()?;

    match marker_created {
        Some(created) => conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE channel_key = ?1 AND created_at > ?2",
            params![channel_key, created],
            |row| row.get(0),
        ),
        None => Ok(0),
    }
}

/// Map a `rusqlite::Row` to a [`Message`].
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id: String = row.get(0)?;
    let filename: String = row.get(1)?;
    let sender: String = row.get(2)?;
    let created_str: String = row.get(3)?;
    let reply_to: Option<String> = row.get(4)?;
    let tags_json: String = row.get(5)?;
    let edited_str: Option<String> = row.get(6)?;
    let body: String = row.get(7)?;
    let version_token: Option<String> = row.get(8)?;

    let created_at = chrono::DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let edited_at = edited_str
        .map(|s| {
            chrono::DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&chrono::Utc))
        })
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id: MessageId(id),
        filename,
        sender,
        created_at,
        reply_to,
        tags,
        edited_at,
        body,
        version_token: version_token.map(VersionToken),
    })
}
