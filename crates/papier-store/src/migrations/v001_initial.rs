//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `repositories`, `channels`, `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Repositories (sync scopes)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS repositories (
    key                TEXT PRIMARY KEY NOT NULL,  -- owner/name
    last_synced_at     TEXT,                       -- ISO-8601 / RFC-3339
    last_remote_commit TEXT                        -- opaque commit id
);

-- ----------------------------------------------------------------
-- Channels
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS channels (
    key                  TEXT PRIMARY KEY NOT NULL,  -- owner/name/channel
    repo_key             TEXT NOT NULL,              -- FK -> repositories(key)
    name                 TEXT NOT NULL,
    unread_count         INTEGER NOT NULL DEFAULT 0,
    last_read_message_id TEXT,
    last_synced_at       TEXT,                       -- set only after a full listing

    FOREIGN KEY (repo_key) REFERENCES repositories(key) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_channels_repo_key ON channels(repo_key);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    channel_key   TEXT NOT NULL,              -- FK -> channels(key)
    id            TEXT NOT NULL,              -- filename minus extension
    filename      TEXT NOT NULL,
    sender        TEXT NOT NULL,
    created_at    TEXT NOT NULL,              -- ISO-8601
    reply_to      TEXT,                       -- weak reference, may dangle
    tags          TEXT NOT NULL DEFAULT '[]', -- JSON array of strings
    edited_at     TEXT,
    body          TEXT NOT NULL,
    version_token TEXT,                       -- NULL until synced

    PRIMARY KEY (channel_key, id),
    FOREIGN KEY (channel_key) REFERENCES channels(key) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_channel_created
    ON messages(channel_key, created_at ASC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
