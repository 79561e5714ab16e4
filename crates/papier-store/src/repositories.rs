//! CRUD operations for [`Repository`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use papier_shared::types::RepoKey;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Repository;

impl Database {
    /// Make sure a repository row exists.
    pub fn upsert_repository(&self, key: &RepoKey) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO repositories (key) VALUES (?1)",
            params![key.to_string()],
        )?;
        Ok(())
    }

    /// Fetch a single repository.
    pub fn get_repository(&self, key: &RepoKey) -> Result<Repository> {
        self.conn()
            .query_row(
                "SELECT key, last_synced_at, last_remote_commit
                 FROM repositories
                 WHERE key = ?1",
                params![key.to_string()],
                row_to_repository,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Record a successful repository sync and the newest remote commit id
    /// observed for it.
    pub fn set_repository_synced(&self, key: &RepoKey, commit_id: Option<&str>) -> Result<()> {
        self.upsert_repository(key)?;
        self.conn().execute(
            "UPDATE repositories
             SET last_synced_at = ?2,
                 last_remote_commit = COALESCE(?3, last_remote_commit)
             WHERE key = ?1",
            params![key.to_string(), Utc::now().to_rfc3339(), commit_id],
        )?;
        Ok(())
    }
}

/// Map a `rusqlite::Row` to a [`Repository`].
fn row_to_repository(row: &rusqlite::Row<'_>) -> rusqlite::Result<Repository> {
    let key_str: String = row.get(0)?;
    let last_synced_str: Option<String> = row.get(1)?;
    let last_remote_commit: Option<String> = row.get(2)?;

    let key = RepoKey::parse(&key_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let last_synced_at = last_synced_str
        .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Repository {
        key,
        last_synced_at,
        last_remote_commit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn upsert_then_get() {
        let (_dir, db) = test_db();
        let key = RepoKey::new("alice", "notes");

        db.upsert_repository(&key).unwrap();
        let repo = db.get_repository(&key).unwrap();
        assert_eq!(repo.key, key);
        assert_eq!(repo.last_synced_at, None);
        assert_eq!(repo.last_remote_commit, None);
    }

    #[test]
    fn set_synced_records_commit() {
        let (_dir, db) = test_db();
        let key = RepoKey::new("alice", "notes");

        db.set_repository_synced(&key, Some("abc123")).unwrap();
        let repo = db.get_repository(&key).unwrap();
        assert!(repo.last_synced_at.is_some());
        assert_eq!(repo.last_remote_commit.as_deref(), Some("abc123"));

        // A sync without a commit id keeps the previous one.
        db.set_repository_synced(&key, None).unwrap();
        let repo = db.get_repository(&key).unwrap();
        assert_eq!(repo.last_remote_commit.as_deref(), Some("abc123"));
    }
}
