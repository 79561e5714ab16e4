//! In-memory [`RemoteGateway`] used by the engine and poller tests.
//!
//! Behaves like the real remote at the interface boundary: content-hash
//! style version tokens, conditional update/delete, a revision counter
//! backing the cheap change probe, and an optional quota snapshot attached
//! to every response.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use papier_shared::types::{RevisionMarker, VersionToken};

use crate::gateway::{
    ChangeProbe, CommitInfo, DeleteReceipt, EntryKind, GatewayError, GatewayResult, Listing,
    QuotaSnapshot, RemoteEntry, RemoteFile, RemoteGateway, WriteReceipt,
};

struct FileRecord {
    content: String,
    token: u64,
}

pub struct MemoryGateway {
    files: Mutex<BTreeMap<String, FileRecord>>,
    next_token: AtomicU64,
    /// Bumped on every successful mutation; backs `has_changed`.
    revision: AtomicU64,
    calls: AtomicUsize,
    /// While non-zero, `has_changed` fails with a transport error.
    failing_probes: AtomicU64,
    /// Paths still present in listings whose `get` reports `NotFound`,
    /// as if deleted by another client mid-refresh.
    vanishing: Mutex<HashSet<String>>,
    quota: Mutex<Option<QuotaSnapshot>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            next_token: AtomicU64::new(1),
            revision: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
            failing_probes: AtomicU64::new(0),
            vanishing: Mutex::new(HashSet::new()),
            quota: Mutex::new(None),
        }
    }

    /// Install (or overwrite) a file directly, bypassing conditional
    /// checks, as if another client had written it.
    pub fn seed(&self, path: &str, content: &str) {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        self.files.lock().unwrap().insert(
            path.to_string(),
            FileRecord {
                content: content.to_string(),
                token,
            },
        );
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    /// Make the next `n` change probes fail with a transport error.
    pub fn fail_next_probes(&self, n: u64) {
        self.failing_probes.store(n, Ordering::SeqCst);
    }

    /// Keep a path listed but make its `get` report `NotFound`.
    pub fn vanish_on_get(&self, path: &str) {
        self.vanishing.lock().unwrap().insert(path.to_string());
    }

    /// Attach a quota snapshot to every subsequent response.
    pub fn set_quota(&self, quota: QuotaSnapshot) {
        *self.quota.lock().unwrap() = Some(quota);
    }

    /// Current content of a file, if present.
    pub fn content(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|f| f.content.clone())
    }

    /// Number of gateway calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn current_quota(&self) -> Option<QuotaSnapshot> {
        self.quota.lock().unwrap().clone()
    }

    fn mint_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::SeqCst)
    }

    fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}

fn token_string(token: u64) -> VersionToken {
    VersionToken(format!("v{token}"))
}

impl RemoteGateway for MemoryGateway {
    async fn list(&self, path: &str) -> GatewayResult<Listing> {
        self.record_call();
        let prefix = format!("{path}/");
        let files = self.files.lock().unwrap();

        let entries: Vec<RemoteEntry> = files
            .iter()
            .filter_map(|(full_path, record)| {
                let rest = full_path.strip_prefix(&prefix)?;
                if rest.contains('/') {
                    return None;
                }
                Some(RemoteEntry {
                    name: rest.to_string(),
                    kind: EntryKind::File,
                    version_token: token_string(record.token),
                })
            })
            .collect();

        if entries.is_empty() {
            return Err(GatewayError::NotFound);
        }
        Ok(Listing {
            entries,
            quota: self.current_quota(),
        })
    }

    async fn get(&self, path: &str) -> GatewayResult<RemoteFile> {
        self.record_call();
        if self.vanishing.lock().unwrap().contains(path) {
            return Err(GatewayError::NotFound);
        }
        let files = self.files.lock().unwrap();
        let record = files.get(path).ok_or(GatewayError::NotFound)?;
        Ok(RemoteFile {
            content: record.content.clone(),
            version_token: token_string(record.token),
            quota: self.current_quota(),
        })
    }

    async fn create(&self, path: &str, content: &str) -> GatewayResult<WriteReceipt> {
        self.record_call();
        let mut files = self.files.lock().unwrap();
        if files.contains_key(path) {
            return Err(GatewayError::Conflict);
        }
        let token = self.mint_token();
        files.insert(
            path.to_string(),
            FileRecord {
                content: content.to_string(),
                token,
            },
        );
        self.bump_revision();
        Ok(WriteReceipt {
            version_token: token_string(token),
            quota: self.current_quota(),
        })
    }

    async fn update(
        &self,
        path: &str,
        content: &str,
        expected: &VersionToken,
    ) -> GatewayResult<WriteReceipt> {
        self.record_call();
        let mut files = self.files.lock().unwrap();
        let record = files.get_mut(path).ok_or(GatewayError::NotFound)?;
        if token_string(record.token) != *expected {
            return Err(GatewayError::Conflict);
        }
        record.content = content.to_string();
        record.token = self.mint_token();
        let token = record.token;
        self.bump_revision();
        Ok(WriteReceipt {
            version_token: token_string(token),
            quota: self.current_quota(),
        })
    }

    async fn delete(&self, path: &str, expected: &VersionToken) -> GatewayResult<DeleteReceipt> {
        self.record_call();
        let mut files = self.files.lock().unwrap();
        let record = files.get(path).ok_or(GatewayError::NotFound)?;
        if token_string(record.token) != *expected {
            return Err(GatewayError::Conflict);
        }
        files.remove(path);
        self.bump_revision();
        Ok(DeleteReceipt {
            quota: self.current_quota(),
        })
    }

    async fn has_changed(&self, marker: Option<&RevisionMarker>) -> GatewayResult<ChangeProbe> {
        self.record_call();
        if self
            .failing_probes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(GatewayError::Transport("probe failed".to_string()));
        }
        let revision = self.revision.load(Ordering::SeqCst).to_string();
        let changed = match marker {
            Some(marker) => marker.as_str() != revision,
            // No marker held yet: report changed so the caller seeds one
            // with a full refresh.
            None => true,
        };
        Ok(ChangeProbe {
            changed,
            marker: RevisionMarker(revision),
            quota: self.current_quota(),
        })
    }

    async fn latest_commit(&self, _path: &str) -> GatewayResult<CommitInfo> {
        self.record_call();
        Ok(CommitInfo {
            id: format!("commit-{}", self.revision.load(Ordering::SeqCst)),
            quota: self.current_quota(),
        })
    }
}
