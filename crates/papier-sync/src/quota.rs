//! Process-wide remote write-quota state.
//!
//! Every gateway response may carry a [`QuotaSnapshot`]; the engine feeds
//! them all through one [`RateLimitState`].  Interested parties subscribe
//! for level transitions instead of reading an ambient global.
//!
//! The engine never throttles on its own: exhaustion surfaces as
//! `SyncError::RateLimited` when the remote reports it, and backoff policy
//! stays with the caller.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::gateway::QuotaSnapshot;

/// Coarse quota level derived from the latest snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaLevel {
    /// Below 80% used.
    Normal,
    /// At least 80% used.
    Warning,
    /// At least 95% used.
    Critical,
    /// Nothing remaining.
    Exhausted,
}

fn level_of(snapshot: &QuotaSnapshot) -> QuotaLevel {
    if snapshot.remaining == 0 || snapshot.limit == 0 {
        return QuotaLevel::Exhausted;
    }
    let used = (snapshot.limit - snapshot.remaining.min(snapshot.limit)) as f64;
    let ratio = used / snapshot.limit as f64;
    if ratio >= 0.95 {
        QuotaLevel::Critical
    } else if ratio >= 0.80 {
        QuotaLevel::Warning
    } else {
        QuotaLevel::Normal
    }
}

struct Inner {
    snapshot: Option<QuotaSnapshot>,
    last_level: Option<QuotaLevel>,
    observers: Vec<mpsc::UnboundedSender<QuotaLevel>>,
}

/// Shared, clonable handle to the process-wide quota state.
#[derive(Clone)]
pub struct RateLimitState {
    inner: Arc<Mutex<Inner>>,
}

impl RateLimitState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                snapshot: None,
                last_level: None,
                observers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record a snapshot from a gateway response.  Observers are notified
    /// only when the derived level changes.
    pub fn observe(&self, snapshot: &QuotaSnapshot) {
        let mut inner = self.lock();
        let level = level_of(snapshot);
        inner.snapshot = Some(snapshot.clone());

        if inner.last_level != Some(level) {
            inner.last_level = Some(level);
            if level != QuotaLevel::Normal {
                tracing::warn!(
                    remaining = snapshot.remaining,
                    limit = snapshot.limit,
                    reset_at = %snapshot.reset_at,
                    ?level,
                    "remote quota level changed"
                );
            }
            inner.observers.retain(|tx| tx.send(level).is_ok());
        }
    }

    /// Current level, `Normal` until a snapshot has been observed.
    pub fn level(&self) -> QuotaLevel {
        self.lock().last_level.unwrap_or(QuotaLevel::Normal)
    }

    /// Latest observed snapshot, if any.
    pub fn snapshot(&self) -> Option<QuotaSnapshot> {
        self.lock().snapshot.clone()
    }

    /// Subscribe to level transitions.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<QuotaLevel> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().observers.push(tx);
        rx
    }
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn snapshot(remaining: u32, limit: u32) -> QuotaSnapshot {
        QuotaSnapshot {
            remaining,
            limit,
            reset_at: Utc::now(),
        }
    }

    #[test]
    fn level_thresholds() {
        assert_eq!(level_of(&snapshot(50, 100)), QuotaLevel::Normal);
        assert_eq!(level_of(&snapshot(21, 100)), QuotaLevel::Normal);
        assert_eq!(level_of(&snapshot(20, 100)), QuotaLevel::Warning);
        assert_eq!(level_of(&snapshot(6, 100)), QuotaLevel::Warning);
        assert_eq!(level_of(&snapshot(5, 100)), QuotaLevel::Critical);
        assert_eq!(level_of(&snapshot(1, 100)), QuotaLevel::Critical);
        assert_eq!(level_of(&snapshot(0, 100)), QuotaLevel::Exhausted);
    }

    #[test]
    fn observers_notified_on_transitions_only() {
        let state = RateLimitState::new();
        let mut rx = state.subscribe();

        state.observe(&snapshot(90, 100));
        assert_eq!(rx.try_recv().unwrap(), QuotaLevel::Normal);

        // Same level again: no new notification.
        state.observe(&snapshot(85, 100));
        assert!(rx.try_recv().is_err());

        state.observe(&snapshot(10, 100));
        assert_eq!(rx.try_recv().unwrap(), QuotaLevel::Warning);

        state.observe(&snapshot(0, 100));
        assert_eq!(rx.try_recv().unwrap(), QuotaLevel::Exhausted);
        assert_eq!(state.level(), QuotaLevel::Exhausted);
        assert_eq!(state.snapshot().unwrap().remaining, 0);
    }
}
