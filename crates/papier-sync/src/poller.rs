//! Per-channel background change polling.
//!
//! One dedicated tokio task per open channel performs the gateway's cheap
//! conditional probe on a fixed interval, carrying the opaque revision
//! marker between probes.  When the remote reports a change, the channel
//! key is pushed on a notification channel; the consumer is expected to
//! call `fetch_messages(key, force_refresh = true)` on the engine.
//!
//! Cancellation is cooperative: the loop exits at the next probe or sleep
//! boundary, never mid-flight.  A failed probe is logged and the loop
//! continues; a single bad poll never terminates it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use papier_shared::constants::DEFAULT_POLL_INTERVAL_SECS;
use papier_shared::types::{ChannelKey, RevisionMarker};

use crate::gateway::RemoteGateway;

/// Poller tuning knobs.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between conditional probes.
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

struct PollerHandle {
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    async fn cancel(self) {
        let _ = self.cancel_tx.send(true);
        let _ = self.task.await;
    }
}

/// Registry of live pollers, at most one per channel.
pub struct PollerSet {
    pollers: Mutex<HashMap<String, PollerHandle>>,
}

impl PollerSet {
    pub fn new() -> Self {
        Self {
            pollers: Mutex::new(HashMap::new()),
        }
    }

    /// Start polling a channel.  A prior poller for the same channel is
    /// cancelled (and joined) first, so exactly one is ever live per
    /// channel.
    pub async fn start<G>(
        &self,
        gateway: Arc<G>,
        key: ChannelKey,
        notify: mpsc::UnboundedSender<ChannelKey>,
        config: PollerConfig,
    ) where
        G: RemoteGateway + 'static,
    {
        let mut pollers = self.pollers.lock().await;
        if let Some(previous) = pollers.remove(&key.to_string()) {
            tracing::debug!(channel = %key, "replacing existing poller");
            previous.cancel().await;
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(poll_loop(gateway, key.clone(), notify, config, cancel_rx));
        pollers.insert(key.to_string(), PollerHandle { cancel_tx, task });
    }

    /// Cancel the poller for a channel.  Returns `false` if none was
    /// running.
    pub async fn stop(&self, key: &ChannelKey) -> bool {
        let handle = self.pollers.lock().await.remove(&key.to_string());
        match handle {
            Some(handle) => {
                handle.cancel().await;
                true
            }
            None => false,
        }
    }

    /// Cancel every live poller.
    pub async fn stop_all(&self) {
        let handles: Vec<PollerHandle> = {
            let mut pollers = self.pollers.lock().await;
            pollers.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            handle.cancel().await;
        }
    }

    /// Whether a poller is live for the channel.
    pub async fn is_running(&self, key: &ChannelKey) -> bool {
        self.pollers.lock().await.contains_key(&key.to_string())
    }
}

impl Default for PollerSet {
    fn default() -> Self {
        Self::new()
    }
}

async fn poll_loop<G: RemoteGateway>(
    gateway: Arc<G>,
    key: ChannelKey,
    notify: mpsc::UnboundedSender<ChannelKey>,
    config: PollerConfig,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let mut marker: Option<RevisionMarker> = None;
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::debug!(channel = %key, interval = ?config.interval, "change poller started");

    loop {
        tokio::select! {
            // First tick completes immediately: one probe right at start.
            _ = interval.tick() => {
                match gateway.has_changed(marker.as_ref()).await {
                    Ok(probe) => {
                        let changed = probe.changed;
                        marker = Some(probe.marker);
                        if changed {
                            tracing::debug!(channel = %key, "remote change detected");
                            if notify.send(key.clone()).is_err() {
                                // Nobody is listening anymore.
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(channel = %key, error = %e, "change probe failed");
                    }
                }
            }
            _ = cancel_rx.changed() => break,
        }
    }

    tracing::debug!(channel = %key, "change poller stopped");
}
