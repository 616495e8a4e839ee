//! Connectivity tracking.
//!
//! The monitor starts out online, so a cycle is attempted right away rather
//! than waiting for the first probe. An offline-to-online transition triggers a
//! sync cycle; going offline never cancels one already running.

use crate::gateway::HttpGateway;
use crate::sync::SyncOrchestrator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Connectivity as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity {
    pub online: bool,
    /// Offline-to-online transitions so far. Watchers compare counts, so a
    /// reconnect is not lost when several changes coalesce into one wakeup.
    pub reconnects: u64,
}

/// Shared online/offline flag. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<Connectivity>>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(Connectivity {
            online,
            reconnects: 0,
        });
        Self {
            state: Arc::new(state),
        }
    }

    /// Record the current reachability. Repeating the current value is a no-op.
    pub fn set_online(&self, online: bool) {
        let changed = self.state.send_if_modified(|current| {
            if current.online == online {
                return false;
            }
            current.online = online;
            if online {
                current.reconnects += 1;
            }
            true
        });
        if changed {
            tracing::info!(online, "connectivity changed");
        }
    }

    pub fn is_online(&self) -> bool {
        self.state.borrow().online
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.state.subscribe()
    }
}

/// Run a sync cycle whenever connectivity comes back.
pub fn spawn_sync_on_reconnect(
    monitor: &ConnectivityMonitor,
    orchestrator: Arc<SyncOrchestrator>,
) -> JoinHandle<()> {
    let mut changes = monitor.subscribe();
    let mut seen = changes.borrow_and_update().reconnects;
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let current = *changes.borrow_and_update();
            if current.online && current.reconnects != seen {
                tracing::info!("back online, starting sync");
                let report = orchestrator.sync_all().await;
                tracing::debug!(skipped = report.is_skipped(), "reconnect sync finished");
            }
            seen = current.reconnects;
        }
    })
}

/// Probe the remote store every `every` and feed the result to `monitor`.
pub fn spawn_reachability_probe(
    monitor: &ConnectivityMonitor,
    gateway: Arc<HttpGateway>,
    every: Duration,
) -> JoinHandle<()> {
    let monitor = monitor.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            monitor.set_online(gateway.probe().await);
        }
    })
}
