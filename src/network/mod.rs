//! # Network Monitor Module
//!
//! Tracks whether the collector is reachable and notifies a subscriber on
//! every online/offline transition.
//!
//! Connectivity itself comes from a `watch` feed (see [`probe`]); the monitor
//! turns that feed into edge-triggered callbacks. Repeated reports of the same
//! state are not forwarded.

pub mod probe;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub use probe::{spawn_probe, ConnectivityProbe, TcpProbe};

/// Online/offline observer
pub struct NetworkMonitor {
    feed: watch::Receiver<bool>,
    subscription: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("online", &*self.feed.borrow())
            .field("started", &self.subscription.is_some())
            .finish()
    }
}

impl NetworkMonitor {
    /// Create a monitor over a connectivity feed
    pub fn new(feed: watch::Receiver<bool>) -> Self {
        Self {
            feed,
            subscription: None,
        }
    }

    /// Current connectivity as last reported by the feed
    pub fn is_online(&self) -> bool {
        let online = *self.feed.borrow();
        debug!("Network status check: online={}", online);
        online
    }

    /// Subscribe to connectivity transitions
    ///
    /// `on_transition` runs on a background task and is called only when the
    /// state differs from the previously observed one. The state at the time
    /// of the call counts as observed.
    ///
    /// Starting an already started monitor replaces the previous subscription.
    pub fn start<F>(&mut self, on_transition: F)
    where
        F: Fn(bool) + Send + 'static,
    {
        self.stop();

        let mut feed = self.feed.clone();
        let mut last = *feed.borrow_and_update();

        self.subscription = Some(tokio::spawn(async move {
            while feed.changed().await.is_ok() {
                let online = *feed.borrow_and_update();
                if online == last {
                    continue;
                }
                last = online;
                info!(
                    "Network status changed: {}",
                    if online { "ONLINE" } else { "OFFLINE" }
                );
                on_transition(online);
            }
            debug!("Connectivity feed closed");
        }));
    }

    /// Drop the subscription; no callbacks fire afterwards
    pub fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.abort();
        }
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
