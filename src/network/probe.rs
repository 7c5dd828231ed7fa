//! Connectivity feed backed by a periodic reachability probe

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, trace};

/// Source of "is the network usable right now"
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn check(&self) -> bool;
}

/// Reports online iff a TCP connection to the collector can be opened
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    /// Build a probe for the host and port of a collector URL
    ///
    /// Returns `None` if the URL has no host or no known port.
    pub fn for_url(url: &str, timeout: Duration) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        let port = parsed.port_or_known_default()?;
        Some(Self::new(format!("{}:{}", host, port), timeout))
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn check(&self) -> bool {
        match timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                trace!("Probe {} failed: {}", self.address, e);
                false
            }
            Err(_) => {
                trace!("Probe {} timed out", self.address);
                false
            }
        }
    }
}

/// Evaluate `probe` now and then every `period`, publishing only changes
///
/// The returned receiver already holds the result of the first check. The
/// task ends on its own once every receiver has been dropped.
pub async fn spawn_probe<P>(probe: P, period: Duration) -> (watch::Receiver<bool>, JoinHandle<()>)
where
    P: ConnectivityProbe + 'static,
{
    let initial = probe.check().await;
    debug!("Initial connectivity: online={}", initial);
    let (tx, rx) = watch::channel(initial);

    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            let online = probe.check().await;
            tx.send_if_modified(|current| {
                if *current == online {
                    false
                } else {
                    *current = online;
                    true
                }
            });
        }
    });

    (rx, task)
}
