//! # Tracking Controller Module
//!
//! Delivery orchestration: decides whether a position is queued or sent,
//! drains the queue while online, retries failures and keeps a minimum
//! transmission cadence.
//!
//! This module handles:
//! - Buffering positions in the [`PositionQueue`] or sending them directly
//! - The drain chain (read → send → delete → read) while online
//! - Dropping queued positions recorded under a different device id
//! - Fixed 30 second retry after any read, send or delete failure
//! - Resuming the drain when the network comes back
//! - The heartbeat that resends the last position once per interval
//!
//! All state lives in one tokio task. Queue and transport operations run on
//! their own tasks and report back through a channel, so state is only ever
//! touched from the controller task.
//!
//! ## State transitions
//!
//! ```text
//! write → read → send → delete → read
//! read → send → retry → read → send
//! read → delete (stale) → read
//! ```

pub mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::RelayError;
use crate::gps::{PositionProvider, SampleEvent};
use crate::network::NetworkMonitor;
use crate::position::Position;
use crate::protocol::formatter::format_request;
use crate::queue::PositionQueue;
use crate::status::{self, StatusLog};
use crate::transport::AsyncTransport;

pub use state::{ControllerSnapshot, DrainState, WallClock};

/// Delay before a failed drain step is attempted again
pub const RETRY_DELAY: Duration = Duration::from_secs(30);

/// Shortest accepted heartbeat interval
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Settings fixed for the lifetime of a controller
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    /// Collector endpoint
    pub url: String,
    /// Identity stamped on positions; queued positions with another id are stale
    pub device_id: String,
    /// Heartbeat period and minimum transmission cadence
    pub interval: Duration,
    /// Queue positions before sending them
    pub buffer: bool,
}

impl From<&Config> for TrackingSettings {
    fn from(config: &Config) -> Self {
        Self {
            url: config.server.url.clone(),
            device_id: config.tracking.device_id.clone(),
            interval: config.tracking.interval(),
            buffer: config.tracking.buffer,
        }
    }
}

/// Where a sent position came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendOrigin {
    /// Oldest queue entry, part of the drain chain
    Queue,
    /// Sent without buffering; a single attempt
    Direct,
}

/// Result of an operation running off the controller task
#[derive(Debug)]
enum Completion {
    Written { success: bool },
    ReadFailed,
    ReadEmpty,
    ReadEntry(Position),
    Deleted { success: bool },
    Sent { position: Position, origin: SendOrigin, success: bool },
}

/// Delivery state machine
///
/// Build it with [`TrackingController::new`] and run it with
/// [`TrackingController::start`].
pub struct TrackingController {
    settings: TrackingSettings,
    queue: Arc<dyn PositionQueue>,
    transport: Arc<dyn AsyncTransport>,
    provider: Box<dyn PositionProvider>,
    network: NetworkMonitor,
    status: StatusLog,
    clock: WallClock,

    online: bool,
    waiting_for_data: bool,
    drain: DrainState,
    last_position: Option<Position>,
    last_send_time: Option<Instant>,

    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    snapshot_tx: watch::Sender<ControllerSnapshot>,
}

/// Handle to a running controller
pub struct ControllerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    snapshot: watch::Receiver<ControllerSnapshot>,
}

impl ControllerHandle {
    /// Stop the controller and wait for its shutdown sequence to finish
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            error!("Tracking controller task failed: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Latest controller state
    pub fn snapshot(&self) -> ControllerSnapshot {
        self.snapshot.borrow().clone()
    }
}

impl TrackingController {
    /// Create a controller
    ///
    /// The online flag is taken from `network` now; the collaborators are
    /// only started by [`start`](Self::start).
    pub fn new(
        mut settings: TrackingSettings,
        queue: Arc<dyn PositionQueue>,
        transport: Arc<dyn AsyncTransport>,
        provider: Box<dyn PositionProvider>,
        network: NetworkMonitor,
        status: StatusLog,
    ) -> Self {
        if settings.interval < MIN_INTERVAL {
            warn!(
                "Tracking interval {:?} is below {:?}, using {:?}",
                settings.interval, MIN_INTERVAL, MIN_INTERVAL
            );
            settings.interval = MIN_INTERVAL;
        }

        let online = network.is_online();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(ControllerSnapshot {
            online,
            ..ControllerSnapshot::default()
        });

        Self {
            settings,
            queue,
            transport,
            provider,
            network,
            status,
            clock: WallClock::new(),
            online,
            waiting_for_data: false,
            drain: DrainState::Idle,
            last_position: None,
            last_send_time: None,
            completions_tx,
            completions_rx,
            snapshot_tx,
        }
    }

    /// Run the controller on its own task
    ///
    /// Flushes any backlog if online, starts position updates, arms the
    /// heartbeat and subscribes to network transitions.
    pub fn start(self) -> ControllerHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let snapshot = self.snapshot_tx.subscribe();
        let task = tokio::spawn(self.run(stop_rx));

        ControllerHandle {
            stop_tx: Some(stop_tx),
            task,
            snapshot,
        }
    }

    async fn run(mut self, mut stop_rx: oneshot::Receiver<()>) {
        let (samples_tx, mut samples_rx) = mpsc::unbounded_channel();
        let (network_tx, mut network_rx) = mpsc::unbounded_channel();

        info!(
            "Starting tracking controller: url={}, device_id={}, buffer={}, online={}, interval={}s",
            self.settings.url,
            self.settings.device_id,
            self.settings.buffer,
            self.online,
            self.settings.interval.as_secs()
        );

        if self.online {
            self.read();
        }

        match self.provider.start_updates(samples_tx).await {
            Ok(()) => debug!("Position updates started"),
            Err(RelayError::Permission(msg)) => {
                error!("Position updates refused, continuing without new fixes: {}", msg)
            }
            Err(e) => warn!("Position updates failed to start, continuing without new fixes: {}", e),
        }

        let mut heartbeat = interval_at(Instant::now() + self.settings.interval, self.settings.interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.network.start(move |online| {
            let _ = network_tx.send(online);
        });
        // Pick up a transition that happened before the subscription existed
        let online = self.network.is_online();
        if online != self.online {
            self.on_network_update(online);
        }
        self.publish();

        loop {
            let retry_at = self.drain.retry_deadline();

            tokio::select! {
                _ = &mut stop_rx => break,
                Some(event) = samples_rx.recv() => self.on_sample(event),
                Some(online) = network_rx.recv() => self.on_network_update(online),
                Some(completion) = self.completions_rx.recv() => self.on_completion(completion),
                _ = heartbeat.tick() => self.on_heartbeat(),
                _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => self.on_retry(),
            }

            self.publish();
        }

        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        self.network.stop();
        if let Err(e) = self.provider.stop_updates().await {
            warn!("Failed to stop position updates: {}", e);
        }
        // Pending retry is discarded; in-flight results land on a closed channel
        self.drain = DrainState::Idle;
        self.publish();
        info!("Tracking controller stopped");
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(ControllerSnapshot {
            online: self.online,
            waiting_for_data: self.waiting_for_data,
            draining: self.drain == DrainState::Busy,
            retry_pending: self.drain.retry_deadline().is_some(),
            last_position: self.last_position.clone(),
        });
    }

    fn on_sample(&mut self, event: SampleEvent) {
        match event {
            SampleEvent::Position(position) => {
                info!("Position update received: {}", position);
                self.status.post(status::STATUS_LOCATION_UPDATE);

                self.last_position = Some(position.clone());
                self.last_send_time = Some(Instant::now());

                self.dispatch(position);
            }
            SampleEvent::Error(msg) => {
                warn!("Position error: {}", msg);
                self.status.post(format!("Location error: {}", msg));
            }
        }
    }

    fn on_network_update(&mut self, online: bool) {
        self.status.post(if online {
            status::STATUS_NETWORK_ONLINE
        } else {
            status::STATUS_NETWORK_OFFLINE
        });
        if !self.online && online {
            self.read();
        }
        self.online = online;
    }

    fn on_heartbeat(&mut self) {
        let now = Instant::now();
        debug!(
            "Heartbeat: since last send={:?}, has position={}",
            self.last_send_time.map(|at| now.duration_since(at)),
            self.last_position.is_some()
        );

        if let Err(e) = self.provider.request_single() {
            warn!("Single location request failed: {}", e);
        }

        let due = self
            .last_send_time
            .map_or(true, |at| now.duration_since(at) >= self.settings.interval);
        if !due {
            return;
        }

        let Some(last) = &self.last_position else {
            debug!("No position available yet, waiting for first fix");
            return;
        };

        let resend = last.with_time(self.clock.at(now));
        info!("Resending last position: {}", resend);
        self.last_send_time = Some(now);
        self.dispatch(resend);
    }

    fn on_retry(&mut self) {
        self.drain = DrainState::Idle;
        if self.online {
            self.read();
        } else {
            debug!("Retry skipped while offline");
        }
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Written { success } => {
                if success && self.online && self.waiting_for_data {
                    self.read();
                    self.waiting_for_data = false;
                }
            }
            Completion::ReadFailed => self.retry(),
            Completion::ReadEmpty => {
                self.drain = DrainState::Idle;
                self.waiting_for_data = true;
            }
            Completion::ReadEntry(position) => {
                if position.device_id == self.settings.device_id {
                    self.send(position, SendOrigin::Queue);
                } else {
                    debug!(
                        "Dropping queued position of device {} (configured {})",
                        position.device_id, self.settings.device_id
                    );
                    self.delete(position);
                }
            }
            Completion::Deleted { success } => {
                if success {
                    self.issue_read();
                } else {
                    self.retry();
                }
            }
            Completion::Sent { position, origin, success } => {
                if success {
                    info!("Position delivered: {}", position);
                    if origin == SendOrigin::Queue {
                        self.delete(position);
                    }
                } else {
                    warn!("Position send failed: {}", position);
                    self.status.post(status::STATUS_SEND_FAILED);
                    if origin == SendOrigin::Queue {
                        self.retry();
                    }
                }
            }
        }
    }

    /// Queue or send a fresh position depending on buffering
    fn dispatch(&mut self, position: Position) {
        if self.settings.buffer {
            self.write(position);
        } else {
            self.send(position, SendOrigin::Direct);
        }
    }

    fn write(&mut self, position: Position) {
        debug!("write ({})", position);
        let queue = Arc::clone(&self.queue);
        let done = self.completions_tx.clone();
        tokio::spawn(async move {
            let success = match queue.insert(&position).await {
                Ok(id) => {
                    debug!("Stored position as id {}", id);
                    true
                }
                Err(e) => {
                    warn!("Failed to store position: {}", e);
                    false
                }
            };
            let _ = done.send(Completion::Written { success });
        });
    }

    /// Start a drain unless one is already running
    fn read(&mut self) {
        match self.drain {
            DrainState::Busy => {
                debug!("read joined running drain");
                return;
            }
            DrainState::RetryPending { .. } => debug!("read replaces pending retry"),
            DrainState::Idle => {}
        }
        self.issue_read();
    }

    /// Fetch the oldest queue entry as the next drain step
    fn issue_read(&mut self) {
        debug!("read");
        self.drain = DrainState::Busy;
        let queue = Arc::clone(&self.queue);
        let done = self.completions_tx.clone();
        tokio::spawn(async move {
            let completion = match queue.select_oldest().await {
                Ok(Some(position)) => Completion::ReadEntry(position),
                Ok(None) => Completion::ReadEmpty,
                Err(e) => {
                    warn!("Failed to read queue: {}", e);
                    Completion::ReadFailed
                }
            };
            let _ = done.send(completion);
        });
    }

    fn delete(&mut self, position: Position) {
        debug!("delete ({})", position);
        let Some(id) = position.id else {
            warn!("Queued position without id, skipping: {}", position);
            self.issue_read();
            return;
        };

        let queue = Arc::clone(&self.queue);
        let done = self.completions_tx.clone();
        tokio::spawn(async move {
            let success = match queue.delete(id).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to delete queued position {}: {}", id, e);
                    false
                }
            };
            let _ = done.send(Completion::Deleted { success });
        });
    }

    fn send(&mut self, position: Position, origin: SendOrigin) {
        debug!("send ({})", position);
        let request = format_request(&self.settings.url, &position, None);
        let transport = Arc::clone(&self.transport);
        let done = self.completions_tx.clone();
        tokio::spawn(async move {
            let success = transport.send(request).await;
            let _ = done.send(Completion::Sent {
                position,
                origin,
                success,
            });
        });
    }

    fn retry(&mut self) {
        debug!("retry in {}s", RETRY_DELAY.as_secs());
        self.drain = DrainState::RetryPending {
            at: Instant::now() + RETRY_DELAY,
        };
    }
}
