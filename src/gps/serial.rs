//! # Serial GPS Provider
//!
//! [`PositionProvider`] backed by an NMEA receiver on a serial port.
//!
//! Receivers typically report at 1Hz. Fixes are forwarded at most once per
//! tracking interval; [`request_single`](PositionProvider::request_single)
//! lets the next valid fix through regardless.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::fix::FixAssembler;
use super::port_trait::{NmeaSource, TokioSerialSource};
use super::{PositionProvider, SampleEvent, SampleSender};
use crate::error::{RelayError, Result};

/// Serial NMEA position provider
pub struct SerialGpsProvider {
    port: String,
    baud_rate: u32,
    device_id: String,
    interval: Duration,
    single_requested: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SerialGpsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialGpsProvider")
            .field("port", &self.port)
            .field("baud_rate", &self.baud_rate)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl SerialGpsProvider {
    /// Create a provider; the port is opened by `start_updates`
    ///
    /// # Arguments
    ///
    /// * `port` - Serial device path (e.g., "/dev/ttyACM0")
    /// * `baud_rate` - Receiver baud rate
    /// * `device_id` - Device identifier stamped on every position
    /// * `interval` - Minimum spacing between forwarded fixes
    pub fn new(port: impl Into<String>, baud_rate: u32, device_id: impl Into<String>, interval: Duration) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            device_id: device_id.into(),
            interval,
            single_requested: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.reader.as_ref().is_some_and(|reader| !reader.is_finished())
    }

    /// Start reading from an already opened source
    pub fn start_with_source<S>(&mut self, source: S, sink: SampleSender)
    where
        S: NmeaSource + 'static,
    {
        self.stop_reader();
        self.reader = Some(tokio::spawn(read_fixes(
            source,
            FixAssembler::new(self.device_id.clone()),
            sink,
            self.interval,
            Arc::clone(&self.single_requested),
        )));
    }

    fn stop_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl Drop for SerialGpsProvider {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

#[async_trait]
impl PositionProvider for SerialGpsProvider {
    async fn start_updates(&mut self, sink: SampleSender) -> Result<()> {
        let source = TokioSerialSource::open(&self.port, self.baud_rate)?;
        info!("Reading NMEA from {} at {} baud", self.port, self.baud_rate);
        self.start_with_source(source, sink);
        Ok(())
    }

    async fn stop_updates(&mut self) -> Result<()> {
        self.stop_reader();
        debug!("GPS updates stopped");
        Ok(())
    }

    fn request_single(&mut self) -> Result<()> {
        if !self.is_running() {
            return Err(RelayError::Gps("GPS updates are not running".to_string()));
        }
        self.single_requested.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Reader task: parse sentences and forward throttled fixes
async fn read_fixes<S: NmeaSource>(
    mut source: S,
    mut assembler: FixAssembler,
    sink: SampleSender,
    interval: Duration,
    single_requested: Arc<AtomicBool>,
) {
    let mut last_forwarded: Option<Instant> = None;

    loop {
        let sentence = match source.next_sentence().await {
            Ok(Some(sentence)) => sentence,
            Ok(None) => {
                warn!("GPS stream ended");
                let _ = sink.send(SampleEvent::Error("GPS stream ended".to_string()));
                break;
            }
            Err(e) => {
                warn!("GPS read failed: {}", e);
                let _ = sink.send(SampleEvent::Error(format!("GPS read failed: {}", e)));
                break;
            }
        };

        let Some(position) = assembler.feed(&sentence) else {
            continue;
        };

        let forced = single_requested.swap(false, Ordering::SeqCst);
        let due = last_forwarded.map_or(true, |at| at.elapsed() >= interval);
        if !(forced || due) {
            continue;
        }

        last_forwarded = Some(Instant::now());
        if sink.send(SampleEvent::Position(position)).is_err() {
            debug!("Sample receiver gone, stopping GPS reader");
            break;
        }
    }
}
