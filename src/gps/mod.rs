//! # GPS Module
//!
//! Position sampling from an NMEA receiver.
//!
//! This module handles:
//! - The [`PositionProvider`] contract consumed by the tracking controller
//! - Reading NMEA sentences from a serial GPS receiver
//! - Assembling GGA/RMC sentences into [`Position`] samples
//! - Throttling fixes to the tracking interval, with on-demand single fixes

pub mod fix;
pub mod port_trait;
pub mod serial;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::position::Position;

pub use fix::FixAssembler;
pub use serial::SerialGpsProvider;

/// Output of a position provider
#[derive(Debug, Clone, PartialEq)]
pub enum SampleEvent {
    /// A new fix
    Position(Position),
    /// The provider hit a problem; updates may have stopped
    Error(String),
}

/// Channel on which a provider delivers samples
pub type SampleSender = mpsc::UnboundedSender<SampleEvent>;

/// Source of location samples
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PositionProvider: Send {
    /// Begin delivering samples to `sink`
    ///
    /// # Errors
    ///
    /// `Permission` if access to the receiver is refused, `Gps` for other
    /// failures.
    async fn start_updates(&mut self, sink: SampleSender) -> Result<()>;

    /// Stop delivering samples
    async fn stop_updates(&mut self) -> Result<()>;

    /// Ask for one fix as soon as possible, bypassing the update throttle
    fn request_single(&mut self) -> Result<()>;
}
