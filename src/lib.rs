//! # Track Relay Library
//!
//! Store-and-forward delivery of GPS positions to an OsmAnd-protocol HTTP
//! collector.
//!
//! Positions from a serial NMEA receiver are buffered in a durable queue and
//! sent as HTTP GET requests whenever the collector is reachable. Failed
//! deliveries are retried, and the last known position is resent on a fixed
//! interval so the collector keeps seeing the device.

pub mod config;
pub mod controller;
pub mod error;
pub mod gps;
pub mod logging;
pub mod network;
pub mod position;
pub mod protocol;
pub mod queue;
pub mod status;
pub mod transport;
