//! # HTTP Transport Module
//!
//! Delivers formatted position requests to the collector.
//!
//! This module handles:
//! - Issuing HTTP GET requests with a fixed 15 second timeout
//! - Classifying the outcome as success (2xx) or failure
//! - Swallowing every transport-level error into a failed send
//! - Running the blocking client off the async runtime (see [`client_trait`])
//!
//! Retries are not done here; the tracking controller owns retry policy.

pub mod client_trait;

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};

pub use client_trait::{AsyncTransport, BlockingAdapter};

/// Connect and read timeout for a single request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// User-Agent sent with every request
const USER_AGENT: &str = concat!("track-relay/", env!("CARGO_PKG_VERSION"));

/// Synchronous request executor
///
/// The boolean result is the whole contract: implementations never panic or
/// return errors for transport problems.
pub trait Transport: Send + Sync {
    /// Send a GET request, returning `true` iff the collector answered 2xx
    fn send(&self, request: &str) -> bool;
}

/// Blocking HTTP client for the collector
///
/// Must not be used directly from an async task; wrap it in a
/// [`BlockingAdapter`] instead.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &REQUEST_TIMEOUT)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport with the standard 15 second timeout
    ///
    /// # Errors
    ///
    /// Returns `Transport` error if the HTTP client cannot be built
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use track_relay::transport::{HttpTransport, Transport};
    ///
    /// let transport = HttpTransport::new()?;
    /// let delivered = transport.send("http://localhost:5055/?id=dev&lat=0.0&lon=0.0&speed=0.0&bearing=0.0");
    /// println!("delivered: {}", delivered);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new() -> Result<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Create a transport with a custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RelayError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &str) -> bool {
        info!("Sending HTTP GET {}", request);

        let response = match self.client.get(request).send() {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    url = request,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    is_builder = e.is_builder(),
                    "HTTP request failed"
                );
                return false;
            }
        };

        let status = response.status();

        // Reading the body to the end consumes the response and hands the
        // connection back on every path.
        let body = response
            .text()
            .unwrap_or_else(|e| format!("<unreadable body: {}>", e));

        if status.is_success() {
            debug!(status = status.as_u16(), body = %body, "Request delivered");
            true
        } else {
            warn!(status = status.as_u16(), body = %body, "Collector rejected request");
            false
        }
    }
}
