//! Trait abstraction for the NMEA input stream to enable testing

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_serial::SerialPortBuilderExt;

use crate::error::{RelayError, Result};

/// Line-oriented NMEA input
#[async_trait]
pub trait NmeaSource: Send {
    /// Next sentence without its line ending, or `None` at end of stream
    async fn next_sentence(&mut self) -> io::Result<Option<String>>;
}

/// NMEA receiver attached to a serial port
pub struct TokioSerialSource {
    reader: BufReader<tokio_serial::SerialStream>,
}

impl TokioSerialSource {
    /// Open a serial GPS receiver (8N1, no flow control)
    ///
    /// # Errors
    ///
    /// - `Permission`: the process may not open the device
    /// - `Gps`: the device does not exist or cannot be configured
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| match e.kind {
                tokio_serial::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                    RelayError::Permission(format!("Cannot open {}: {}", path, e))
                }
                _ => RelayError::Gps(format!("Failed to open {}: {}", path, e)),
            })?;

        Ok(Self {
            reader: BufReader::new(port),
        })
    }
}

#[async_trait]
impl NmeaSource for TokioSerialSource {
    async fn next_sentence(&mut self) -> io::Result<Option<String>> {
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(None);
        }
        // Receivers emit line noise on power-up; keep it as replacement chars
        // and let the NMEA checksum reject it.
        Ok(Some(String::from_utf8_lossy(&line).trim_end().to_string()))
    }
}
