//! # Status Messages
//!
//! Short user-facing status lines ("Network offline", "Send failed", ...)
//! kept in a small ring buffer for display, and mirrored to the log.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Number of messages retained
pub const STATUS_CAPACITY: usize = 20;

pub const STATUS_LOCATION_UPDATE: &str = "Location update";
pub const STATUS_NETWORK_ONLINE: &str = "Network online";
pub const STATUS_NETWORK_OFFLINE: &str = "Network offline";
pub const STATUS_SEND_FAILED: &str = "Send failed";

/// A timestamped status line
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub time: DateTime<Utc>,
    pub text: String,
}

/// Shared handle to the status ring
#[derive(Debug, Clone, Default)]
pub struct StatusLog {
    messages: Arc<Mutex<VecDeque<StatusMessage>>>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message, evicting the oldest one when full
    pub fn post(&self, text: impl Into<String>) {
        let text = text.into();
        info!(status = %text, "Status");

        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };
        if messages.len() == STATUS_CAPACITY {
            messages.pop_front();
        }
        messages.push_back(StatusMessage {
            time: Utc::now(),
            text,
        });
    }

    /// Snapshot, oldest first
    pub fn messages(&self) -> Vec<StatusMessage> {
        match self.messages.lock() {
            Ok(messages) => messages.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// Message texts only, oldest first
    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.text).collect()
    }
}
