//! # Position Sample
//!
//! A single location fix as produced by the GPS receiver and stored in the
//! position queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable location sample
///
/// `id` is assigned by the position queue when the sample is persisted and is
/// the only handle used to delete it again. Positions that are sent directly
/// never carry an id.
///
/// Optional measurements (`altitude`, `accuracy`, `battery`) use `0.0` to mean
/// "not available".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub device_id: String,
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub course: f64,
    #[serde(default)]
    pub altitude: f64,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub battery: f64,
}

impl Position {
    /// Create a position with all optional measurements absent
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use track_relay::position::Position;
    ///
    /// let position = Position::new("PHONE001", Utc::now(), 37.421998, -122.084)
    ///     .with_speed(12.5)
    ///     .with_course(270.0);
    /// assert_eq!(position.id, None);
    /// assert_eq!(position.altitude, 0.0);
    /// ```
    pub fn new(device_id: impl Into<String>, time: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: None,
            device_id: device_id.into(),
            time,
            latitude,
            longitude,
            speed: 0.0,
            course: 0.0,
            altitude: 0.0,
            accuracy: 0.0,
            battery: 0.0,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_course(mut self, course: f64) -> Self {
        self.course = course;
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = altitude;
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn with_battery(mut self, battery: f64) -> Self {
        self.battery = battery;
        self
    }

    /// Copy of this position carrying the queue-assigned id
    pub fn with_id(&self, id: u64) -> Self {
        Self {
            id: Some(id),
            ..self.clone()
        }
    }

    /// Copy of this position re-stamped at `time`
    ///
    /// Used by the heartbeat to resend the last known location. The copy does
    /// not inherit the queue id, since it is a new sample as far as the queue
    /// is concerned.
    pub fn with_time(&self, time: DateTime<Utc>) -> Self {
        Self {
            id: None,
            time,
            ..self.clone()
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = match self.id {
            Some(id) => id.to_string(),
            None => "-".to_string(),
        };
        write!(
            f,
            "id:{} time:{} lat:{} lon:{}",
            id,
            self.time.timestamp(),
            self.latitude,
            self.longitude
        )
    }
}
