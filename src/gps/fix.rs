//! # NMEA Fix Assembly
//!
//! Combines NMEA sentences into [`Position`] samples.
//!
//! - GGA carries altitude and HDOP; both are cached for the next RMC
//! - RMC carries time, coordinates, speed (knots) and true course; every
//!   valid RMC yields one position
//!
//! Everything else is ignored.

use chrono::{TimeZone, Utc};
use nmea::sentences::rmc::RmcStatusOfFix;
use nmea::ParseResult;
use tracing::trace;

use crate::position::Position;

/// Nominal user equivalent range error (meters) used to turn HDOP into an
/// accuracy estimate
pub const NOMINAL_UERE_M: f64 = 5.0;

/// Stateful NMEA sentence to position converter
#[derive(Debug, Clone)]
pub struct FixAssembler {
    device_id: String,
    altitude: f64,
    accuracy: f64,
}

impl FixAssembler {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            altitude: 0.0,
            accuracy: 0.0,
        }
    }

    /// Feed one NMEA sentence
    ///
    /// # Returns
    ///
    /// * `Option<Position>` - A position when the sentence is a valid RMC fix
    ///
    /// # Examples
    ///
    /// ```
    /// use track_relay::gps::FixAssembler;
    ///
    /// let mut assembler = FixAssembler::new("PHONE001");
    /// let fix = assembler
    ///     .feed("$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A")
    ///     .unwrap();
    /// assert_eq!(fix.device_id, "PHONE001");
    /// assert!((fix.latitude - 48.1173).abs() < 1e-4);
    /// ```
    pub fn feed(&mut self, sentence: &str) -> Option<Position> {
        let parsed = match nmea::parse_str(sentence.trim()) {
            Ok(parsed) => parsed,
            Err(e) => {
                trace!("Ignoring NMEA sentence {:?}: {:?}", sentence, e);
                return None;
            }
        };

        match parsed {
            ParseResult::GGA(gga) => {
                self.altitude = gga.altitude.map(decimal).unwrap_or(0.0);
                self.accuracy = gga
                    .hdop
                    .map(|hdop| decimal(hdop) * NOMINAL_UERE_M)
                    .unwrap_or(0.0);
                None
            }
            ParseResult::RMC(rmc) => {
                if rmc.status_of_fix == RmcStatusOfFix::Invalid {
                    trace!("RMC without fix");
                    return None;
                }
                let (latitude, longitude) = (rmc.lat?, rmc.lon?);

                let time = match (rmc.fix_date, rmc.fix_time) {
                    (Some(date), Some(time)) => Utc.from_utc_datetime(&date.and_time(time)),
                    _ => Utc::now(),
                };

                Some(
                    Position::new(self.device_id.clone(), time, latitude, longitude)
                        .with_speed(rmc.speed_over_ground.map(decimal).unwrap_or(0.0))
                        .with_course(rmc.true_course.map(decimal).unwrap_or(0.0))
                        .with_altitude(self.altitude)
                        .with_accuracy(self.accuracy),
                )
            }
            _ => None,
        }
    }
}

/// Widen a parsed NMEA field to `f64` keeping the digits the receiver sent
///
/// `f64::from(22.4f32)` is `22.399999618530273`; going through the shortest
/// `f32` text gives `22.4`.
fn decimal(value: f32) -> f64 {
    value.to_string().parse().unwrap_or(f64::from(value))
}
