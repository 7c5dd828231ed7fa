//! # Collector Protocol Module
//!
//! Implementation of the OsmAnd-style HTTP GET protocol spoken by the
//! position collector.
//!
//! This module handles:
//! - Building the request target for a position
//! - Numeric formatting of query values
//! - Repairing the mandatory `/` before the query string

pub mod formatter;

/// Device identifier query parameter
pub const PARAM_ID: &str = "id";

/// Latitude query parameter (degrees)
pub const PARAM_LATITUDE: &str = "lat";

/// Longitude query parameter (degrees)
pub const PARAM_LONGITUDE: &str = "lon";

/// Speed query parameter (knots)
pub const PARAM_SPEED: &str = "speed";

/// Course query parameter (degrees)
pub const PARAM_BEARING: &str = "bearing";

/// Altitude query parameter (meters), omitted when zero
pub const PARAM_ALTITUDE: &str = "altitude";

/// Horizontal accuracy query parameter, omitted when zero
pub const PARAM_ACCURACY: &str = "accuracy";

/// Battery level query parameter (percent), omitted when zero
pub const PARAM_BATTERY: &str = "batt";

/// Alarm query parameter, only present when an alarm is raised
pub const PARAM_ALARM: &str = "alarm";
