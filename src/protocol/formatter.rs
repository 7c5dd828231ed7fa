//! # Request Formatter
//!
//! Turns a [`Position`] into the request target sent to the collector:
//!
//! ```text
//! http://host:5055/?id=PHONE001&lat=37.421998&lon=-122.084&speed=0.0&bearing=0.0
//! ```
//!
//! The collector's decoder requires the path to be exactly `/` in front of
//! the query string (`host:5055/?id=...`, never `host:5055?id=...`).

use reqwest::Url;
use tracing::{debug, warn};

use super::*;
use crate::position::Position;

/// Throwaway base used to percent-encode query pairs when the endpoint
/// itself cannot be parsed
const QUERY_ENCODING_BASE: &str = "http://localhost/";

/// Format the HTTP GET request target for a position
///
/// # Arguments
///
/// * `url` - Collector endpoint, e.g. `http://host:5055`
/// * `position` - Position to report
/// * `alarm` - Optional alarm name (e.g. `"sos"`)
///
/// # Returns
///
/// * `String` - Complete request target
///
/// Formatting never fails. An endpoint that cannot be parsed is used as-is
/// and the request simply fails later in the transport.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use track_relay::position::Position;
/// use track_relay::protocol::formatter::format_request;
///
/// let position = Position::new("PHONE001", Utc::now(), 37.421998, -122.084);
/// let request = format_request("http://host:5055", &position, None);
/// assert_eq!(
///     request,
///     "http://host:5055/?id=PHONE001&lat=37.421998&lon=-122.084&speed=0.0&bearing=0.0"
/// );
/// ```
pub fn format_request(url: &str, position: &Position, alarm: Option<&str>) -> String {
    let query = encode_query(&query_params(position, alarm));

    let request = match Url::parse(url) {
        Ok(mut server) => {
            if server.path().is_empty() {
                server.set_path("/");
            }
            server.set_fragment(None);
            // Appended as text: `set_query` would re-escape `'` for http URLs
            let separator = match server.query() {
                Some("") => "",
                Some(_) => "&",
                None => "?",
            };
            format!("{}{}{}", server, separator, query)
        }
        Err(e) => {
            warn!("Collector URL {:?} is not a valid URL ({}), using it verbatim", url, e);
            format!("{}?{}", url, query)
        }
    };

    ensure_root_slash(request)
}

/// Collect query parameters in wire order
fn query_params(position: &Position, alarm: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        (PARAM_ID, position.device_id.clone()),
        (PARAM_LATITUDE, format_number(position.latitude)),
        (PARAM_LONGITUDE, format_number(position.longitude)),
        (PARAM_SPEED, format_number(position.speed)),
        (PARAM_BEARING, format_number(position.course)),
    ];

    if position.altitude != 0.0 {
        params.push((PARAM_ALTITUDE, format_number(position.altitude)));
    }
    if position.accuracy != 0.0 {
        params.push((PARAM_ACCURACY, format_number(position.accuracy)));
    }
    if position.battery != 0.0 {
        params.push((PARAM_BATTERY, format_number(position.battery)));
    }
    if let Some(alarm) = alarm {
        params.push((PARAM_ALARM, alarm.to_string()));
    }

    params
}

/// Percent-encode query pairs as URI components
///
/// Form encoding is adjusted to the URI-component form the collector's
/// reference clients send: space is `%20` and `~ ! ' ( )` stay literal.
/// A literal `+` or `%` in a value is already escaped by then, so the
/// rewrite only touches bytes the encoder produced.
fn encode_query(params: &[(&'static str, String)]) -> String {
    let Ok(mut scratch) = Url::parse(QUERY_ENCODING_BASE) else {
        return String::new();
    };
    {
        let mut query = scratch.query_pairs_mut();
        for (name, value) in params {
            query.append_pair(name, value);
        }
    }

    let form = scratch.query().unwrap_or_default();
    let mut encoded = String::with_capacity(form.len());
    let mut rest = form;
    while let Some(c) = rest.chars().next() {
        if c == '+' {
            encoded.push_str("%20");
            rest = &rest[1..];
            continue;
        }
        if c == '%' && rest.len() >= 3 {
            let literal = match &rest[1..3] {
                "7E" => Some('~'),
                "21" => Some('!'),
                "27" => Some('\''),
                "28" => Some('('),
                "29" => Some(')'),
                _ => None,
            };
            if let Some(literal) = literal {
                encoded.push(literal);
                rest = &rest[3..];
                continue;
            }
        }
        encoded.push(c);
        rest = &rest[c.len_utf8()..];
    }
    encoded
}

/// Format a decimal in plain notation, always with a fractional part
///
/// `0.0` becomes `"0.0"` and `37.421998` stays `"37.421998"`. Rust's `Display`
/// for `f64` never switches to scientific notation and prints the shortest
/// representation that round-trips, so no precision is lost.
pub fn format_number(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}

/// Make sure the query string is preceded by `/`
///
/// URL builders keep the caller's path untouched, so `http://host/path` would
/// otherwise produce `path?id=...`.
fn ensure_root_slash(request: String) -> String {
    let Some(query_start) = request.find('?') else {
        return request;
    };
    if request.contains("/?") {
        return request;
    }

    let mut fixed = String::with_capacity(request.len() + 1);
    fixed.push_str(&request[..query_start]);
    fixed.push('/');
    fixed.push_str(&request[query_start..]);
    debug!("Inserted missing '/' before query string: {}", fixed);
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn position(device_id: &str, latitude: f64, longitude: f64) -> Position {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Position::new(device_id, time, latitude, longitude)
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_format_request_exact() {
        let request = format_request("http://host:5055", &position("PHONE001", 37.421998, -122.084), None);
        assert_eq!(
            request,
            "http://host:5055/?id=PHONE001&lat=37.421998&lon=-122.084&speed=0.0&bearing=0.0"
        );
    }

    #[test]
    fn test_format_request_keeps_existing_root_path() {
        let request = format_request("http://localhost:5055/", &position("test-device", 40.7128, -74.006), None);
        assert!(request.starts_with("http://localhost:5055/?id=test-device&"));
        assert_eq!(count(&request, "/?"), 1);
    }

    #[test]
    fn test_format_request_never_bare_question_mark() {
        for url in ["http://host:5055", "http://host:5055/", "http://host", "http://10.0.0.1:8082/osmand"] {
            let request = format_request(url, &position("dev", 1.5, 2.5), None);
            let query_start = request.find('?').unwrap();
            assert_eq!(&request[query_start - 1..query_start], "/", "bad request for {}: {}", url, request);
        }
    }

    #[test]
    fn test_format_request_repairs_custom_path() {
        let request = format_request("http://host:5055/osmand", &position("dev", 1.0, 2.0), None);
        assert!(request.starts_with("http://host:5055/osmand/?id=dev"), "{}", request);
    }

    #[test]
    fn test_format_request_required_fields_once() {
        let request = format_request("http://host:5055", &position("dev", -33.8688, 151.2093), None);
        for field in ["id=", "lat=", "lon=", "speed=", "bearing="] {
            assert_eq!(count(&request, &format!("?{}", field)) + count(&request, &format!("&{}", field)), 1, "{}", field);
        }
    }

    #[test]
    fn test_format_request_omits_zero_optionals() {
        let request = format_request("http://host:5055", &position("dev", 1.0, 2.0), None);
        assert!(!request.contains("altitude="));
        assert!(!request.contains("accuracy="));
        assert!(!request.contains("batt="));
        assert!(!request.contains("alarm="));
    }

    #[test]
    fn test_format_request_includes_non_zero_optionals() {
        let full = position("dev", 1.0, 2.0)
            .with_speed(12.5)
            .with_course(270.0)
            .with_altitude(-12.0)
            .with_accuracy(4.5)
            .with_battery(87.0);
        let request = format_request("http://host:5055", &full, None);
        assert!(request.ends_with(
            "/?id=dev&lat=1.0&lon=2.0&speed=12.5&bearing=270.0&altitude=-12.0&accuracy=4.5&batt=87.0"
        ), "{}", request);
    }

    #[test]
    fn test_format_alarm_request() {
        let request = format_request("http://localhost:5055", &position("123456789012345", 0.0, 0.0), Some("sos"));
        assert!(request.contains("id=123456789012345"));
        assert!(request.contains("lat=0.0"));
        assert!(request.contains("lon=0.0"));
        assert!(request.ends_with("&alarm=sos"));
        assert!(request.contains("/?"));
    }

    #[test]
    fn test_format_request_encodes_device_id() {
        let request = format_request("http://host:5055", &position("my phone&co", 1.0, 2.0), None);
        assert!(request.contains("id=my%20phone%26co&"), "{}", request);
    }

    #[test]
    fn test_format_request_uri_component_escaping() {
        let request = format_request("http://host:5055", &position("a~b!c'd(e)f*g_h-i.j", 1.0, 2.0), None);
        assert!(request.contains("?id=a~b!c'd(e)f*g_h-i.j&"), "{}", request);

        let request = format_request("http://host:5055", &position("1+1=2 %7E", 1.0, 2.0), None);
        assert!(request.contains("?id=1%2B1%3D2%20%257E&"), "{}", request);
    }

    #[test]
    fn test_format_request_keeps_existing_query() {
        let request = format_request("http://host:5055/?key=abc", &position("dev", 1.0, 2.0), None);
        assert!(request.starts_with("http://host:5055/?key=abc&id=dev&lat=1.0"), "{}", request);
    }

    #[test]
    fn test_format_request_unparseable_endpoint() {
        let request = format_request("not a url", &position("dev", 1.0, 2.0), None);
        assert!(request.starts_with("not a url/?id=dev&lat=1.0"), "{}", request);
    }

    #[test]
    fn test_format_number_plain_decimal() {
        assert_eq!(format_number(0.0), "0.0");
        assert_eq!(format_number(37.421998), "37.421998");
        assert_eq!(format_number(-122.084), "-122.084");
        assert_eq!(format_number(100.0), "100.0");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(1e21), "1000000000000000000000.0");
    }

    #[test]
    fn test_ensure_root_slash() {
        assert_eq!(ensure_root_slash("http://h:1?a=b".to_string()), "http://h:1/?a=b");
        assert_eq!(ensure_root_slash("http://h:1/?a=b".to_string()), "http://h:1/?a=b");
        assert_eq!(ensure_root_slash("http://h:1/".to_string()), "http://h:1/");
    }
}
