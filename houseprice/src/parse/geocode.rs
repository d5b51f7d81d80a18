//! Geocoding API response parsing.

use serde_json::Value;
use tracing::warn;

use crate::errors::ParseError;
use crate::models::{AddressRecord, DEFAULT_LEVEL};

/// An address prepared for the geocoding API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAddress {
    /// Address reported in the output row, with `#` replaced by `&`.
    pub display: String,
    /// Text actually sent to the geocoder: everything before the first `&`.
    pub query: String,
}

/// Prepares a raw address for the geocoder.
///
/// A `#` cannot travel in a query value unescaped and the API treats the
/// text after it as noise, so it becomes `&` in the reported address and
/// the geocoder only sees the part before it.
#[must_use]
pub fn normalize_address(raw: &str) -> NormalizedAddress {
    let display = raw.replace('#', "&");
    if raw.contains('#') {
        warn!(address = %raw, "Address contains '#', geocoding the leading part only");
    }
    let query = display
        .split('&')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    NormalizedAddress { display, query }
}

/// Parses a geocoding response into an address record.
///
/// A non-zero `status` is reported as `ParseError::ApplicationStatus`, which
/// callers retry. Missing optional scalars fall back to record defaults.
pub fn parse_geocode(address: &str, body: &str) -> Result<AddressRecord, ParseError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let status = value
        .get("status")
        .and_then(status_code)
        .ok_or_else(|| ParseError::MissingField("status".to_string()))?;
    if status != 0 {
        return Err(ParseError::ApplicationStatus(status));
    }

    let result = value
        .get("result")
        .filter(|v| v.is_object())
        .ok_or_else(|| ParseError::MissingField("result".to_string()))?;
    let location = result
        .get("location")
        .ok_or_else(|| ParseError::MissingField("result.location".to_string()))?;

    let coordinate = |key: &str| {
        location
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| ParseError::MissingField(format!("result.location.{key}")))
    };
    let integer = |key: &str| result.get(key).and_then(Value::as_i64).unwrap_or(0);

    Ok(AddressRecord {
        address: address.to_string(),
        lng: coordinate("lng")?,
        lat: coordinate("lat")?,
        precise: integer("precise"),
        confidence: integer("confidence"),
        comprehension: integer("comprehension"),
        level: result
            .get("level")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_LEVEL)
            .to_string(),
    })
}

// Some gateways send the status as a string.
fn status_code(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_success() {
        let record = parse_geocode("北京市海淀区上地十街10号", &fixtures::geocode_ok(116.3084, 40.0569)).unwrap();
        assert_eq!(record.address, "北京市海淀区上地十街10号");
        assert!((record.lng - 116.3084).abs() < 1e-9);
        assert!((record.lat - 40.0569).abs() < 1e-9);
        assert_eq!(record.precise, 1);
        assert_eq!(record.confidence, 80);
        assert_eq!(record.comprehension, 100);
        assert_eq!(record.level, "门址");
    }

    #[test]
    fn test_non_zero_status() {
        let err = parse_geocode("x", r#"{"status": 302, "message": "quota"}"#).unwrap_err();
        assert_eq!(err, ParseError::ApplicationStatus(302));
        assert!(err.is_retryable());

        let err = parse_geocode("x", r#"{"status": "1"}"#).unwrap_err();
        assert_eq!(err, ParseError::ApplicationStatus(1));
    }

    #[test]
    fn test_missing_result_is_terminal() {
        let err = parse_geocode("x", r#"{"status": 0}"#).unwrap_err();
        assert_eq!(err, ParseError::MissingField("result".to_string()));
        assert!(!err.is_retryable());

        let err = parse_geocode("x", r#"{"status": 0, "result": {"location": {"lng": 1.0}}}"#)
            .unwrap_err();
        assert_eq!(err, ParseError::MissingField("result.location.lat".to_string()));
    }

    #[test]
    fn test_missing_scalars_default() {
        let record = parse_geocode(
            "x",
            r#"{"status": 0, "result": {"location": {"lng": 1.0, "lat": 2.0}}}"#,
        )
        .unwrap();
        assert_eq!(record.precise, 0);
        assert_eq!(record.confidence, 0);
        assert_eq!(record.level, "无");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            parse_geocode("x", "<html>busy</html>"),
            Err(ParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_normalize_address() {
        let normalized = normalize_address("幸福小区#3栋");
        assert_eq!(normalized.display, "幸福小区&3栋");
        assert_eq!(normalized.query, "幸福小区");

        let plain = normalize_address(" 人民路1号 ");
        assert_eq!(plain.display, " 人民路1号 ");
        assert_eq!(plain.query, "人民路1号");
    }
}
