//! Sample validation
//!
//! Turns an untyped JSON payload into a [`ValidatedSample`]. Nothing past
//! this boundary sees a raw `serde_json` map except the metadata field,
//! which is free-form by contract.
//!
//! Checks run in a fixed order and the first failing step wins:
//!
//! 1. required fields present (all missing names reported together)
//! 2. `event_id` non-empty after trimming, at most 64 characters
//! 3. request/error counts are non-negative integers, errors ≤ requests
//! 4. cpu/memory/uptime percentages within `[0, 100]`
//! 5. latencies non-negative
//! 6. `captured_at` parses as a date-time (naive values are UTC)
//! 7. `meta` is an object when present

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::{Result, TelemetryError};
use crate::model::Metadata;

/// Fields every payload must carry, in reporting order
pub const REQUIRED_FIELDS: [&str; 8] = [
    "event_id",
    "request_count",
    "error_count",
    "avg_latency_ms",
    "p95_latency_ms",
    "cpu_percent",
    "memory_percent",
    "uptime_percent",
];

/// Longest accepted event identifier
pub const MAX_EVENT_ID_LEN: usize = 64;

/// Offset-carrying layouts tried after RFC 3339
///
/// `%#z` takes `+02:00`, `+0200` and `+02`. A trailing `Z` is rewritten to
/// `+00:00` before these run.
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y-%m-%d %H:%M%#z",
];

/// Layouts without an offset; interpreted as UTC
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A payload that passed every check
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSample {
    pub event_id: String,
    pub captured_at: DateTime<Utc>,
    pub request_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub uptime_percent: f64,
    pub meta: Metadata,
}

/// Validator for inbound sample payloads
#[derive(Debug, Clone)]
pub struct SampleValidator {
    max_event_id_len: usize,
}

impl Default for SampleValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleValidator {
    pub fn new() -> Self {
        Self {
            max_event_id_len: MAX_EVENT_ID_LEN,
        }
    }

    /// Validate a payload; `now` fills in a missing capture time
    pub fn validate(&self, payload: &Map<String, Value>, now: DateTime<Utc>) -> Result<ValidatedSample> {
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| !payload.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            return Err(TelemetryError::validation(format!(
                "Missing fields: {}",
                missing.join(", ")
            )));
        }

        let event_id = self.event_id(&payload["event_id"])?;

        let request_count = coerce_integer("request_count", &payload["request_count"])?;
        let error_count = coerce_integer("error_count", &payload["error_count"])?;
        if request_count < 0 || error_count < 0 {
            return Err(TelemetryError::validation(
                "request_count and error_count must be >= 0",
            ));
        }
        if error_count > request_count {
            return Err(TelemetryError::validation(
                "error_count cannot exceed request_count",
            ));
        }

        let cpu_percent = coerce_percent("cpu_percent", &payload["cpu_percent"])?;
        let memory_percent = coerce_percent("memory_percent", &payload["memory_percent"])?;
        let uptime_percent = coerce_percent("uptime_percent", &payload["uptime_percent"])?;

        let avg_latency_ms = coerce_real("avg_latency_ms", &payload["avg_latency_ms"])?;
        let p95_latency_ms = coerce_real("p95_latency_ms", &payload["p95_latency_ms"])?;
        if avg_latency_ms < 0.0 || p95_latency_ms < 0.0 {
            return Err(TelemetryError::validation("latency values must be >= 0"));
        }

        let captured_at = match payload.get("captured_at") {
            None | Some(Value::Null) => now,
            Some(Value::String(raw)) if raw.is_empty() => now,
            Some(Value::String(raw)) => parse_captured_at(raw).ok_or_else(|| {
                TelemetryError::validation("captured_at must be ISO-8601 datetime")
            })?,
            Some(_) => {
                return Err(TelemetryError::validation(
                    "captured_at must be ISO-8601 datetime",
                ))
            }
        };

        let meta = match payload.get("meta") {
            None | Some(Value::Null) => Metadata::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(TelemetryError::validation("meta must be an object")),
        };

        Ok(ValidatedSample {
            event_id,
            captured_at,
            // Both are non-negative here, so the casts are lossless.
            request_count: request_count as u64,
            error_count: error_count as u64,
            avg_latency_ms,
            p95_latency_ms,
            cpu_percent,
            memory_percent,
            uptime_percent,
            meta,
        })
    }

    fn event_id(&self, value: &Value) -> Result<String> {
        let raw = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return Err(TelemetryError::validation("event_id must be a string")),
        };
        if raw.is_empty() {
            return Err(TelemetryError::validation("event_id cannot be empty"));
        }
        if raw.chars().count() > self.max_event_id_len {
            return Err(TelemetryError::validation(format!(
                "event_id cannot exceed {} characters",
                self.max_event_id_len
            )));
        }
        Ok(raw)
    }
}

/// Integers may arrive as JSON numbers (integral floats included) or numeric strings
fn coerce_integer(field: &str, value: &Value) -> Result<i64> {
    let invalid = || TelemetryError::validation(format!("{} must be an integer", field));
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(f as i64)
                }
                _ => Err(invalid()),
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn coerce_real(field: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|f| f.is_finite())
        .ok_or_else(|| TelemetryError::validation(format!("{} must be a number", field)))
}

fn coerce_percent(field: &str, value: &Value) -> Result<f64> {
    let v = coerce_real(field, value)?;
    if !(0.0..=100.0).contains(&v) {
        return Err(TelemetryError::validation(format!(
            "{} must be between 0 and 100",
            field
        )));
    }
    Ok(v)
}

/// Parse an ISO-8601 date-time; values without an offset are taken as UTC
pub fn parse_captured_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let zoned = match raw.strip_suffix(|c: char| c.eq_ignore_ascii_case(&'Z')) {
        Some(rest) => format!("{}+00:00", rest),
        None => raw.to_string(),
    };
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&zoned, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    fn valid_payload() -> Map<String, Value> {
        payload(json!({
            "event_id": "evt-001",
            "request_count": 1000,
            "error_count": 5,
            "avg_latency_ms": 120.5,
            "p95_latency_ms": 340.0,
            "cpu_percent": 42.0,
            "memory_percent": 63.5,
            "uptime_percent": 99.95,
            "captured_at": "2024-05-01T12:00:00Z",
            "meta": {"region": "eu-west-1"}
        }))
    }

    fn validation_message(result: Result<ValidatedSample>) -> String {
        match result {
            Err(TelemetryError::ValidationFailed(msg)) => msg,
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_payload() {
        let sample = SampleValidator::new()
            .validate(&valid_payload(), Utc::now())
            .unwrap();
        assert_eq!(sample.event_id, "evt-001");
        assert_eq!(sample.request_count, 1000);
        assert_eq!(sample.error_count, 5);
        assert_eq!(sample.uptime_percent, 99.95);
        assert_eq!(sample.captured_at, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        assert_eq!(sample.meta["region"], json!("eu-west-1"));
    }

    #[test]
    fn test_missing_fields_listed_together() {
        let mut p = valid_payload();
        p.remove("error_count");
        p.remove("uptime_percent");
        let msg = validation_message(SampleValidator::new().validate(&p, Utc::now()));
        assert_eq!(msg, "Missing fields: error_count, uptime_percent");
    }

    #[test]
    fn test_event_id_trimmed_and_non_empty() {
        let mut p = valid_payload();
        p.insert("event_id".into(), json!("  evt-9  "));
        let sample = SampleValidator::new().validate(&p, Utc::now()).unwrap();
        assert_eq!(sample.event_id, "evt-9");

        p.insert("event_id".into(), json!("   "));
        let msg = validation_message(SampleValidator::new().validate(&p, Utc::now()));
        assert_eq!(msg, "event_id cannot be empty");
    }

    #[test]
    fn test_event_id_length_limit() {
        let mut p = valid_payload();
        p.insert("event_id".into(), json!("x".repeat(MAX_EVENT_ID_LEN)));
        assert!(SampleValidator::new().validate(&p, Utc::now()).is_ok());

        p.insert("event_id".into(), json!("x".repeat(MAX_EVENT_ID_LEN + 1)));
        assert!(SampleValidator::new().validate(&p, Utc::now()).is_err());
    }

    #[test]
    fn test_error_count_exceeds_request_count() {
        let mut p = valid_payload();
        p.insert("request_count".into(), json!(10));
        p.insert("error_count".into(), json!(11));
        let msg = validation_message(SampleValidator::new().validate(&p, Utc::now()));
        assert_eq!(msg, "error_count cannot exceed request_count");
    }

    #[test]
    fn test_negative_counts_rejected() {
        let mut p = valid_payload();
        p.insert("request_count".into(), json!(-1));
        let msg = validation_message(SampleValidator::new().validate(&p, Utc::now()));
        assert_eq!(msg, "request_count and error_count must be >= 0");
    }

    #[test]
    fn test_counts_accept_numeric_strings_and_integral_floats() {
        let mut p = valid_payload();
        p.insert("request_count".into(), json!("250"));
        p.insert("error_count".into(), json!(3.0));
        let sample = SampleValidator::new().validate(&p, Utc::now()).unwrap();
        assert_eq!(sample.request_count, 250);
        assert_eq!(sample.error_count, 3);

        p.insert("error_count".into(), json!(2.5));
        let msg = validation_message(SampleValidator::new().validate(&p, Utc::now()));
        assert_eq!(msg, "error_count must be an integer");

        p.insert("error_count".into(), json!(true));
        assert!(SampleValidator::new().validate(&p, Utc::now()).is_err());
    }

    #[test]
    fn test_percent_bounds_inclusive() {
        let mut p = valid_payload();
        p.insert("cpu_percent".into(), json!(0));
        p.insert("memory_percent".into(), json!(100));
        p.insert("uptime_percent".into(), json!("100.0"));
        assert!(SampleValidator::new().validate(&p, Utc::now()).is_ok());

        p.insert("memory_percent".into(), json!(100.01));
        let msg = validation_message(SampleValidator::new().validate(&p, Utc::now()));
        assert_eq!(msg, "memory_percent must be between 0 and 100");
    }

    #[test]
    fn test_negative_latency_rejected() {
        let mut p = valid_payload();
        p.insert("p95_latency_ms".into(), json!(-0.5));
        let msg = validation_message(SampleValidator::new().validate(&p, Utc::now()));
        assert_eq!(msg, "latency values must be >= 0");
    }

    #[test]
    fn test_non_numeric_latency_rejected() {
        let mut p = valid_payload();
        p.insert("avg_latency_ms".into(), json!("fast"));
        let msg = validation_message(SampleValidator::new().validate(&p, Utc::now()));
        assert_eq!(msg, "avg_latency_ms must be a number");
    }

    #[test]
    fn test_captured_at_defaults_to_now() {
        let now = Utc::now();
        let mut p = valid_payload();
        p.remove("captured_at");
        assert_eq!(SampleValidator::new().validate(&p, now).unwrap().captured_at, now);

        p.insert("captured_at".into(), Value::Null);
        assert_eq!(SampleValidator::new().validate(&p, now).unwrap().captured_at, now);

        p.insert("captured_at".into(), json!(""));
        assert_eq!(SampleValidator::new().validate(&p, now).unwrap().captured_at, now);
    }

    #[test]
    fn test_captured_at_invalid() {
        let mut p = valid_payload();
        p.insert("captured_at".into(), json!("yesterday"));
        let msg = validation_message(SampleValidator::new().validate(&p, Utc::now()));
        assert_eq!(msg, "captured_at must be ISO-8601 datetime");

        p.insert("captured_at".into(), json!(1714560000));
        assert!(SampleValidator::new().validate(&p, Utc::now()).is_err());
        // Only an empty string falls back to the receipt time
        p.insert("captured_at".into(), json!("   "));
        let msg = validation_message(SampleValidator::new().validate(&p, Utc::now()));
        assert_eq!(msg, "captured_at must be ISO-8601 datetime");
    }

    #[test]
    fn test_parse_captured_at_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_captured_at("2024-05-01T12:00:00Z"), Some(expected));
        assert_eq!(parse_captured_at("2024-05-01T14:00:00+02:00"), Some(expected));
        assert_eq!(parse_captured_at("2024-05-01 12:00:00"), Some(expected));
        assert_eq!(parse_captured_at("2024-05-01T12:00"), Some(expected));
        assert_eq!(
            parse_captured_at("2024-05-01T12:00:00.250"),
            Some(expected + Duration::milliseconds(250))
        );
        assert_eq!(parse_captured_at("2024-13-01T12:00:00"), None);
    }

    #[test]
    fn test_parse_captured_at_offset_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let cases = [
            "2024-05-01T14:00:00+0200",
            "2024-05-01T14:00:00+02",
            "2024-05-01 14:00:00+02:00",
            "2024-05-01T14:00:00.000+0200",
            "2024-05-01T10:00:00-02:00",
            "2024-05-01T14:00+02:00",
            "2024-05-01T12:00Z",
            "2024-05-01 12:00Z",
            "2024-05-01 12:00:00Z",
        ];
        for raw in cases {
            assert_eq!(parse_captured_at(raw), Some(expected), "{}", raw);
        }
        assert_eq!(parse_captured_at("2024-05-01T12:00:00+25:00"), None);
        assert_eq!(parse_captured_at("Z"), None);
    }

    #[test]
    fn test_meta_defaults_and_type() {
        let mut p = valid_payload();
        p.remove("meta");
        assert!(SampleValidator::new().validate(&p, Utc::now()).unwrap().meta.is_empty());

        p.insert("meta".into(), Value::Null);
        assert!(SampleValidator::new().validate(&p, Utc::now()).unwrap().meta.is_empty());

        p.insert("meta".into(), json!(["not", "an", "object"]));
        let msg = validation_message(SampleValidator::new().validate(&p, Utc::now()));
        assert_eq!(msg, "meta must be an object");
    }

    #[test]
    fn test_checks_run_in_order() {
        // Both the counts and the cpu are wrong; the count check comes first.
        let mut p = valid_payload();
        p.insert("error_count".into(), json!(5000));
        p.insert("cpu_percent".into(), json!(250));
        let msg = validation_message(SampleValidator::new().validate(&p, Utc::now()));
        assert_eq!(msg, "error_count cannot exceed request_count");
    }

    proptest! {
        #[test]
        fn prop_out_of_range_percent_rejected(
            field in prop::sample::select(vec!["cpu_percent", "memory_percent", "uptime_percent"]),
            value in prop_oneof![-1.0e6f64..-0.0001, 100.0001f64..1.0e6],
        ) {
            let mut p = valid_payload();
            p.insert(field.to_string(), json!(value));
            prop_assert!(SampleValidator::new().validate(&p, Utc::now()).is_err());
        }

        #[test]
        fn prop_errors_above_requests_rejected(requests in 0i64..1_000_000, extra in 1i64..1000) {
            let mut p = valid_payload();
            p.insert("request_count".into(), json!(requests));
            p.insert("error_count".into(), json!(requests + extra));
            prop_assert!(SampleValidator::new().validate(&p, Utc::now()).is_err());
        }

        #[test]
        fn prop_in_range_percent_accepted(value in 0.0f64..=100.0) {
            let mut p = valid_payload();
            p.insert("cpu_percent".into(), json!(value));
            prop_assert!(SampleValidator::new().validate(&p, Utc::now()).is_ok());
        }
    }
}
