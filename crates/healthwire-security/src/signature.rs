//! HMAC-SHA256 request signing
//!
//! A request is signed over the exact bytes `"{timestamp}.{raw_body}"` with
//! the client's shared secret; the signature travels hex-encoded in
//! `X-Signature`. Freshness is bounded by a fixed clock-skew tolerance,
//! which caps the replay window without a nonce store.

use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use healthwire_core::AuthFailure;

use crate::{Result, SecurityError};

type HmacSha256 = Hmac<Sha256>;

/// Largest accepted distance between the claimed timestamp and server time
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// The byte sequence a signature covers
pub fn signing_input(timestamp: &str, body: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(timestamp.len() + 1 + body.len());
    input.extend_from_slice(timestamp.as_bytes());
    input.push(b'.');
    input.extend_from_slice(body);
    input
}

/// Compute the lowercase hex signature for `timestamp` and `body`
pub fn sign(secret: &[u8], timestamp: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| SecurityError::InvalidKey(e.to_string()))?;
    mac.update(&signing_input(timestamp, body));
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a claimed hex signature
pub fn verify_signature(secret: &[u8], timestamp: &str, body: &[u8], claimed: &str) -> bool {
    match sign(secret, timestamp, body) {
        Ok(expected) => constant_time_eq(expected.as_bytes(), claimed.as_bytes()),
        Err(_) => false,
    }
}

/// Parse a claimed `X-Timestamp` as integer seconds since the epoch
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

/// Whether `timestamp` lies within `max_skew` seconds of `now`, inclusive
pub fn is_fresh(timestamp: i64, now: i64, max_skew: i64) -> bool {
    now.checked_sub(timestamp)
        .map(|delta| delta.abs() <= max_skew)
        .unwrap_or(false)
}

/// Signature material extracted from one request
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub body: &'a [u8],
}

impl<'a> SignedRequest<'a> {
    /// Check freshness, then the signature, against `secret` at `now`
    ///
    /// The signature covers the timestamp in canonical decimal form, so
    /// `" 1700000000"` and `"1700000000"` sign identically.
    pub fn authenticate(&self, secret: &[u8], now: i64) -> std::result::Result<(), AuthFailure> {
        let ts = self
            .timestamp
            .and_then(parse_timestamp)
            .ok_or(AuthFailure::InvalidTimestamp)?;
        if !is_fresh(ts, now, MAX_CLOCK_SKEW_SECS) {
            return Err(AuthFailure::StaleTimestamp);
        }

        let claimed = self
            .signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AuthFailure::BadSignature)?;
        if !verify_signature(secret, &ts.to_string(), self.body, claimed) {
            return Err(AuthFailure::BadSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECRET: &[u8] = b"s3cr3t";

    #[test]
    fn test_known_vector() {
        let sig = sign(b"key", "1700000000", br#"{"a":1}"#).unwrap();
        assert_eq!(
            sig,
            "a438e398bfafc57e4396bb7fc2304422f0f768e965d073ca313cb52e22e6ad03"
        );
        assert_ne!(sig, sign(b"key", "1700000001", br#"{"a":1}"#).unwrap());
    }

    #[test]
    fn test_signing_input_layout() {
        assert_eq!(signing_input("1700000000", b"{}"), b"1700000000.{}".to_vec());
    }

    #[test]
    fn test_round_trip() {
        let body = br#"{"event_id":"e1"}"#;
        let sig = sign(SECRET, "1700000000", body).unwrap();
        let req = SignedRequest {
            timestamp: Some("1700000000"),
            signature: Some(&sig),
            body,
        };
        assert_eq!(req.authenticate(SECRET, 1_700_000_010), Ok(()));
    }

    #[test]
    fn test_timestamp_signed_in_canonical_form() {
        let sig = sign(SECRET, "1700000000", b"{}").unwrap();
        let req = SignedRequest {
            timestamp: Some(" 1700000000 "),
            signature: Some(&sig),
            body: b"{}",
        };
        assert_eq!(req.authenticate(SECRET, 1_700_000_000), Ok(()));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let sig = sign(SECRET, "1700000000", b"{\"a\":1}").unwrap();
        let req = SignedRequest {
            timestamp: Some("1700000000"),
            signature: Some(&sig),
            body: b"{\"a\":2}",
        };
        assert_eq!(
            req.authenticate(SECRET, 1_700_000_000),
            Err(AuthFailure::BadSignature)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let sig = sign(b"other", "1700000000", b"{}").unwrap();
        assert!(!verify_signature(SECRET, "1700000000", b"{}", &sig));
    }

    #[test]
    fn test_uppercase_hex_rejected() {
        let sig = sign(SECRET, "1700000000", b"{}").unwrap().to_uppercase();
        assert!(!verify_signature(SECRET, "1700000000", b"{}", &sig));
    }

    #[test]
    fn test_skew_boundary() {
        let now = 1_700_000_000;
        assert!(is_fresh(now - 300, now, MAX_CLOCK_SKEW_SECS));
        assert!(is_fresh(now + 300, now, MAX_CLOCK_SKEW_SECS));
        assert!(!is_fresh(now - 301, now, MAX_CLOCK_SKEW_SECS));
        assert!(!is_fresh(now + 301, now, MAX_CLOCK_SKEW_SECS));
        assert!(!is_fresh(i64::MIN, now, MAX_CLOCK_SKEW_SECS));
    }

    #[test]
    fn test_stale_timestamp_rejected_even_with_valid_signature() {
        let ts = "1700000000";
        let sig = sign(SECRET, ts, b"{}").unwrap();
        let req = SignedRequest {
            timestamp: Some(ts),
            signature: Some(&sig),
            body: b"{}",
        };
        assert_eq!(
            req.authenticate(SECRET, 1_700_000_301),
            Err(AuthFailure::StaleTimestamp)
        );
    }

    #[test]
    fn test_missing_or_garbage_headers() {
        let req = SignedRequest {
            timestamp: None,
            signature: Some("00"),
            body: b"{}",
        };
        assert_eq!(req.authenticate(SECRET, 0), Err(AuthFailure::InvalidTimestamp));

        let req = SignedRequest {
            timestamp: Some("yesterday"),
            signature: Some("00"),
            body: b"{}",
        };
        assert_eq!(req.authenticate(SECRET, 0), Err(AuthFailure::InvalidTimestamp));

        let req = SignedRequest {
            timestamp: Some("0"),
            signature: None,
            body: b"{}",
        };
        assert_eq!(req.authenticate(SECRET, 0), Err(AuthFailure::BadSignature));
    }

    proptest! {
        #[test]
        fn prop_any_single_byte_flip_fails(body in proptest::collection::vec(any::<u8>(), 1..256), idx in any::<prop::sample::Index>()) {
            let sig = sign(SECRET, "42", &body).unwrap();
            let mut tampered = body.clone();
            let i = idx.index(tampered.len());
            tampered[i] ^= 0x01;
            prop_assert!(verify_signature(SECRET, "42", &body, &sig));
            prop_assert!(!verify_signature(SECRET, "42", &tampered, &sig));
        }
    }
}
