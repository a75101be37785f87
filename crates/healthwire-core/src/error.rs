//! Error taxonomy for ingestion and health queries
//!
//! Every variant is terminal for the request that produced it. The HTTP
//! layer maps each variant to a status code; the `Display` output is what
//! ends up in the `{"error": ...}` response body, so it must never carry
//! storage or credential detail.

use std::fmt;
use thiserror::Error;

/// Why a request failed authentication
///
/// Kept out of the response body. Only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No `X-API-Key` header, or it was blank
    MissingApiKey,
    /// The key does not resolve to an active client
    UnknownApiKey,
    /// `X-Timestamp` missing or not an integer
    InvalidTimestamp,
    /// `X-Timestamp` outside the allowed clock skew
    StaleTimestamp,
    /// `X-Signature` missing or does not match
    BadSignature,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::MissingApiKey => "missing_api_key",
            AuthFailure::UnknownApiKey => "unknown_api_key",
            AuthFailure::InvalidTimestamp => "invalid_timestamp",
            AuthFailure::StaleTimestamp => "stale_timestamp",
            AuthFailure::BadSignature => "bad_signature",
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-level errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Bad or missing key, stale timestamp, bad signature
    #[error("Authentication failed")]
    AuthenticationFailed(AuthFailure),

    /// Body is not parseable as a JSON object
    #[error("{0}")]
    MalformedPayload(String),

    /// Field-level payload errors
    #[error("{0}")]
    ValidationFailed(String),

    /// Event id already stored for this client
    #[error("Duplicate event_id for this app")]
    DuplicateEvent,

    /// Lookback query parameter out of range or not an integer
    #[error("{0}")]
    InvalidWindow(String),

    /// Wrong HTTP method for the endpoint; `allow` is the one it takes
    #[error("{allow} only")]
    MethodNotAllowed { allow: &'static str },

    #[error("Request body too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Request timed out")]
    Timeout,

    /// Storage or other server-side failure; detail is for logs only
    #[error("Internal server error")]
    Internal(String),
}

impl TelemetryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TelemetryError::ValidationFailed(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        TelemetryError::MalformedPayload(msg.into())
    }

    pub fn invalid_window(msg: impl Into<String>) -> Self {
        TelemetryError::InvalidWindow(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        TelemetryError::Internal(msg.into())
    }

    /// Error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            TelemetryError::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            TelemetryError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            TelemetryError::ValidationFailed(_) => "VALIDATION_FAILED",
            TelemetryError::DuplicateEvent => "DUPLICATE_EVENT",
            TelemetryError::InvalidWindow(_) => "INVALID_WINDOW",
            TelemetryError::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            TelemetryError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            TelemetryError::Timeout => "TIMEOUT",
            TelemetryError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if the caller caused this error (vs the server)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, TelemetryError::Timeout | TelemetryError::Internal(_))
    }
}

/// Result type alias for request handling
pub type Result<T> = std::result::Result<T, TelemetryError>;
