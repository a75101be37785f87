//! Healthwire security
//!
//! Request signing and credential generation:
//!
//! - **Signature** (`signature`): HMAC-SHA256 over `"{timestamp}.{body}"`,
//!   constant-time comparison, clock-skew freshness
//! - **Credentials** (`credentials`): random API keys and shared secrets

pub mod credentials;
pub mod signature;

pub use credentials::{generate_api_key, generate_secret};
pub use signature::{
    is_fresh, parse_timestamp, sign, verify_signature, SignedRequest, MAX_CLOCK_SKEW_SECS,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecurityError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Random number generation failed: {0}")]
    Random(String),
}

pub type Result<T> = std::result::Result<T, SecurityError>;
