//! Credential generation for newly provisioned clients

use secrecy::SecretString;

use crate::{Result, SecurityError};

/// Random bytes behind an API key (hex-encoded to 32 characters)
pub const API_KEY_BYTES: usize = 16;

/// Random bytes behind a shared secret (hex-encoded to 64 characters)
pub const SECRET_BYTES: usize = 32;

fn random_hex(len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    getrandom::getrandom(&mut buf).map_err(|e| SecurityError::Random(e.to_string()))?;
    Ok(hex::encode(buf))
}

/// Public client identifier
pub fn generate_api_key() -> Result<String> {
    random_hex(API_KEY_BYTES)
}

/// Shared signing secret; shown once at provisioning time
pub fn generate_secret() -> Result<SecretString> {
    random_hex(SECRET_BYTES).map(SecretString::new)
}
