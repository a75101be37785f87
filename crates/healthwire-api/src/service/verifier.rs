//! Request authentication against the credential store

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use healthwire_core::{AuthFailure, Client, Result, TelemetryError};
use healthwire_security::SignedRequest;
use healthwire_storage::{ClientStore, TelemetryStore};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Authentication headers as sent; absent or non-ASCII values are `None`
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    pub api_key: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
}

impl<'a> Credentials<'a> {
    pub fn from_headers(headers: &'a HeaderMap) -> Self {
        let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            api_key: get(API_KEY_HEADER),
            timestamp: get(TIMESTAMP_HEADER),
            signature: get(SIGNATURE_HEADER),
        }
    }
}

fn reject(failure: AuthFailure) -> TelemetryError {
    tracing::warn!(reason = %failure, "Authentication failed");
    TelemetryError::AuthenticationFailed(failure)
}

/// Resolves API keys and checks request signatures
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    store: Arc<dyn TelemetryStore>,
}

impl SignatureVerifier {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self { store }
    }

    /// Resolve an API key to an active client (key-only authentication)
    pub async fn resolve(&self, api_key: Option<&str>) -> Result<Client> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| reject(AuthFailure::MissingApiKey))?;

        match self.store.find_active_by_api_key(api_key).await {
            Ok(Some(client)) => Ok(client),
            Ok(None) => Err(reject(AuthFailure::UnknownApiKey)),
            Err(e) => Err(TelemetryError::internal(e.to_string())),
        }
    }

    /// Full check: active key, fresh timestamp, matching signature over `body`
    pub async fn verify(
        &self,
        credentials: &Credentials<'_>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Client> {
        let client = self.resolve(credentials.api_key).await?;

        let signed = SignedRequest {
            timestamp: credentials.timestamp,
            signature: credentials.signature,
            body,
        };
        signed
            .authenticate(client.secret_bytes(), now.timestamp())
            .map_err(|failure| {
                tracing::warn!(client = %client.name, reason = %failure, "Authentication failed");
                TelemetryError::AuthenticationFailed(failure)
            })?;

        Ok(client)
    }
}
