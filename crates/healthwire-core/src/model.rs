//! Persistent entities: registered clients and their samples

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::validation::ValidatedSample;

/// Raw per-client threshold overrides, exactly as provisioned
pub type RuleOverrides = serde_json::Map<String, serde_json::Value>;

/// Free-form sample metadata
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A registered application permitted to submit telemetry
///
/// The secret is only readable through [`ExposeSecret`]; `Debug` output
/// redacts it. Serialization includes it so the durable store can persist
/// the record, which is why `Client` must never be serialized into a
/// response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub api_key: String,
    #[serde(serialize_with = "serialize_secret")]
    pub secret: SecretString,
    pub is_active: bool,
    #[serde(default)]
    pub health_rules: RuleOverrides,
    pub created_at: DateTime<Utc>,
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Client {
    /// Build a fresh, active client
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        secret: impl Into<String>,
        health_rules: RuleOverrides,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            api_key: api_key.into(),
            secret: SecretString::new(secret.into()),
            is_active: true,
            health_rules,
            created_at: Utc::now(),
        }
    }

    pub fn secret_bytes(&self) -> &[u8] {
        self.secret.expose_secret().as_bytes()
    }
}

/// One reported measurement window from a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub client_id: Uuid,
    pub event_id: String,
    pub captured_at: DateTime<Utc>,
    pub request_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub uptime_percent: f64,
    #[serde(default)]
    pub meta: Metadata,
    pub received_at: DateTime<Utc>,
}

impl Sample {
    /// Attach a validated payload to its owning client
    pub fn from_validated(
        client_id: Uuid,
        validated: ValidatedSample,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id,
            event_id: validated.event_id,
            captured_at: validated.captured_at,
            request_count: validated.request_count,
            error_count: validated.error_count,
            avg_latency_ms: validated.avg_latency_ms,
            p95_latency_ms: validated.p95_latency_ms,
            cpu_percent: validated.cpu_percent,
            memory_percent: validated.memory_percent,
            uptime_percent: validated.uptime_percent,
            meta: validated.meta,
            received_at,
        }
    }
}
