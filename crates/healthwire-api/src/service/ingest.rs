//! Ingestion pipeline: authenticate, validate, persist
//!
//! Authentication runs strictly before the body is parsed, and the body is
//! fully validated before anything reaches the store.

use axum::http::Method;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

use healthwire_core::{Result, Sample, SampleValidator, TelemetryError};
use healthwire_storage::{SampleStore, StorageError, TelemetryStore};

use super::verifier::{Credentials, SignatureVerifier};

/// One ingestion request as received
#[derive(Debug, Clone, Copy)]
pub struct IngestRequest<'a> {
    pub method: &'a Method,
    pub credentials: Credentials<'a>,
    pub body: &'a [u8],
}

#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    verifier: SignatureVerifier,
    store: Arc<dyn TelemetryStore>,
    validator: SampleValidator,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self {
            verifier: SignatureVerifier::new(Arc::clone(&store)),
            store,
            validator: SampleValidator::new(),
        }
    }

    /// Only POST writes samples
    pub fn ensure_method(method: &Method) -> Result<()> {
        if *method != Method::POST {
            return Err(TelemetryError::MethodNotAllowed { allow: "POST" });
        }
        Ok(())
    }

    /// Run one request through the pipeline and return the stored sample
    pub async fn ingest(&self, request: IngestRequest<'_>, now: DateTime<Utc>) -> Result<Sample> {
        Self::ensure_method(request.method)?;

        let client = self
            .verifier
            .verify(&request.credentials, request.body, now)
            .await?;

        let payload: Value = serde_json::from_slice(request.body)
            .map_err(|_| TelemetryError::malformed("Body must be valid JSON"))?;
        let fields = payload
            .as_object()
            .ok_or_else(|| TelemetryError::malformed("Body must be a JSON object"))?;

        let validated = self.validator.validate(fields, now).map_err(|e| {
            tracing::info!(client = %client.name, error = %e, "Rejected invalid sample");
            e
        })?;
        let sample = Sample::from_validated(client.id, validated, now);

        match self.store.insert_sample(sample.clone()).await {
            Ok(()) => {
                tracing::info!(
                    client = %client.name,
                    event_id = %sample.event_id,
                    captured_at = %sample.captured_at,
                    "Sample accepted"
                );
                Ok(sample)
            }
            Err(StorageError::UniqueViolation(_)) => {
                tracing::debug!(
                    client = %client.name,
                    event_id = %sample.event_id,
                    "Duplicate event_id"
                );
                Err(TelemetryError::DuplicateEvent)
            }
            Err(e) => Err(TelemetryError::internal(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthwire_core::{AuthFailure, Client, RuleOverrides};
    use healthwire_security::sign;
    use healthwire_storage::{ClientStore, MemoryStore};
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryStore>,
        pipeline: IngestionPipeline,
        client: Client,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let client = Client::new("checkout", "key", "secret", RuleOverrides::new());
        store.create_client(client.clone()).await.unwrap();
        let pipeline = IngestionPipeline::new(store.clone());
        Fixture {
            store,
            pipeline,
            client,
        }
    }

    fn payload(event_id: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "event_id": event_id,
            "request_count": 1000,
            "error_count": 2,
            "avg_latency_ms": 80,
            "p95_latency_ms": 200,
            "cpu_percent": 35,
            "memory_percent": 45,
            "uptime_percent": 99.99
        }))
        .unwrap()
    }

    async fn submit(f: &Fixture, method: &Method, body: &[u8], secret: &[u8]) -> Result<Sample> {
        let now = Utc::now();
        let ts = now.timestamp().to_string();
        let sig = sign(secret, &ts, body).unwrap();
        let request = IngestRequest {
            method,
            credentials: Credentials {
                api_key: Some("key"),
                timestamp: Some(&ts),
                signature: Some(&sig),
            },
            body,
        };
        f.pipeline.ingest(request, now).await
    }

    #[tokio::test]
    async fn test_accepts_and_stores() {
        let f = fixture().await;
        let sample = submit(&f, &Method::POST, &payload("evt-1"), b"secret")
            .await
            .unwrap();
        assert_eq!(sample.client_id, f.client.id);

        let stored = f.store.get_sample(f.client.id, "evt-1").await.unwrap();
        assert_eq!(stored, Some(sample));
    }

    #[tokio::test]
    async fn test_duplicate_keeps_original() {
        let f = fixture().await;
        let first = submit(&f, &Method::POST, &payload("evt-1"), b"secret")
            .await
            .unwrap();

        let mut changed: Value = serde_json::from_slice(&payload("evt-1")).unwrap();
        changed["request_count"] = json!(5);
        changed["error_count"] = json!(5);
        let result = submit(&f, &Method::POST, &serde_json::to_vec(&changed).unwrap(), b"secret").await;
        assert!(matches!(result, Err(TelemetryError::DuplicateEvent)));

        let stored = f.store.get_sample(f.client.id, "evt-1").await.unwrap().unwrap();
        assert_eq!(stored.request_count, first.request_count);
        assert_eq!(stored.error_count, first.error_count);
    }

    #[tokio::test]
    async fn test_method_checked_first() {
        let f = fixture().await;
        let result = submit(&f, &Method::GET, &payload("evt-1"), b"wrong").await;
        match result {
            Err(err @ TelemetryError::MethodNotAllowed { .. }) => assert_eq!(err.to_string(), "POST only"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_authentication_before_validation() {
        let f = fixture().await;
        // Invalid payload signed with the wrong secret reports auth, not validation
        let result = submit(&f, &Method::POST, b"{\"event_id\": \"\"}", b"wrong").await;
        assert!(matches!(
            result,
            Err(TelemetryError::AuthenticationFailed(AuthFailure::BadSignature))
        ));
    }

    #[tokio::test]
    async fn test_malformed_and_invalid_bodies() {
        let f = fixture().await;
        match submit(&f, &Method::POST, b"not json", b"secret").await {
            Err(TelemetryError::MalformedPayload(msg)) => assert_eq!(msg, "Body must be valid JSON"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            submit(&f, &Method::POST, b"[1,2]", b"secret").await,
            Err(TelemetryError::MalformedPayload(_))
        ));

        let mut bad: Value = serde_json::from_slice(&payload("evt-2")).unwrap();
        bad["error_count"] = json!(2000);
        match submit(&f, &Method::POST, &serde_json::to_vec(&bad).unwrap(), b"secret").await {
            Err(TelemetryError::ValidationFailed(msg)) => {
                assert_eq!(msg, "error_count cannot exceed request_count")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(f.store.get_sample(f.client.id, "evt-2").await.unwrap().is_none());
    }
}
