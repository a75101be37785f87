//! Windowed health evaluation for one client

use chrono::{DateTime, Utc};
use std::sync::Arc;

use healthwire_core::{aggregate, HealthReport, HealthRules, LookbackWindow, Result, TelemetryError};
use healthwire_storage::{SampleStore, TelemetryStore};

use super::verifier::SignatureVerifier;

#[derive(Debug, Clone)]
pub struct HealthQueryService {
    verifier: SignatureVerifier,
    store: Arc<dyn TelemetryStore>,
    defaults: Arc<HealthRules>,
}

impl HealthQueryService {
    /// `defaults` is the process-wide rule set, built once at startup
    pub fn new(store: Arc<dyn TelemetryStore>, defaults: Arc<HealthRules>) -> Self {
        Self {
            verifier: SignatureVerifier::new(Arc::clone(&store)),
            store,
            defaults,
        }
    }

    /// Evaluate the client identified by `api_key` over the trailing
    /// window ending at `now`
    ///
    /// `minutes` holds every value the caller sent for the parameter; none
    /// means the default window, more than one is rejected.
    pub async fn query(
        &self,
        api_key: Option<&str>,
        minutes: &[&str],
        now: DateTime<Utc>,
    ) -> Result<HealthReport> {
        let client = self.verifier.resolve(api_key).await?;
        let window = match minutes {
            [] => LookbackWindow::parse(None)?,
            [raw] => LookbackWindow::parse(Some(*raw))?,
            _ => return Err(TelemetryError::invalid_window("minutes must be given once")),
        };

        let (start, end) = window.bounds(now);
        let samples = self
            .store
            .samples_in_window(client.id, start, end)
            .await
            .map_err(|e| TelemetryError::internal(e.to_string()))?;

        let report = HealthReport::evaluate(&client, window, aggregate(&samples, window, now), &self.defaults);
        tracing::debug!(
            client = %client.name,
            window_minutes = window.minutes(),
            samples = samples.len(),
            status = %report.status,
            "Health evaluated"
        );
        Ok(report)
    }
}
