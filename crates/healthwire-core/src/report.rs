//! The externally visible health report

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{LookbackWindow, WindowAggregate, WindowSummary};
use crate::model::{Client, Sample};
use crate::rules::{classify, Breach, HealthRules, HealthStatus};

pub const NO_DATA_MESSAGE: &str = "No telemetry in selected window";

/// Raw view of the most recent sample in the window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestSample {
    pub event_id: String,
    pub captured_at: DateTime<Utc>,
    pub request_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub uptime_percent: f64,
}

impl From<Sample> for LatestSample {
    fn from(s: Sample) -> Self {
        Self {
            event_id: s.event_id,
            captured_at: s.captured_at,
            request_count: s.request_count,
            error_count: s.error_count,
            avg_latency_ms: s.avg_latency_ms,
            p95_latency_ms: s.p95_latency_ms,
            cpu_percent: s.cpu_percent,
            memory_percent: s.memory_percent,
            uptime_percent: s.uptime_percent,
        }
    }
}

/// Health report for one client and window
///
/// `unknown` reports carry only `message`; every other status carries the
/// evaluated rules, the rounded summary and the latest sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub app: String,
    pub window_minutes: i64,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breached_rules: Option<Vec<Breach>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<HealthRules>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<WindowSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<LatestSample>,
}

impl HealthReport {
    /// Evaluate an aggregate for `client`
    ///
    /// `defaults` is the process-wide rule set; the client's overrides are
    /// applied to a copy of it. Classification uses the full-precision
    /// summary, the report carries the rounded one.
    pub fn evaluate(
        client: &Client,
        window: LookbackWindow,
        aggregate: WindowAggregate,
        defaults: &HealthRules,
    ) -> Self {
        match aggregate {
            WindowAggregate::NoData => Self::no_data(client, window),
            WindowAggregate::Data { summary, latest } => {
                let rules = defaults.with_overrides(&client.health_rules);
                let verdict = classify(&summary, &rules);
                Self {
                    app: client.name.clone(),
                    window_minutes: window.minutes(),
                    status: verdict.status,
                    message: None,
                    breached_rules: Some(verdict.breached),
                    rules: Some(rules),
                    summary: Some(summary.rounded()),
                    latest: Some(latest.into()),
                }
            }
        }
    }

    fn no_data(client: &Client, window: LookbackWindow) -> Self {
        Self {
            app: client.name.clone(),
            window_minutes: window.minutes(),
            status: HealthStatus::Unknown,
            message: Some(NO_DATA_MESSAGE.to_string()),
            breached_rules: None,
            rules: None,
            summary: None,
            latest: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::model::RuleOverrides;
    use chrono::Duration;
    use serde_json::json;
    use uuid::Uuid;

    fn sample(event_id: &str, captured_at: DateTime<Utc>, p95: f64) -> Sample {
        Sample {
            client_id: Uuid::nil(),
            event_id: event_id.to_string(),
            captured_at,
            request_count: 1000,
            error_count: 1,
            avg_latency_ms: 80.123,
            p95_latency_ms: p95,
            cpu_percent: 35.0,
            memory_percent: 45.0,
            uptime_percent: 99.99,
            meta: Default::default(),
            received_at: captured_at,
        }
    }

    #[test]
    fn test_unknown_report_shape() {
        let client = Client::new("checkout", "k", "s", RuleOverrides::new());
        let report = HealthReport::evaluate(
            &client,
            LookbackWindow::default(),
            WindowAggregate::NoData,
            &HealthRules::default(),
        );
        assert_eq!(report.status, HealthStatus::Unknown);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["app"], json!("checkout"));
        assert_eq!(json["window_minutes"], json!(15));
        assert_eq!(json["status"], json!("unknown"));
        assert_eq!(json["message"], json!(NO_DATA_MESSAGE));
        assert!(json.get("latest").is_none());
        assert!(json.get("breached_rules").is_none());
    }

    #[test]
    fn test_report_applies_client_overrides() {
        let mut overrides = RuleOverrides::new();
        overrides.insert("max_p95_latency_ms".into(), json!(1000));
        let client = Client::new("search", "k", "s", overrides);
        let now = Utc::now();
        let window = LookbackWindow::default();
        let agg = aggregate(&[sample("e1", now - Duration::minutes(1), 900.0)], window, now);

        let report = HealthReport::evaluate(&client, window, agg, &HealthRules::default());
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.breached_rules, Some(vec![]));
        assert_eq!(report.rules.unwrap().max_p95_latency_ms, 1000.0);
    }

    #[test]
    fn test_report_rounds_summary_but_not_latest() {
        let client = Client::new("search", "k", "s", RuleOverrides::new());
        let now = Utc::now();
        let window = LookbackWindow::default();
        let agg = aggregate(&[sample("e1", now, 900.0)], window, now);

        let report = HealthReport::evaluate(&client, window, agg, &HealthRules::default());
        assert_eq!(report.status, HealthStatus::Warning);
        assert_eq!(report.breached_rules, Some(vec![Breach::Latency]));
        assert_eq!(report.summary.as_ref().unwrap().avg_latency_ms, 80.12);
        assert_eq!(report.latest.as_ref().unwrap().avg_latency_ms, 80.123);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["breached_rules"], json!(["latency"]));
        assert_eq!(json["latest"]["event_id"], json!("e1"));
        assert!(json.get("message").is_none());
    }
}
