//! Prometheus metrics for the HTTP surface
//!
//! - `healthwire_ingest_requests_total{outcome}` (counter): ingestion requests
//!   by outcome (`accepted` or a lowercased error code)
//! - `healthwire_ingest_duration_seconds` (histogram): ingestion latency
//! - `healthwire_health_queries_total{status}` (counter): health queries by
//!   resulting status, or `error`

use prometheus::{CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

pub struct ApiMetrics {
    registry: Registry,
    ingest_requests_total: CounterVec,
    ingest_duration_seconds: Histogram,
    health_queries_total: CounterVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ingest_requests_total = CounterVec::new(
            Opts::new("ingest_requests_total", "Telemetry ingestion requests by outcome")
                .namespace("healthwire"),
            &["outcome"],
        )?;

        let ingest_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "ingest_duration_seconds",
                "Telemetry ingestion duration in seconds",
            )
            .namespace("healthwire")
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        )?;

        let health_queries_total = CounterVec::new(
            Opts::new("health_queries_total", "Health queries by resulting status")
                .namespace("healthwire"),
            &["status"],
        )?;

        registry.register(Box::new(ingest_requests_total.clone()))?;
        registry.register(Box::new(ingest_duration_seconds.clone()))?;
        registry.register(Box::new(health_queries_total.clone()))?;

        Ok(Self {
            registry,
            ingest_requests_total,
            ingest_duration_seconds,
            health_queries_total,
        })
    }

    pub fn record_ingest(&self, outcome: &str, duration_secs: f64) {
        self.ingest_requests_total.with_label_values(&[outcome]).inc();
        self.ingest_duration_seconds.observe(duration_secs);
    }

    pub fn record_health_query(&self, status: &str) {
        self.health_queries_total.with_label_values(&[status]).inc();
    }

    /// Text exposition format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics").finish_non_exhaustive()
    }
}
