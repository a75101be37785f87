//! Windowed aggregation over a client's samples
//!
//! Summaries keep full precision; [`WindowSummary::rounded`] is only for the
//! reporting boundary.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::{Result, TelemetryError};
use crate::model::Sample;

pub const MIN_LOOKBACK_MINUTES: i64 = 1;
pub const MAX_LOOKBACK_MINUTES: i64 = 24 * 60;
pub const DEFAULT_LOOKBACK_MINUTES: i64 = 15;

/// A validated trailing window, `[now - minutes, now]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LookbackWindow {
    minutes: i64,
}

impl Default for LookbackWindow {
    fn default() -> Self {
        Self {
            minutes: DEFAULT_LOOKBACK_MINUTES,
        }
    }
}

impl LookbackWindow {
    /// Out-of-range values are rejected, never clamped
    pub fn from_minutes(minutes: i64) -> Result<Self> {
        if !(MIN_LOOKBACK_MINUTES..=MAX_LOOKBACK_MINUTES).contains(&minutes) {
            return Err(TelemetryError::invalid_window(format!(
                "minutes must be between {} and {}",
                MIN_LOOKBACK_MINUTES, MAX_LOOKBACK_MINUTES
            )));
        }
        Ok(Self { minutes })
    }

    /// Parse the `minutes` query parameter; absent means the default window
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw {
            None => Ok(Self::default()),
            Some(raw) => {
                let minutes = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| TelemetryError::invalid_window("minutes must be an integer"))?;
                Self::from_minutes(minutes)
            }
        }
    }

    pub fn minutes(&self) -> i64 {
        self.minutes
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes)
    }

    /// Inclusive bounds relative to `now`
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now - self.duration(), now)
    }

    pub fn contains(&self, now: DateTime<Utc>, at: DateTime<Utc>) -> bool {
        let (start, end) = self.bounds(now);
        at >= start && at <= end
    }
}

/// Summary statistics for one window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSummary {
    pub sample_count: usize,
    pub total_requests: u64,
    pub total_errors: u64,
    /// Percentage of requests that errored; 0 when there were no requests
    pub error_rate: f64,
    pub avg_latency_ms: f64,
    pub avg_p95_latency_ms: f64,
    pub avg_cpu_percent: f64,
    pub avg_memory_percent: f64,
    pub avg_uptime_percent: f64,
}

impl WindowSummary {
    /// Summarize a non-empty slice of samples
    fn from_samples(samples: &[&Sample]) -> Self {
        let n = samples.len() as f64;
        let mut total_requests: u64 = 0;
        let mut total_errors: u64 = 0;
        let (mut latency, mut p95, mut cpu, mut memory, mut uptime) = (0.0, 0.0, 0.0, 0.0, 0.0);

        for s in samples {
            total_requests = total_requests.saturating_add(s.request_count);
            total_errors = total_errors.saturating_add(s.error_count);
            latency += s.avg_latency_ms;
            p95 += s.p95_latency_ms;
            cpu += s.cpu_percent;
            memory += s.memory_percent;
            uptime += s.uptime_percent;
        }

        let error_rate = if total_requests > 0 {
            total_errors as f64 / total_requests as f64 * 100.0
        } else {
            0.0
        };

        Self {
            sample_count: samples.len(),
            total_requests,
            total_errors,
            error_rate,
            avg_latency_ms: latency / n,
            avg_p95_latency_ms: p95 / n,
            avg_cpu_percent: cpu / n,
            avg_memory_percent: memory / n,
            avg_uptime_percent: uptime / n,
        }
    }

    /// Copy with every real-valued statistic rounded to 2 decimal places
    pub fn rounded(&self) -> Self {
        Self {
            sample_count: self.sample_count,
            total_requests: self.total_requests,
            total_errors: self.total_errors,
            error_rate: round2(self.error_rate),
            avg_latency_ms: round2(self.avg_latency_ms),
            avg_p95_latency_ms: round2(self.avg_p95_latency_ms),
            avg_cpu_percent: round2(self.avg_cpu_percent),
            avg_memory_percent: round2(self.avg_memory_percent),
            avg_uptime_percent: round2(self.avg_uptime_percent),
        }
    }
}

/// Outcome of aggregating one window
#[derive(Debug, Clone, PartialEq)]
pub enum WindowAggregate {
    /// No samples captured inside the window
    NoData,
    Data {
        summary: WindowSummary,
        /// Most recently captured sample in the window, unrounded
        latest: Sample,
    },
}

/// Summarize the samples whose capture time falls inside `window` at `now`
///
/// Samples outside the window are ignored even if the store returned them.
/// Ties on capture time go to the sample received last.
pub fn aggregate(samples: &[Sample], window: LookbackWindow, now: DateTime<Utc>) -> WindowAggregate {
    let in_window: Vec<&Sample> = samples
        .iter()
        .filter(|s| window.contains(now, s.captured_at))
        .collect();

    let latest = in_window
        .iter()
        .max_by_key(|s| (s.captured_at, s.received_at))
        .map(|s| (*s).clone());

    match latest {
        None => WindowAggregate::NoData,
        Some(latest) => WindowAggregate::Data {
            summary: WindowSummary::from_samples(&in_window),
            latest,
        },
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
