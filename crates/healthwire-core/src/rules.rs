//! Threshold rules and health classification
//!
//! [`HealthRules`] is built once at startup (from config, falling back to the
//! fixed defaults) and passed by reference. Per-client overrides are merged
//! into a fresh copy on every evaluation; nothing here holds state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregate::WindowSummary;
use crate::model::RuleOverrides;

/// Threshold set used to classify a window summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthRules {
    pub max_error_rate: f64,
    pub max_p95_latency_ms: f64,
    pub min_uptime_percent: f64,
    pub max_cpu_percent: f64,
    pub max_memory_percent: f64,
}

impl Default for HealthRules {
    fn default() -> Self {
        Self {
            max_error_rate: 2.0,
            max_p95_latency_ms: 800.0,
            min_uptime_percent: 99.0,
            max_cpu_percent: 90.0,
            max_memory_percent: 90.0,
        }
    }
}

impl HealthRules {
    /// Recognized threshold names, as accepted in client overrides
    pub const NAMES: [&'static str; 5] = [
        "max_error_rate",
        "max_p95_latency_ms",
        "min_uptime_percent",
        "max_cpu_percent",
        "max_memory_percent",
    ];

    fn slot_mut(&mut self, name: &str) -> Option<&mut f64> {
        match name {
            "max_error_rate" => Some(&mut self.max_error_rate),
            "max_p95_latency_ms" => Some(&mut self.max_p95_latency_ms),
            "min_uptime_percent" => Some(&mut self.min_uptime_percent),
            "max_cpu_percent" => Some(&mut self.max_cpu_percent),
            "max_memory_percent" => Some(&mut self.max_memory_percent),
            _ => None,
        }
    }

    /// Effective rule set: `self` with each recognized, numeric override applied
    ///
    /// Unknown keys and values that do not coerce to a finite number are
    /// skipped and the existing value is kept.
    pub fn with_overrides(&self, overrides: &RuleOverrides) -> HealthRules {
        let mut effective = *self;
        for (key, value) in overrides {
            let Some(slot) = effective.slot_mut(key) else {
                tracing::debug!(rule = %key, "Ignoring unrecognized rule override");
                continue;
            };
            match coerce_threshold(value) {
                Some(v) => *slot = v,
                None => tracing::debug!(rule = %key, "Ignoring non-numeric rule override"),
            }
        }
        effective
    }

    /// Reject thresholds that cannot be compared meaningfully
    pub fn validate(&self) -> Result<(), String> {
        let values = [
            ("max_error_rate", self.max_error_rate),
            ("max_p95_latency_ms", self.max_p95_latency_ms),
            ("min_uptime_percent", self.min_uptime_percent),
            ("max_cpu_percent", self.max_cpu_percent),
            ("max_memory_percent", self.max_memory_percent),
        ];
        for (name, value) in values {
            if !value.is_finite() {
                return Err(format!("rules.{} must be a finite number", name));
            }
        }
        Ok(())
    }
}

fn coerce_threshold(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Overall verdict for a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    /// No samples in the window; no rules were evaluated
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Critical,
}

/// A rule that a summary can breach
///
/// Declaration order is the reporting order of breached rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Breach {
    ErrorRate,
    Uptime,
    Latency,
    Cpu,
    Memory,
}

impl Breach {
    pub const ALL: [Breach; 5] = [
        Breach::ErrorRate,
        Breach::Uptime,
        Breach::Latency,
        Breach::Cpu,
        Breach::Memory,
    ];

    pub fn severity(&self) -> Severity {
        match self {
            Breach::ErrorRate | Breach::Uptime => Severity::Critical,
            Breach::Latency | Breach::Cpu | Breach::Memory => Severity::Warning,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Breach::ErrorRate => "error_rate",
            Breach::Uptime => "uptime",
            Breach::Latency => "latency",
            Breach::Cpu => "cpu",
            Breach::Memory => "memory",
        }
    }

    /// Whether this trigger fires for `summary` under `rules`
    pub fn fires(&self, summary: &WindowSummary, rules: &HealthRules) -> bool {
        match self {
            Breach::ErrorRate => summary.error_rate > rules.max_error_rate,
            Breach::Uptime => summary.avg_uptime_percent < rules.min_uptime_percent,
            Breach::Latency => summary.avg_p95_latency_ms > rules.max_p95_latency_ms,
            Breach::Cpu => summary.avg_cpu_percent > rules.max_cpu_percent,
            Breach::Memory => summary.avg_memory_percent > rules.max_memory_percent,
        }
    }
}

/// Classification result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub status: HealthStatus,
    pub breached: Vec<Breach>,
}

/// Classify a summary against an effective rule set
///
/// Every trigger is evaluated independently. The status is the highest
/// severity among those that fired and the breached list follows
/// [`Breach::ALL`] order regardless of severity.
pub fn classify(summary: &WindowSummary, rules: &HealthRules) -> Verdict {
    let breached: Vec<Breach> = Breach::ALL
        .into_iter()
        .filter(|b| b.fires(summary, rules))
        .collect();

    let status = match breached.iter().map(Breach::severity).max() {
        Some(Severity::Critical) => HealthStatus::Critical,
        Some(Severity::Warning) => HealthStatus::Warning,
        None => HealthStatus::Healthy,
    };

    Verdict { status, breached }
}
