//! Healthwire core
//!
//! Domain types and the pure parts of the health pipeline:
//!
//! - **Model** (`model`): registered clients and their samples
//! - **Validation** (`validation`): untyped payload → validated sample
//! - **Aggregation** (`aggregate`): trailing-window summary statistics
//! - **Rules** (`rules`): threshold merge and two-tier classification
//! - **Report** (`report`): the health report returned to operators
//! - **Config** (`config`): service configuration loaded at startup
//!
//! Nothing in this crate performs I/O except [`config::ServiceConfig::from_file`].

pub mod aggregate;
pub mod config;
pub mod error;
pub mod model;
pub mod report;
pub mod rules;
pub mod validation;

pub use aggregate::{aggregate, LookbackWindow, WindowAggregate, WindowSummary};
pub use config::{ConfigError, LogFormat, ServiceConfig, StorageBackend};
pub use error::{AuthFailure, Result, TelemetryError};
pub use model::{Client, Metadata, RuleOverrides, Sample};
pub use report::{HealthReport, LatestSample};
pub use rules::{classify, Breach, HealthRules, HealthStatus, Severity, Verdict};
pub use validation::{SampleValidator, ValidatedSample};
