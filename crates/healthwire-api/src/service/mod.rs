//! Request services behind the HTTP handlers
//!
//! Services take `now` explicitly; handlers pass the wall clock.

pub mod health_query;
pub mod ingest;
pub mod verifier;

pub use health_query::HealthQueryService;
pub use ingest::{IngestRequest, IngestionPipeline};
pub use verifier::{Credentials, SignatureVerifier};
