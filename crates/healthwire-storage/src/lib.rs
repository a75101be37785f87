//! Healthwire storage
//!
//! Two collaborators back the service: a credential store resolving API
//! keys to clients, and a sample store enforcing `(client, event_id)`
//! uniqueness. Both are async traits so the HTTP layer can hold either
//! backend behind one `Arc`.
//!
//! - [`MemoryStore`]: process-local, for tests and ephemeral deployments
//! - [`SledStore`]: embedded durable store

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use healthwire_core::config::{StorageBackend, StorageConfig};
use healthwire_core::{Client, Sample};

/// Errors raised by a storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// A uniqueness constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Registered clients keyed by API key
#[async_trait::async_trait]
pub trait ClientStore: Send + Sync + fmt::Debug {
    /// Resolve an API key; inactive clients resolve to `None`
    async fn find_active_by_api_key(&self, api_key: &str) -> StorageResult<Option<Client>>;

    /// Register a client; name and API key must both be unused
    async fn create_client(&self, client: Client) -> StorageResult<()>;

    /// Mark a client inactive by name and return the updated record
    async fn deactivate_client(&self, name: &str) -> StorageResult<Client>;

    /// All clients, active or not, ordered by name
    async fn list_clients(&self) -> StorageResult<Vec<Client>>;
}

/// Samples keyed by `(client_id, event_id)`
#[async_trait::async_trait]
pub trait SampleStore: Send + Sync + fmt::Debug {
    /// Persist a sample
    ///
    /// Fails with [`StorageError::UniqueViolation`] when the client already
    /// has a sample with this event id. The check and the write are one
    /// atomic step, and durable backends persist the sample before
    /// returning.
    async fn insert_sample(&self, sample: Sample) -> StorageResult<()>;

    /// Samples for `client_id` with `start <= captured_at <= end`, oldest first
    async fn samples_in_window(
        &self,
        client_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Sample>>;

    async fn get_sample(&self, client_id: Uuid, event_id: &str) -> StorageResult<Option<Sample>>;
}

/// Both halves of the persistence layer
pub trait TelemetryStore: ClientStore + SampleStore {}

impl<T: ClientStore + SampleStore> TelemetryStore for T {}

/// Open the backend selected by `config`
pub fn open_store(config: &StorageConfig) -> StorageResult<Arc<dyn TelemetryStore>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory storage");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                StorageError::Backend("storage.path is required for the sled backend".to_string())
            })?;
            tracing::info!(path = %path.display(), "Opening sled storage");
            Ok(Arc::new(SledStore::open(path)?))
        }
    }
}
