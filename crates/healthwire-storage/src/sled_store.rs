//! Durable store on sled
//!
//! Trees:
//!
//! | tree           | key                                      | value          |
//! |----------------|------------------------------------------|----------------|
//! | `clients`      | api key                                  | client (JSON)  |
//! | `client_names` | client name                              | api key        |
//! | `samples`      | client id ‖ event id                     | sample (JSON)  |
//! | `sample_index` | client id ‖ captured_at (µs) ‖ event id  | empty          |
//!
//! The capture time in the index is big-endian with the sign bit flipped,
//! so lexicographic key order is chronological order.

use chrono::{DateTime, Utc};
use sled::transaction::{abort, ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use uuid::Uuid;

use healthwire_core::{Client, Sample};

use crate::{ClientStore, SampleStore, StorageError, StorageResult};

const CLIENT_ID_LEN: usize = 16;
const TIME_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    clients: Tree,
    client_names: Tree,
    samples: Tree,
    sample_index: Tree,
}

fn sample_key(client_id: Uuid, event_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(CLIENT_ID_LEN + event_id.len());
    key.extend_from_slice(client_id.as_bytes());
    key.extend_from_slice(event_id.as_bytes());
    key
}

fn encode_time(at: DateTime<Utc>) -> [u8; TIME_LEN] {
    ((at.timestamp_micros() as u64) ^ (1 << 63)).to_be_bytes()
}

fn index_prefix(client_id: Uuid, at: DateTime<Utc>) -> Vec<u8> {
    let mut key = Vec::with_capacity(CLIENT_ID_LEN + TIME_LEN);
    key.extend_from_slice(client_id.as_bytes());
    key.extend_from_slice(&encode_time(at));
    key
}

fn index_key(sample: &Sample) -> Vec<u8> {
    let mut key = index_prefix(sample.client_id, sample.captured_at);
    key.extend_from_slice(sample.event_id.as_bytes());
    key
}

/// Recover the `samples` key from an index key
fn sample_key_from_index(index_key: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(index_key.len().saturating_sub(TIME_LEN));
    key.extend_from_slice(&index_key[..CLIENT_ID_LEN]);
    key.extend_from_slice(&index_key[CLIENT_ID_LEN + TIME_LEN..]);
    key
}

fn flatten<E>(err: TransactionError<E>) -> StorageError
where
    StorageError: From<E>,
{
    match err {
        TransactionError::Abort(e) => e.into(),
        TransactionError::Storage(e) => e.into(),
    }
}

impl SledStore {
    /// Open (or create) a database at `path`
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Throwaway database, removed on drop
    pub fn temporary() -> StorageResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StorageResult<Self> {
        Ok(Self {
            clients: db.open_tree("clients")?,
            client_names: db.open_tree("client_names")?,
            samples: db.open_tree("samples")?,
            sample_index: db.open_tree("sample_index")?,
            db,
        })
    }

    fn decode_client(bytes: &[u8]) -> StorageResult<Client> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn decode_sample(bytes: &[u8]) -> StorageResult<Sample> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[async_trait::async_trait]
impl ClientStore for SledStore {
    async fn find_active_by_api_key(&self, api_key: &str) -> StorageResult<Option<Client>> {
        match self.clients.get(api_key.as_bytes())? {
            Some(bytes) => {
                let client = Self::decode_client(&bytes)?;
                Ok(client.is_active.then_some(client))
            }
            None => Ok(None),
        }
    }

    async fn create_client(&self, client: Client) -> StorageResult<()> {
        let value = serde_json::to_vec(&client)?;
        let key = client.api_key.as_bytes();
        let name = client.name.as_bytes();

        (&self.clients, &self.client_names)
            .transaction(|(clients, names)| {
                if names.get(name)?.is_some() {
                    return abort(StorageError::UniqueViolation(format!(
                        "client name '{}'",
                        client.name
                    )));
                }
                if clients.get(key)?.is_some() {
                    return abort(StorageError::UniqueViolation("client api key".to_string()));
                }
                clients.insert(key, value.as_slice())?;
                names.insert(name, key)?;
                Ok(())
            })
            .map_err(flatten)?;

        self.db.flush_async().await?;
        Ok(())
    }

    async fn deactivate_client(&self, name: &str) -> StorageResult<Client> {
        let api_key = self
            .client_names
            .get(name.as_bytes())?
            .ok_or_else(|| StorageError::NotFound(format!("client '{}'", name)))?;
        let bytes = self
            .clients
            .get(&api_key)?
            .ok_or_else(|| StorageError::NotFound(format!("client '{}'", name)))?;

        let mut client = Self::decode_client(&bytes)?;
        client.is_active = false;
        self.clients.insert(&api_key, serde_json::to_vec(&client)?)?;
        self.db.flush_async().await?;
        Ok(client)
    }

    async fn list_clients(&self) -> StorageResult<Vec<Client>> {
        // client_names iterates in name order
        let mut all = Vec::new();
        for entry in self.client_names.iter() {
            let (_, api_key) = entry?;
            if let Some(bytes) = self.clients.get(&api_key)? {
                all.push(Self::decode_client(&bytes)?);
            }
        }
        Ok(all)
    }
}

#[async_trait::async_trait]
impl SampleStore for SledStore {
    async fn insert_sample(&self, sample: Sample) -> StorageResult<()> {
        let key = sample_key(sample.client_id, &sample.event_id);
        let idx = index_key(&sample);
        let value = serde_json::to_vec(&sample)?;

        (&self.samples, &self.sample_index)
            .transaction(|(samples, index)| {
                if samples.get(&key)?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        StorageError::UniqueViolation(format!("event_id '{}'", sample.event_id)),
                    ));
                }
                samples.insert(key.as_slice(), value.as_slice())?;
                index.insert(idx.as_slice(), &[] as &[u8])?;
                Ok(())
            })
            .map_err(flatten)?;

        self.db.flush_async().await?;
        Ok(())
    }

    async fn samples_in_window(
        &self,
        client_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Sample>> {
        let lower = index_prefix(client_id, start);
        let mut upper = index_prefix(client_id, end);
        // UTF-8 never contains 0xFF, so this sorts after every event id at `end`
        upper.push(0xFF);

        let mut found = Vec::new();
        for entry in self.sample_index.range(lower..upper) {
            let (idx, _) = entry?;
            if let Some(bytes) = self.samples.get(sample_key_from_index(&idx))? {
                found.push(Self::decode_sample(&bytes)?);
            }
        }
        Ok(found)
    }

    async fn get_sample(&self, client_id: Uuid, event_id: &str) -> StorageResult<Option<Sample>> {
        match self.samples.get(sample_key(client_id, event_id))? {
            Some(bytes) => Ok(Some(Self::decode_sample(&bytes)?)),
            None => Ok(None),
        }
    }
}
