//! In-memory store

use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use healthwire_core::{Client, Sample};

use crate::{ClientStore, SampleStore, StorageError, StorageResult};

/// Process-local store; every operation takes one lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    clients: RwLock<HashMap<String, Client>>,
    samples: RwLock<HashMap<(Uuid, String), Sample>>,
}

fn read<T>(lock: &RwLock<T>) -> StorageResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| StorageError::Backend("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> StorageResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| StorageError::Backend("lock poisoned".to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ClientStore for MemoryStore {
    async fn find_active_by_api_key(&self, api_key: &str) -> StorageResult<Option<Client>> {
        let clients = read(&self.clients)?;
        Ok(clients.get(api_key).filter(|c| c.is_active).cloned())
    }

    async fn create_client(&self, client: Client) -> StorageResult<()> {
        let mut clients = write(&self.clients)?;
        if clients.values().any(|c| c.name == client.name) {
            return Err(StorageError::UniqueViolation(format!(
                "client name '{}'",
                client.name
            )));
        }
        match clients.entry(client.api_key.clone()) {
            Entry::Occupied(_) => Err(StorageError::UniqueViolation("client api key".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(client);
                Ok(())
            }
        }
    }

    async fn deactivate_client(&self, name: &str) -> StorageResult<Client> {
        let mut clients = write(&self.clients)?;
        let client = clients
            .values_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| StorageError::NotFound(format!("client '{}'", name)))?;
        client.is_active = false;
        Ok(client.clone())
    }

    async fn list_clients(&self) -> StorageResult<Vec<Client>> {
        let clients = read(&self.clients)?;
        let mut all: Vec<Client> = clients.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

#[async_trait::async_trait]
impl SampleStore for MemoryStore {
    async fn insert_sample(&self, sample: Sample) -> StorageResult<()> {
        let mut samples = write(&self.samples)?;
        match samples.entry((sample.client_id, sample.event_id.clone())) {
            Entry::Occupied(_) => Err(StorageError::UniqueViolation(format!(
                "event_id '{}'",
                sample.event_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(sample);
                Ok(())
            }
        }
    }

    async fn samples_in_window(
        &self,
        client_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Sample>> {
        let samples = read(&self.samples)?;
        let mut found: Vec<Sample> = samples
            .values()
            .filter(|s| s.client_id == client_id && s.captured_at >= start && s.captured_at <= end)
            .cloned()
            .collect();
        found.sort_by_key(|s| s.captured_at);
        Ok(found)
    }

    async fn get_sample(&self, client_id: Uuid, event_id: &str) -> StorageResult<Option<Sample>> {
        let samples = read(&self.samples)?;
        Ok(samples.get(&(client_id, event_id.to_string())).cloned())
    }
}
