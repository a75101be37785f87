//! Client provisioning commands
//!
//! These mutate the durable store directly, so they refuse to run against
//! the in-memory backend where the result would vanish on exit. Sled holds
//! an exclusive lock on its directory; stop the server before provisioning.

use anyhow::{anyhow, bail, Context};
use secrecy::ExposeSecret;

use healthwire_core::{Client, HealthRules, RuleOverrides, ServiceConfig, StorageBackend};
use healthwire_security::{generate_api_key, generate_secret};
use healthwire_storage::{open_store, ClientStore, StorageError, TelemetryStore};

use std::sync::Arc;

fn durable_store(config: &ServiceConfig) -> anyhow::Result<Arc<dyn TelemetryStore>> {
    if config.storage.backend == StorageBackend::Memory {
        bail!("Client commands need a durable store: pass --storage-path or configure storage.backend = \"sled\"");
    }
    open_store(&config.storage).context("failed to open storage")
}

/// Parse `--rules` into overrides, rejecting anything that would not yield
/// a usable rule set when merged over the defaults
pub fn parse_overrides(raw: Option<&str>, defaults: &HealthRules) -> anyhow::Result<RuleOverrides> {
    let Some(raw) = raw else {
        return Ok(RuleOverrides::new());
    };
    let value: serde_json::Value =
        serde_json::from_str(raw).context("--rules must be valid JSON")?;
    let overrides = match value {
        serde_json::Value::Object(map) => map,
        _ => bail!("--rules must be a JSON object"),
    };
    defaults
        .with_overrides(&overrides)
        .validate()
        .map_err(|e| anyhow!("--rules produce an invalid rule set: {}", e))?;
    Ok(overrides)
}

/// Register `name` with fresh credentials and return the stored client
pub async fn register_client(
    store: &dyn TelemetryStore,
    name: &str,
    overrides: RuleOverrides,
) -> anyhow::Result<Client> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Client name must not be empty");
    }

    let api_key = generate_api_key()?;
    let secret = generate_secret()?;
    let client = Client::new(name, api_key, secret.expose_secret().clone(), overrides);

    match store.create_client(client.clone()).await {
        Ok(()) => {
            tracing::info!(client = %client.name, "Client created");
            Ok(client)
        }
        Err(StorageError::UniqueViolation(_)) => bail!("Client '{}' already exists", name),
        Err(e) => Err(e.into()),
    }
}

pub async fn create(config: &ServiceConfig, name: &str, rules: Option<&str>) -> anyhow::Result<()> {
    let overrides = parse_overrides(rules, &config.rules)?;
    let store = durable_store(config)?;
    let client = register_client(store.as_ref(), name, overrides).await?;

    println!("Created client: {}", client.name);
    println!("API key: {}", client.api_key);
    println!("Secret : {}", client.secret.expose_secret());
    println!();
    println!("The secret is shown only once. Store it now.");
    Ok(())
}

pub async fn deactivate_client(store: &dyn TelemetryStore, name: &str) -> anyhow::Result<Client> {
    let name = name.trim();
    match store.deactivate_client(name).await {
        Ok(client) => {
            tracing::info!(client = %client.name, "Client deactivated");
            Ok(client)
        }
        Err(StorageError::NotFound(_)) => bail!("Client '{}' not found", name),
        Err(e) => Err(e.into()),
    }
}

pub async fn deactivate(config: &ServiceConfig, name: &str) -> anyhow::Result<()> {
    let store = durable_store(config)?;
    let client = deactivate_client(store.as_ref(), name).await?;
    println!("Deactivated client: {}", client.name);
    Ok(())
}

pub async fn list(config: &ServiceConfig) -> anyhow::Result<()> {
    let store = durable_store(config)?;
    let clients = store.list_clients().await?;
    if clients.is_empty() {
        println!("No clients registered");
        return Ok(());
    }

    println!("{:<24} {:<34} {:<8} CREATED", "NAME", "API KEY", "ACTIVE");
    for client in clients {
        println!(
            "{:<24} {:<34} {:<8} {}",
            client.name,
            client.api_key,
            if client.is_active { "yes" } else { "no" },
            client.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}
