//! Healthwire entry point
//!
//! Serves the telemetry API and manages client credentials.

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use healthwire_core::ServiceConfig;

#[derive(Parser)]
#[command(name = "healthwire")]
#[command(about = "Healthwire - signed telemetry ingestion and windowed health evaluation")]
#[command(version)]
struct Cli {
    /// Path to a TOML or YAML config file
    #[arg(short, long, global = true, env = "HEALTHWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Sled database directory; selects the sled backend
    #[arg(long, global = true, env = "HEALTHWIRE_DB_PATH")]
    storage_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Register a client and print its API key and secret
    CreateClient {
        /// Unique client name
        #[arg(short, long)]
        name: String,

        /// Per-client threshold overrides as a JSON object
        #[arg(long)]
        rules: Option<String>,
    },

    /// Deactivate a client; its key stops working immediately
    DeactivateClient {
        #[arg(short, long)]
        name: String,
    },

    /// List registered clients (secrets are never shown)
    ListClients,

    /// Print signing headers for a request body
    Sign {
        /// Client shared secret
        #[arg(long, env = "HEALTHWIRE_SECRET")]
        secret: String,

        /// File holding the exact request body
        #[arg(long)]
        body_file: PathBuf,

        /// Unix timestamp to sign with; defaults to now
        #[arg(long)]
        timestamp: Option<i64>,
    },
}

fn load_config(path: Option<&PathBuf>, storage_path: Option<PathBuf>) -> anyhow::Result<ServiceConfig> {
    let mut config = match path {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(storage_path) = storage_path {
        config.storage.backend = healthwire_core::StorageBackend::Sled;
        config.storage.path = Some(storage_path);
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref(), cli.storage_path)?;

    logging::init(&config.logging);

    match cli.command {
        Commands::Serve { port, host } => {
            let mut config = config;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            commands::serve::run(config).await?;
        }
        Commands::CreateClient { name, rules } => {
            commands::clients::create(&config, &name, rules.as_deref()).await?;
        }
        Commands::DeactivateClient { name } => {
            commands::clients::deactivate(&config, &name).await?;
        }
        Commands::ListClients => {
            commands::clients::list(&config).await?;
        }
        Commands::Sign {
            secret,
            body_file,
            timestamp,
        } => {
            commands::sign::run(&secret, &body_file, timestamp)?;
        }
    }

    Ok(())
}
