use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{warn, Level};

use duckgate_core::{log_operation, Operation};
use duckgate_db::KeyStore;
use duckgate_provider::{DuckChatConfig, DuckChatProvider};
use duckgate_server::config::Config;
use duckgate_server::{logging, InnerAppState};

#[derive(Parser)]
#[command(name = "duckgate", version)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a new API key
    Keygen {
        /// Free-form note stored with the key
        #[arg(long)]
        description: Option<String>,
    },
    /// List all issued API keys
    ListKeys,
    /// Revoke (delete) an API key
    RevokeKey {
        /// The full key to revoke
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config;
    logging::init(&config);

    match cli.command {
        Some(command) => run_admin_command(command, &config).await,
        None => run_server(config).await,
    }
}

/// Key administration straight against the store, regardless of the bypass flag.
async fn run_admin_command(command: Commands, config: &Config) -> Result<()> {
    let keys = KeyStore::open(&config.db_config(), false)?;
    keys.initialize().await?;

    match command {
        Commands::Keygen { description } => {
            let api_key = keys.create(description.as_deref()).await?;
            eprintln!("Created API key (id: {})", api_key.id.unwrap_or_default());
            if let Some(description) = &api_key.description {
                eprintln!("  description: {description}");
            }
            // Print the raw key to stdout so it can be captured
            println!("{}", api_key.key);
        }
        Commands::ListKeys => {
            let all = keys.list_all().await?;
            if all.is_empty() {
                eprintln!("No API keys found.");
            } else {
                println!(
                    "{:<6} {:<34} {:<24} {:<26} {:>6} LAST USED",
                    "ID", "KEY", "DESCRIPTION", "CREATED", "USES"
                );
                for key in all {
                    println!(
                        "{:<6} {:<34} {:<24} {:<26} {:>6} {}",
                        key.id.unwrap_or_default(),
                        key.key,
                        key.description.as_deref().unwrap_or("-"),
                        key.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                        key.usage_count,
                        key.last_used_at
                            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                            .unwrap_or_else(|| "never".into()),
                    );
                }
            }
        }
        Commands::RevokeKey { key } => {
            if keys.delete(&key).await? {
                eprintln!("Revoked API key");
            } else {
                anyhow::bail!("API key not found");
            }
        }
    }
    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .with_context(|| format!("invalid HOST {:?}", config.host))?,
        config.port,
    );

    if config.uses_default_admin_token() {
        warn!("ADMIN_TOKEN is the built-in default; set a secret before exposing the server");
    }
    if config.ignore_api_keys {
        warn!("IGNORE_API_KEYS is set: every request is accepted without a key");
    }

    let keys = KeyStore::open(&config.db_config(), config.ignore_api_keys)?;
    keys.initialize().await?;

    let provider = Arc::new(DuckChatProvider::new(DuckChatConfig::default())?);
    let mode = config.db_mode();
    let state = InnerAppState::new(config, keys, provider);

    let listener = TcpListener::bind(addr).await?;
    log_operation(
        Level::INFO,
        Operation::ServerStart,
        format!("listening on http://{addr}, db mode: {mode}"),
    );

    duckgate_server::serve(listener, state).await
}
