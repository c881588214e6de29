use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::Parser;
use duckgate_core::model::{DEFAULT_MODEL, KNOWN_MODELS};
use duckgate_core::ModelCatalog;
use duckgate_db::{DbConfig, DbMode};

pub const DEFAULT_ADMIN_TOKEN: &str = "your-super-secret-admin-token";

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, Parser)]
#[command(name = "duckgate", about = "OpenAI-compatible gateway for DuckDuckGo AI chat")]
pub struct Config {
    /// Verbose logging
    #[arg(long, env = "DEBUG", value_parser = BoolishValueParser::new())]
    pub debug: bool,

    /// Skip every API key check. For trusted deployments only.
    #[arg(long, env = "IGNORE_API_KEYS", value_parser = BoolishValueParser::new())]
    pub ignore_api_keys: bool,

    /// Bearer token for the key management routes
    #[arg(long, env = "ADMIN_TOKEN", default_value = DEFAULT_ADMIN_TOKEN, hide_env_values = true)]
    pub admin_token: String,

    /// Postgres connection string. When unset keys live in SQLite.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// SQLite database file
    #[arg(long, env = "SQLITE_DB_PATH", default_value = "api_keys.db")]
    pub sqlite_db_path: PathBuf,

    /// Model used when a request names none or an unknown one
    #[arg(long, env = "DEFAULT_MODEL", default_value = DEFAULT_MODEL)]
    pub default_model: String,

    /// Comma-separated allow-list of model names
    #[arg(long, env = "AVAILABLE_MODELS", value_delimiter = ',', default_values_t = known_models())]
    pub available_models: Vec<String>,

    /// trace, debug, info, warn or error. RUST_LOG takes precedence.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Comma-separated allowed origins, `*` for any
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,
}

fn known_models() -> Vec<String> {
    KNOWN_MODELS.iter().map(|m| m.to_string()).collect()
}

impl Config {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            database_url: self.database_url.clone(),
            sqlite_path: self.sqlite_db_path.clone(),
        }
    }

    /// Backend reported by `/health`, whether or not key checks are bypassed.
    pub fn db_mode(&self) -> DbMode {
        self.db_config().mode()
    }

    pub fn model_catalog(&self) -> ModelCatalog {
        let available = self
            .available_models
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
        ModelCatalog::new(self.default_model.trim(), available)
    }

    pub fn uses_default_admin_token(&self) -> bool {
        self.admin_token == DEFAULT_ADMIN_TOKEN
    }

    /// Filter directive used when `RUST_LOG` is unset. Unknown levels fall
    /// back to `info`; `debug` raises anything quieter to `debug`.
    pub fn log_directive(&self) -> &'static str {
        let requested = self.log_level.trim().to_ascii_lowercase();
        let level = LEVELS
            .iter()
            .copied()
            .find(|l| *l == requested)
            .unwrap_or("info");
        if self.debug && !matches!(level, "trace" | "debug") {
            "debug"
        } else {
            level
        }
    }
}
