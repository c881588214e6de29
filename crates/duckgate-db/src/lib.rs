#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;
mod store;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use duckgate_core::ApiKey;

#[cfg(feature = "postgres")]
pub use postgres::PostgresDatabase;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use store::KeyStore;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} backend is not compiled in")]
    BackendDisabled(&'static str),
}

/// Which relational backend holds the key table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbMode {
    Sqlite,
    Postgres,
}

impl DbMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbMode::Sqlite => "SQLite",
            DbMode::Postgres => "PostgreSQL",
        }
    }
}

impl fmt::Display for DbMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage settings. A connection URL selects Postgres; otherwise the
/// embedded SQLite file at `sqlite_path` is used.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: Option<String>,
    pub sqlite_path: PathBuf,
}

impl DbConfig {
    pub fn mode(&self) -> DbMode {
        match self.database_url.as_deref() {
            Some(url) if !url.is_empty() => DbMode::Postgres,
            _ => DbMode::Sqlite,
        }
    }
}

/// CRUD surface over the key table. Every call opens its own connection and
/// closes it before returning.
#[async_trait]
pub trait Database: Send + Sync {
    fn mode(&self) -> DbMode;

    /// Create the key table if it is missing. Safe to call repeatedly.
    async fn initialize(&self) -> Result<(), DbError>;

    async fn insert_api_key(
        &self,
        key: &str,
        description: Option<&str>,
    ) -> Result<ApiKey, DbError>;

    /// Returns whether a row was removed.
    async fn delete_api_key(&self, key: &str) -> Result<bool, DbError>;

    /// Atomically bump `usage_count` and `last_used_at` when `key` exists.
    /// Returns whether it exists; a miss touches nothing.
    async fn validate_api_key(&self, key: &str) -> Result<bool, DbError>;

    /// All keys, newest first.
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError>;
}

/// Open the backend selected by `config`.
pub fn open(config: &DbConfig) -> Result<Arc<dyn Database>, DbError> {
    match config.mode() {
        DbMode::Postgres => open_postgres(config),
        DbMode::Sqlite => open_sqlite(config),
    }
}

#[cfg(feature = "postgres")]
fn open_postgres(config: &DbConfig) -> Result<Arc<dyn Database>, DbError> {
    let url = config.database_url.clone().unwrap_or_default();
    Ok(Arc::new(PostgresDatabase::new(url)))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(_config: &DbConfig) -> Result<Arc<dyn Database>, DbError> {
    Err(DbError::BackendDisabled("postgres"))
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &DbConfig) -> Result<Arc<dyn Database>, DbError> {
    Ok(Arc::new(SqliteDatabase::open_path(&config.sqlite_path)?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &DbConfig) -> Result<Arc<dyn Database>, DbError> {
    Err(DbError::BackendDisabled("sqlite"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_follows_database_url() {
        let mut config = DbConfig {
            database_url: None,
            sqlite_path: PathBuf::from("api_keys.db"),
        };
        assert_eq!(config.mode(), DbMode::Sqlite);

        config.database_url = Some(String::new());
        assert_eq!(config.mode(), DbMode::Sqlite);

        config.database_url = Some("postgres://localhost/keys".into());
        assert_eq!(config.mode(), DbMode::Postgres);
    }

    #[test]
    fn mode_labels() {
        assert_eq!(DbMode::Sqlite.to_string(), "SQLite");
        assert_eq!(DbMode::Postgres.as_str(), "PostgreSQL");
    }
}
