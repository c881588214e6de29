mod api_keys;
pub(crate) mod migrations;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::Level;

use duckgate_core::{log_operation, ApiKey, Operation};

use crate::{Database, DbError, DbMode};

/// Extension trait that converts `rusqlite::Result<T>` into `Result<T, DbError>`.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

/// Map a `rusqlite::Error` into a `DbError::Internal`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    DbError::Internal(e.to_string())
}

/// Embedded file-backed key store.
///
/// No connection outlives a single call. All writes in this process go
/// through `write_lock`, so a validate can never interleave with another
/// write to the same file.
#[derive(Clone)]
pub struct SqliteDatabase {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteDatabase {
    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, DbError> {
        log_operation(Level::DEBUG, Operation::DatabaseConnect, "SQLite");
        let conn = Connection::open(&self.path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        Ok(conn)
    }

    /// Run a read on a fresh connection that is dropped (closed) on return.
    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    /// Run `f` in an immediate transaction on a fresh connection while
    /// holding the write lock. Commits if `f` succeeds, rolls back and
    /// returns the original error otherwise.
    pub(crate) fn with_tx<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, DbError>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .to_db()?;
        let outcome = f(&tx);
        match outcome {
            Ok(value) => {
                tx.commit().to_db()?;
                Ok(value)
            }
            Err(e) => {
                log_operation(Level::ERROR, Operation::Error, format!("SQLite: {e}"));
                if let Err(rb) = tx.rollback() {
                    log_operation(Level::ERROR, Operation::Error, format!("rollback failed: {rb}"));
                }
                Err(e)
            }
        }
    }

    async fn run_blocking<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&SqliteDatabase) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn mode(&self) -> DbMode {
        DbMode::Sqlite
    }

    async fn initialize(&self) -> Result<(), DbError> {
        self.run_blocking(|db| db.initialize_sync()).await
    }

    async fn insert_api_key(
        &self,
        key: &str,
        description: Option<&str>,
    ) -> Result<ApiKey, DbError> {
        let key = key.to_string();
        let description = description.map(str::to_string);
        self.run_blocking(move |db| db.insert_api_key_sync(&key, description.as_deref()))
            .await
    }

    async fn delete_api_key(&self, key: &str) -> Result<bool, DbError> {
        let key = key.to_string();
        self.run_blocking(move |db| db.delete_api_key_sync(&key)).await
    }

    async fn validate_api_key(&self, key: &str) -> Result<bool, DbError> {
        let key = key.to_string();
        self.run_blocking(move |db| db.validate_api_key_sync(&key)).await
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError> {
        self.run_blocking(|db| db.list_api_keys_sync()).await
    }
}
