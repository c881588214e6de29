use std::sync::Arc;

use tracing::Level;

use duckgate_core::api_key::{generate_api_key, mask_key};
use duckgate_core::{log_operation, ApiKey, Operation};

use crate::{Database, DbConfig, DbError, DbMode};

/// Key lifecycle over a `Database` backend.
///
/// A bypass store has no backend at all: every key is valid, nothing is
/// persisted, and listing is always empty.
#[derive(Clone)]
pub struct KeyStore {
    backend: Option<Arc<dyn Database>>,
}

impl KeyStore {
    pub fn new(backend: Arc<dyn Database>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn bypass() -> Self {
        Self { backend: None }
    }

    /// Build the store for a deployment. With `bypass` set the backend is
    /// never opened.
    pub fn open(config: &DbConfig, bypass: bool) -> Result<Self, DbError> {
        if bypass {
            return Ok(Self::bypass());
        }
        Ok(Self::new(crate::open(config)?))
    }

    pub fn is_bypass(&self) -> bool {
        self.backend.is_none()
    }

    pub fn mode(&self) -> Option<DbMode> {
        self.backend.as_ref().map(|db| db.mode())
    }

    pub async fn initialize(&self) -> Result<(), DbError> {
        let Some(db) = &self.backend else {
            log_operation(Level::INFO, Operation::DatabaseInit, "key checks bypassed, no database");
            return Ok(());
        };
        log_operation(Level::INFO, Operation::DatabaseInit, format!("mode: {}", db.mode()));
        db.initialize().await?;
        log_operation(Level::INFO, Operation::DatabaseInit, "key table ready");
        Ok(())
    }

    /// Issue a fresh random key.
    pub async fn create(&self, description: Option<&str>) -> Result<ApiKey, DbError> {
        let key = generate_api_key();
        let Some(db) = &self.backend else {
            return Ok(ApiKey::unsaved(key, description.map(str::to_string)));
        };
        let created = db.insert_api_key(&key, description).await?;
        log_operation(Level::INFO, Operation::ApiKeyCreate, mask_key(&created.key));
        Ok(created)
    }

    pub async fn delete(&self, key: &str) -> Result<bool, DbError> {
        let Some(db) = &self.backend else {
            return Ok(true);
        };
        let deleted = db.delete_api_key(key).await?;
        let outcome = if deleted { "deleted" } else { "not found" };
        log_operation(
            Level::INFO,
            Operation::ApiKeyDelete,
            format!("{} {outcome}", mask_key(key)),
        );
        Ok(deleted)
    }

    pub async fn validate(&self, key: &str) -> Result<bool, DbError> {
        let Some(db) = &self.backend else {
            return Ok(true);
        };
        let valid = db.validate_api_key(key).await?;
        let outcome = if valid { "ok" } else { "rejected" };
        log_operation(
            Level::DEBUG,
            Operation::ApiKeyValidate,
            format!("{} {outcome}", mask_key(key)),
        );
        Ok(valid)
    }

    pub async fn list_all(&self) -> Result<Vec<ApiKey>, DbError> {
        let Some(db) = &self.backend else {
            return Ok(Vec::new());
        };
        let keys = db.list_api_keys().await?;
        log_operation(
            Level::DEBUG,
            Operation::DatabaseConnect,
            format!("fetched {} API keys", keys.len()),
        );
        Ok(keys)
    }
}
