mod api_keys;
pub(crate) mod migrations;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use sqlx::{Connection, PgConnection};
use tracing::Level;

use duckgate_core::{log_operation, ApiKey, Operation};

use crate::{Database, DbError, DbMode};

/// Map a sqlx::Error into a DbError::Internal.
pub(crate) fn pg_err(e: sqlx::Error) -> DbError {
    DbError::Internal(e.to_string())
}

/// Connections require TLS unless the URL picks its own `sslmode`.
pub(crate) fn require_tls(url: &str) -> String {
    let has_sslmode = url
        .split_once('?')
        .map(|(_, query)| query.split('&').any(|p| p.starts_with("sslmode=")))
        .unwrap_or(false);
    if has_sslmode {
        url.to_string()
    } else if url.contains('?') {
        format!("{url}&sslmode=require")
    } else {
        format!("{url}?sslmode=require")
    }
}

/// External relational key store.
///
/// Connections are not pooled: each call connects, runs one transaction and
/// closes the connection. Per-row serialization of concurrent validations is
/// left to Postgres row locks on `UPDATE ... RETURNING`.
#[derive(Clone)]
pub struct PostgresDatabase {
    url: String,
}

impl PostgresDatabase {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    async fn connect(&self) -> Result<PgConnection, DbError> {
        log_operation(Level::DEBUG, Operation::DatabaseConnect, "PostgreSQL");
        PgConnection::connect(&require_tls(&self.url))
            .await
            .map_err(pg_err)
    }

    /// Run `f` inside a transaction on a dedicated connection. Commits when
    /// `f` succeeds, rolls back and returns the original error otherwise, and
    /// closes the connection on every path.
    pub(crate) async fn with_tx<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, DbError>> + Send,
        T: Send,
    {
        let mut conn = self.connect().await?;
        let result = run_in_tx(&mut conn, f).await;
        if let Err(e) = conn.close().await {
            tracing::warn!("failed to close postgres connection: {e}");
        }
        result
    }
}

async fn run_in_tx<F, T>(conn: &mut PgConnection, f: F) -> Result<T, DbError>
where
    F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, DbError>> + Send,
    T: Send,
{
    let mut tx = conn.begin().await.map_err(pg_err)?;
    let outcome = f(&mut *tx).await;
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(pg_err)?;
            Ok(value)
        }
        Err(e) => {
            log_operation(Level::ERROR, Operation::Error, format!("PostgreSQL: {e}"));
            if let Err(rb) = tx.rollback().await {
                log_operation(Level::ERROR, Operation::Error, format!("rollback failed: {rb}"));
            }
            Err(e)
        }
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    fn mode(&self) -> DbMode {
        DbMode::Postgres
    }

    async fn initialize(&self) -> Result<(), DbError> {
        self.with_tx(|conn| Box::pin(async move { migrations::run(&mut *conn).await }))
            .await
    }

    async fn insert_api_key(
        &self,
        key: &str,
        description: Option<&str>,
    ) -> Result<ApiKey, DbError> {
        self.pg_insert_api_key(key, description).await
    }

    async fn delete_api_key(&self, key: &str) -> Result<bool, DbError> {
        self.pg_delete_api_key(key).await
    }

    async fn validate_api_key(&self, key: &str) -> Result<bool, DbError> {
        self.pg_validate_api_key(key).await
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError> {
        self.pg_list_api_keys().await
    }
}

#[cfg(test)]
mod tests {
    use super::require_tls;

    #[test]
    fn tls_is_required_by_default() {
        assert_eq!(
            require_tls("postgres://u:p@db.example/keys"),
            "postgres://u:p@db.example/keys?sslmode=require"
        );
        assert_eq!(
            require_tls("postgres://db.example/keys?application_name=duckgate"),
            "postgres://db.example/keys?application_name=duckgate&sslmode=require"
        );
    }

    #[test]
    fn explicit_sslmode_is_kept() {
        let url = "postgres://localhost/keys?sslmode=disable";
        assert_eq!(require_tls(url), url);
        let url = "postgres://localhost/keys?connect_timeout=5&sslmode=prefer";
        assert_eq!(require_tls(url), url);
    }
}
