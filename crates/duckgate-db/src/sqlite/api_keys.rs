use chrono::Utc;
use rusqlite::{params, Row};

use duckgate_core::ApiKey;

use super::{migrations, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_api_key(row: &Row) -> rusqlite::Result<ApiKey> {
    Ok(ApiKey {
        id: Some(row.get("id")?),
        key: row.get("key")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        last_used_at: row.get("last_used_at")?,
        usage_count: row.get("usage_count")?,
    })
}

impl SqliteDatabase {
    pub fn initialize_sync(&self) -> Result<(), DbError> {
        self.with_tx(|tx| migrations::run(tx))
    }

    /// Insert, then read the stored row back by rowid in the same transaction.
    pub fn insert_api_key_sync(
        &self,
        key: &str,
        description: Option<&str>,
    ) -> Result<ApiKey, DbError> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO openai_api_keys (key, description, created_at, usage_count)
                 VALUES (?1, ?2, ?3, 0)",
                params![key, description, Utc::now()],
            )
            .to_db()?;
            let id = tx.last_insert_rowid();
            tx.query_row(
                "SELECT id, key, description, created_at, last_used_at, usage_count
                 FROM openai_api_keys WHERE id = ?1",
                params![id],
                row_to_api_key,
            )
            .to_db()
        })
    }

    pub fn delete_api_key_sync(&self, key: &str) -> Result<bool, DbError> {
        self.with_tx(|tx| {
            let changed = tx
                .execute("DELETE FROM openai_api_keys WHERE key = ?1", params![key])
                .to_db()?;
            Ok(changed > 0)
        })
    }

    /// Single conditional UPDATE: the row count says whether the key exists,
    /// and a miss changes nothing.
    pub fn validate_api_key_sync(&self, key: &str) -> Result<bool, DbError> {
        self.with_tx(|tx| {
            let changed = tx
                .execute(
                    "UPDATE openai_api_keys
                     SET usage_count = usage_count + 1, last_used_at = ?1
                     WHERE key = ?2",
                    params![Utc::now(), key],
                )
                .to_db()?;
            Ok(changed > 0)
        })
    }

    pub fn list_api_keys_sync(&self) -> Result<Vec<ApiKey>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, key, description, created_at, last_used_at, usage_count
                     FROM openai_api_keys
                     ORDER BY created_at DESC, id DESC",
                )
                .to_db()?;
            let keys = stmt
                .query_map([], row_to_api_key)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(keys)
        })
    }
}
