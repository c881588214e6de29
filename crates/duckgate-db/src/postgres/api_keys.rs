use chrono::{DateTime, Utc};

use duckgate_core::ApiKey;

use super::{pg_err, PostgresDatabase};
use crate::DbError;

/// `SERIAL` and `INTEGER` columns decode as `i32`.
#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    id: i32,
    key: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    usage_count: i32,
}

/// Rows written by older deployments may carry NULL defaults.
const COLUMNS: &str = "id, key, description, COALESCE(created_at, NOW()) AS created_at, \
     last_used_at, COALESCE(usage_count, 0) AS usage_count";

impl From<ApiKeyRow> for ApiKey {
    fn from(r: ApiKeyRow) -> Self {
        ApiKey {
            id: Some(i64::from(r.id)),
            key: r.key,
            description: r.description,
            created_at: r.created_at,
            last_used_at: r.last_used_at,
            usage_count: i64::from(r.usage_count),
        }
    }
}

impl PostgresDatabase {
    pub(crate) async fn pg_insert_api_key(
        &self,
        key: &str,
        description: Option<&str>,
    ) -> Result<ApiKey, DbError> {
        let key = key.to_string();
        let description = description.map(str::to_string);
        self.with_tx(move |conn| {
            Box::pin(async move {
                let sql = format!(
                    "INSERT INTO openai_api_keys (key, description) VALUES ($1, $2) RETURNING {COLUMNS}"
                );
                let row = sqlx::query_as::<_, ApiKeyRow>(&sql)
                .bind(&key)
                .bind(&description)
                .fetch_one(conn)
                .await
                .map_err(pg_err)?;
                Ok(row.into())
            })
        })
        .await
    }

    pub(crate) async fn pg_delete_api_key(&self, key: &str) -> Result<bool, DbError> {
        let key = key.to_string();
        self.with_tx(move |conn| {
            Box::pin(async move {
                let result = sqlx::query("DELETE FROM openai_api_keys WHERE key = $1")
                    .bind(&key)
                    .execute(conn)
                    .await
                    .map_err(pg_err)?;
                Ok(result.rows_affected() > 0)
            })
        })
        .await
    }

    pub(crate) async fn pg_validate_api_key(&self, key: &str) -> Result<bool, DbError> {
        let key = key.to_string();
        self.with_tx(move |conn| {
            Box::pin(async move {
                let id: Option<i32> = sqlx::query_scalar(
                    "UPDATE openai_api_keys
                     SET usage_count = usage_count + 1, last_used_at = NOW()
                     WHERE key = $1
                     RETURNING id",
                )
                .bind(&key)
                .fetch_optional(conn)
                .await
                .map_err(pg_err)?;
                Ok(id.is_some())
            })
        })
        .await
    }

    pub(crate) async fn pg_list_api_keys(&self) -> Result<Vec<ApiKey>, DbError> {
        self.with_tx(|conn| {
            Box::pin(async move {
                let sql = format!(
                    "SELECT {COLUMNS} FROM openai_api_keys ORDER BY created_at DESC, id DESC"
                );
                let rows = sqlx::query_as::<_, ApiKeyRow>(&sql)
                .fetch_all(conn)
                .await
                .map_err(pg_err)?;
                Ok(rows.into_iter().map(ApiKey::from).collect())
            })
        })
        .await
    }
}
