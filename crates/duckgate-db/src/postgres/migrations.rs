use sqlx::{Executor, PgConnection};

use super::pg_err;
use crate::DbError;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS openai_api_keys (
        id           SERIAL PRIMARY KEY,
        key          TEXT NOT NULL UNIQUE,
        description  TEXT,
        created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        last_used_at TIMESTAMPTZ,
        usage_count  INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_openai_api_keys_created
        ON openai_api_keys(created_at);";

/// Tables created by earlier deployments store naive UTC `TIMESTAMP`s.
/// Converted in place so rows decode as `DateTime<Utc>`.
const UPGRADE_TIMESTAMPS: &str = "DO $$
    BEGIN
        IF EXISTS (
            SELECT 1 FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name = 'openai_api_keys'
              AND column_name = 'created_at'
              AND data_type = 'timestamp without time zone'
        ) THEN
            ALTER TABLE openai_api_keys
                ALTER COLUMN created_at TYPE TIMESTAMPTZ USING created_at AT TIME ZONE 'UTC',
                ALTER COLUMN last_used_at TYPE TIMESTAMPTZ USING last_used_at AT TIME ZONE 'UTC';
        END IF;
    END $$;";

pub async fn run(conn: &mut PgConnection) -> Result<(), DbError> {
    for statement in [CREATE_TABLE, UPGRADE_TIMESTAMPS] {
        (&mut *conn)
            .execute(sqlx::raw_sql(statement))
            .await
            .map_err(pg_err)?;
    }
    Ok(())
}
