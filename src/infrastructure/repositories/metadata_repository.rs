use crate::error::{ProvisionError, ProvisionResult};
use chrono::NaiveDateTime;
use sqlx::postgres::PgConnection;
use std::time::Duration;

/// Ledger table, stored in the maintenance database
pub const METADATA_TABLE: &str = "template_metadata";

/// Creation timestamps for every database the provider manages, template and
/// clones alike. All ages are measured against the server clock.
pub struct MetadataRepository;

impl MetadataRepository {
    /// Create the ledger table if it does not exist yet
    pub async fn ensure_table(conn: &mut PgConnection) -> ProvisionResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS template_metadata (
                db_name TEXT PRIMARY KEY,
                created_at TIMESTAMP
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(ProvisionError::query("create metadata table", METADATA_TABLE))?;

        Ok(())
    }

    /// Upsert the row for `db_name`, resetting its age to zero
    pub async fn record_created(conn: &mut PgConnection, db_name: &str) -> ProvisionResult<()> {
        sqlx::query(
            r#"
            INSERT INTO template_metadata (db_name, created_at)
            VALUES ($1, NOW())
            ON CONFLICT (db_name)
            DO UPDATE SET created_at = EXCLUDED.created_at
            "#,
        )
        .bind(db_name)
        .execute(&mut *conn)
        .await
        .map_err(ProvisionError::query("record database creation", db_name))?;

        Ok(())
    }

    pub async fn exists(conn: &mut PgConnection, db_name: &str) -> ProvisionResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM template_metadata WHERE db_name = $1)",
        )
        .bind(db_name)
        .fetch_one(&mut *conn)
        .await
        .map_err(ProvisionError::query("look up metadata row", db_name))?;

        Ok(exists)
    }

    /// `None` when the row is missing or its timestamp is NULL
    pub async fn created_at(
        conn: &mut PgConnection,
        db_name: &str,
    ) -> ProvisionResult<Option<NaiveDateTime>> {
        let created_at = sqlx::query_scalar::<_, Option<NaiveDateTime>>(
            "SELECT created_at FROM template_metadata WHERE db_name = $1",
        )
        .bind(db_name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(ProvisionError::query("read creation time", db_name))?;

        Ok(created_at.flatten())
    }

    /// Whether the row is older than `ttl`. A missing row or NULL timestamp
    /// counts as stale.
    pub async fn is_older_than(
        conn: &mut PgConnection,
        db_name: &str,
        ttl: Duration,
    ) -> ProvisionResult<bool> {
        let stale = sqlx::query_scalar::<_, Option<bool>>(
            r#"
            SELECT created_at < NOW() - ($2 * INTERVAL '1 second')
            FROM template_metadata
            WHERE db_name = $1
            "#,
        )
        .bind(db_name)
        .bind(ttl.as_secs_f64())
        .fetch_optional(&mut *conn)
        .await
        .map_err(ProvisionError::query("check database age", db_name))?;

        Ok(stale.flatten().unwrap_or(true))
    }

    /// Names of every row older than `ttl`
    pub async fn expired(conn: &mut PgConnection, ttl: Duration) -> ProvisionResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT db_name
            FROM template_metadata
            WHERE created_at < NOW() - ($1 * INTERVAL '1 second')
            ORDER BY created_at
            "#,
        )
        .bind(ttl.as_secs_f64())
        .fetch_all(&mut *conn)
        .await
        .map_err(ProvisionError::query("list expired databases", METADATA_TABLE))?;

        Ok(names)
    }

    /// Delete the row for `db_name`; a missing row is fine
    pub async fn forget(conn: &mut PgConnection, db_name: &str) -> ProvisionResult<()> {
        sqlx::query("DELETE FROM template_metadata WHERE db_name = $1")
            .bind(db_name)
            .execute(&mut *conn)
            .await
            .map_err(ProvisionError::query("delete metadata row", db_name))?;

        Ok(())
    }
}
