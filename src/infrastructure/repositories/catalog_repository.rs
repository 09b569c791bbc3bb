use crate::error::{ProvisionError, ProvisionResult};
use crate::infrastructure::db::quote_ident;
use sqlx::postgres::PgConnection;

/// Server-level database DDL and `pg_database` lookups.
///
/// DDL statements cannot take bind parameters, so names are quoted and the
/// statements are not cached as prepared statements.
pub struct CatalogRepository;

impl CatalogRepository {
    pub async fn database_exists(conn: &mut PgConnection, db_name: &str) -> ProvisionResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)",
        )
        .bind(db_name)
        .fetch_one(&mut *conn)
        .await
        .map_err(ProvisionError::query("check database existence", db_name))?;

        Ok(exists)
    }

    /// Create an empty database
    pub async fn create_database(conn: &mut PgConnection, db_name: &str) -> ProvisionResult<()> {
        let sql = format!("CREATE DATABASE {}", quote_ident(db_name));
        sqlx::query(&sql)
            .persistent(false)
            .execute(&mut *conn)
            .await
            .map_err(ProvisionError::query("create database", db_name))?;

        Ok(())
    }

    /// Create `db_name` as a copy of `template`. Fails if any other session is
    /// connected to the template.
    pub async fn create_from_template(
        conn: &mut PgConnection,
        db_name: &str,
        template: &str,
    ) -> ProvisionResult<()> {
        let sql = format!(
            "CREATE DATABASE {} TEMPLATE {}",
            quote_ident(db_name),
            quote_ident(template)
        );
        sqlx::query(&sql)
            .persistent(false)
            .execute(&mut *conn)
            .await
            .map_err(ProvisionError::query("clone template", template))?;

        Ok(())
    }

    /// Terminate sessions attached to `db_name`, then drop it if it exists
    pub async fn drop_database(conn: &mut PgConnection, db_name: &str) -> ProvisionResult<()> {
        let terminated = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(pg_terminate_backend(pid))
            FROM pg_stat_activity
            WHERE datname = $1 AND pid <> pg_backend_pid()
            "#,
        )
        .bind(db_name)
        .fetch_one(&mut *conn)
        .await
        .map_err(ProvisionError::query("terminate database sessions", db_name))?;

        if terminated > 0 {
            tracing::debug!(database = %db_name, sessions = terminated, "Terminated lingering sessions");
        }

        let sql = format!("DROP DATABASE IF EXISTS {}", quote_ident(db_name));
        sqlx::query(&sql)
            .persistent(false)
            .execute(&mut *conn)
            .await
            .map_err(ProvisionError::query("drop database", db_name))?;

        Ok(())
    }
}
