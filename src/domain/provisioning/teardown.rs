use super::ADVISORY_LOCK_KEY;
use crate::error::ProvisionResult;
use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::{connect_maintenance, AdvisoryLock};
use crate::infrastructure::repositories::{CatalogRepository, MetadataRepository};
use sqlx::postgres::PgConnection;

/// Drop the database named in `config` along with its ledger row.
///
/// Idempotent: a database or row that is already gone is not an error.
pub async fn cleanup(config: &DbConfig) -> ProvisionResult<()> {
    let conn = connect_maintenance(config).await?;
    let mut lock = AdvisoryLock::acquire(conn, ADVISORY_LOCK_KEY).await?;

    let result = drop_managed(&mut lock, &config.database).await;
    lock.release().await;
    result?;

    tracing::info!(database = %config.database, "Test database cleaned up");
    Ok(())
}

async fn drop_managed(conn: &mut PgConnection, db_name: &str) -> ProvisionResult<()> {
    MetadataRepository::ensure_table(conn).await?;
    CatalogRepository::drop_database(conn, db_name).await?;
    MetadataRepository::forget(conn, db_name).await?;
    Ok(())
}
