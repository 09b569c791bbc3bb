use crate::error::ProvisionResult;
use crate::infrastructure::repositories::{CatalogRepository, MetadataRepository};
use sqlx::postgres::PgConnection;
use std::time::Duration;

/// Drop every managed database whose ledger row is older than `ttl`.
///
/// Catches clones whose owner crashed or never cleaned up. Must run while
/// holding the advisory lock. Returns the swept names.
pub async fn sweep_expired(conn: &mut PgConnection, ttl: Duration) -> ProvisionResult<Vec<String>> {
    let expired = MetadataRepository::expired(conn, ttl).await?;

    for name in &expired {
        CatalogRepository::drop_database(conn, name).await?;
        MetadataRepository::forget(conn, name).await?;
        tracing::info!(database = %name, "Dropped expired test database");
    }

    if !expired.is_empty() {
        tracing::info!(count = expired.len(), "Expired database sweep finished");
    }

    Ok(expired)
}
