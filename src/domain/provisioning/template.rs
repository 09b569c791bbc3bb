use super::migrator::TemplateMigrator;
use crate::error::{ProvisionError, ProvisionResult};
use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::create_pool;
use crate::infrastructure::repositories::{CatalogRepository, MetadataRepository};
use sqlx::postgres::PgConnection;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    /// No physical database with the template's name
    Missing,
    /// Database exists but the ledger has no row for it
    Untracked,
    /// Ledger row is older than the template TTL
    Expired,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RebuildReason::Missing => "missing",
            RebuildReason::Untracked => "untracked",
            RebuildReason::Expired => "expired",
        };
        f.write_str(reason)
    }
}

/// Must run while holding the advisory lock
pub async fn needs_rebuild(
    conn: &mut PgConnection,
    template: &str,
    ttl: Duration,
) -> ProvisionResult<Option<RebuildReason>> {
    if !CatalogRepository::database_exists(conn, template).await? {
        return Ok(Some(RebuildReason::Missing));
    }

    if !MetadataRepository::exists(conn, template).await? {
        return Ok(Some(RebuildReason::Untracked));
    }

    if MetadataRepository::is_older_than(conn, template, ttl).await? {
        return Ok(Some(RebuildReason::Expired));
    }

    Ok(None)
}

/// Drop, recreate empty, and stamp the template
async fn rebuild(conn: &mut PgConnection, template: &str) -> ProvisionResult<()> {
    if let Err(e) = CatalogRepository::drop_database(conn, template).await {
        tracing::warn!(template = %template, error = %e, "Dropping stale template failed, recreating anyway");
    }

    CatalogRepository::create_database(conn, template).await?;
    MetadataRepository::record_created(conn, template).await?;

    Ok(())
}

/// Rebuilds the template when needed, then always runs the migrator on it.
///
/// The migrator's connection is closed before returning so the template can
/// be cloned. Returns whether a rebuild happened.
pub async fn ensure_template_current(
    conn: &mut PgConnection,
    template_config: &DbConfig,
    migrator: &dyn TemplateMigrator,
    ttl: Duration,
) -> ProvisionResult<bool> {
    let template = template_config.database.as_str();

    let reason = needs_rebuild(conn, template, ttl).await?;
    if let Some(reason) = reason {
        tracing::info!(template = %template, reason = %reason, "Rebuilding template database");
        rebuild(conn, template).await?;
    }

    run_migrations(template_config, migrator).await?;

    Ok(reason.is_some())
}

async fn run_migrations(
    template_config: &DbConfig,
    migrator: &dyn TemplateMigrator,
) -> ProvisionResult<()> {
    let pool = create_pool(template_config, 1).await?;
    let result = migrator.migrate(&pool).await;
    pool.close().await;

    result.map_err(|source| ProvisionError::Migration {
        template: template_config.database.clone(),
        source,
    })?;

    tracing::debug!(template = %template_config.database, "Template schema is current");
    Ok(())
}
