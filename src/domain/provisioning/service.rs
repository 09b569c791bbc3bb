use super::lease::LeasedDatabase;
use super::migrator::TemplateMigrator;
use super::{clone, janitor, teardown, template};
use super::{ADVISORY_LOCK_KEY, TEMPLATE_TTL, TEST_DB_TTL};
use crate::error::ProvisionResult;
use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::{connect_maintenance, create_pool, AdvisoryLock};
use crate::infrastructure::repositories::MetadataRepository;
use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use std::sync::Arc;

/// Pool size for leased databases
const LEASE_MAX_CONNECTIONS: u32 = 5;

/// Hands out isolated databases cloned from a shared, migrated template.
///
/// Safe to call from many tasks and processes at once: every step that reads
/// or mutates the template or the ledger runs under one server-wide advisory
/// lock. Cloning costs a full `CREATE DATABASE`, so prefer one database per
/// test file over one per test case.
#[derive(Clone)]
pub struct TestDbProvider {
    config: DbConfig,
    migrator: Arc<dyn TemplateMigrator>,
}

impl TestDbProvider {
    /// `config.database` names the template; clones are derived from it
    pub fn new(config: DbConfig, migrator: impl TemplateMigrator + 'static) -> ProvisionResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            migrator: Arc::new(migrator),
        })
    }

    pub fn from_env(migrator: impl TemplateMigrator + 'static) -> ProvisionResult<Self> {
        let config = DbConfig::from_env()?;
        Self::new(config, migrator)
    }

    pub fn template_config(&self) -> &DbConfig {
        &self.config
    }

    /// Provision a fresh database and wrap it with a connected pool
    pub async fn lease(&self) -> ProvisionResult<LeasedDatabase> {
        let config = self.get_fresh_db_config().await?;
        match create_pool(&config, LEASE_MAX_CONNECTIONS).await {
            Ok(pool) => Ok(LeasedDatabase::new(config, pool)),
            Err(e) => {
                if let Err(cleanup_err) = teardown::cleanup(&config).await {
                    tracing::warn!(database = %config.database, error = %cleanup_err, "Cleanup after failed lease also failed");
                }
                Err(e)
            }
        }
    }

    /// Run the expiry sweep on its own
    pub async fn sweep_expired(&self) -> ProvisionResult<Vec<String>> {
        let conn = connect_maintenance(&self.config).await?;
        let mut lock = AdvisoryLock::acquire(conn, ADVISORY_LOCK_KEY).await?;

        let swept = sweep_locked(&mut lock).await;
        lock.release().await;
        swept
    }

    async fn provision_locked(&self, conn: &mut PgConnection) -> ProvisionResult<String> {
        MetadataRepository::ensure_table(conn).await?;
        janitor::sweep_expired(conn, TEST_DB_TTL).await?;

        let rebuilt = template::ensure_template_current(
            conn,
            &self.config,
            self.migrator.as_ref(),
            TEMPLATE_TTL,
        )
        .await?;
        tracing::debug!(template = %self.config.database, rebuilt, "Template ready for cloning");

        clone::clone_fresh(conn, &self.config.database).await
    }
}

async fn sweep_locked(conn: &mut PgConnection) -> ProvisionResult<Vec<String>> {
    MetadataRepository::ensure_table(conn).await?;
    janitor::sweep_expired(conn, TEST_DB_TTL).await
}

/// Source of isolated databases for integration tests
#[async_trait]
pub trait DbConfigProvider: Send + Sync {
    /// Connection parameters for a new, fully migrated database
    async fn get_fresh_db_config(&self) -> ProvisionResult<DbConfig>;

    /// Drop the database behind `config`; safe to call more than once
    async fn cleanup(&self, config: &DbConfig) -> ProvisionResult<()>;
}

#[async_trait]
impl DbConfigProvider for TestDbProvider {
    async fn get_fresh_db_config(&self) -> ProvisionResult<DbConfig> {
        let conn = connect_maintenance(&self.config).await?;
        let mut lock = AdvisoryLock::acquire(conn, ADVISORY_LOCK_KEY).await?;

        let provisioned = self.provision_locked(&mut lock).await;
        lock.release().await;

        let name = provisioned?;
        Ok(self.config.with_database(name))
    }

    async fn cleanup(&self, config: &DbConfig) -> ProvisionResult<()> {
        teardown::cleanup(config).await
    }
}
