use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use sqlx::migrate::Migrator;
use std::future::Future;
use std::path::Path;

/// Brings a database's schema up to date.
///
/// Invoked against the template on every provisioning call, so
/// implementations must be safe to run repeatedly on an already-migrated
/// schema.
#[async_trait]
pub trait TemplateMigrator: Send + Sync {
    async fn migrate(&self, pool: &DbPool) -> anyhow::Result<()>;
}

/// sqlx migration set, passed in explicitly at construction time.
///
/// Re-runs are cheap: sqlx skips versions already recorded in
/// `_sqlx_migrations`.
pub enum SqlxMigrations {
    Embedded(&'static Migrator),
    Loaded(Migrator),
}

impl SqlxMigrations {
    /// Wrap a migrator built with `sqlx::migrate!`
    pub fn embedded(migrator: &'static Migrator) -> Self {
        SqlxMigrations::Embedded(migrator)
    }

    /// Load `*.sql` migrations from a directory at runtime
    pub async fn from_dir(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let migrator = Migrator::new(dir.as_ref().to_path_buf()).await?;
        Ok(SqlxMigrations::Loaded(migrator))
    }

    fn migrator(&self) -> &Migrator {
        match self {
            SqlxMigrations::Embedded(migrator) => migrator,
            SqlxMigrations::Loaded(migrator) => migrator,
        }
    }
}

#[async_trait]
impl TemplateMigrator for SqlxMigrations {
    async fn migrate(&self, pool: &DbPool) -> anyhow::Result<()> {
        let migrator = self.migrator();
        migrator.run(pool).await?;
        tracing::debug!(
            migrations = migrator.iter().count(),
            "Template migrations applied"
        );
        Ok(())
    }
}

/// Adapts an async closure into a migrator
pub struct FnMigrator<F>(F);

impl<F, Fut> FnMigrator<F>
where
    F: Fn(DbPool) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        FnMigrator(f)
    }
}

#[async_trait]
impl<F, Fut> TemplateMigrator for FnMigrator<F>
where
    F: Fn(DbPool) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn migrate(&self, pool: &DbPool) -> anyhow::Result<()> {
        (self.0)(pool.clone()).await
    }
}

/// Leaves the template schema untouched
pub struct NoopMigrator;

#[async_trait]
impl TemplateMigrator for NoopMigrator {
    async fn migrate(&self, _pool: &DbPool) -> anyhow::Result<()> {
        Ok(())
    }
}
