use super::teardown;
use crate::error::ProvisionResult;
use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::DbPool;

/// A fresh database plus a pool connected to it, dropped when released.
///
/// Dropping an unreleased lease schedules the cleanup on the current tokio
/// runtime. That task may not run if the runtime is shutting down; the expiry
/// sweep eventually removes anything left behind.
pub struct LeasedDatabase {
    config: DbConfig,
    pool: DbPool,
    released: bool,
}

impl LeasedDatabase {
    pub(crate) fn new(config: DbConfig, pool: DbPool) -> Self {
        Self {
            config,
            pool,
            released: false,
        }
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn database_url(&self) -> String {
        self.config.database_url()
    }

    /// Close the pool and drop the database.
    ///
    /// On failure the lease stays unreleased, so dropping it retries the
    /// cleanup in the background.
    pub async fn release(mut self) -> ProvisionResult<()> {
        self.try_release().await
    }

    async fn try_release(&mut self) -> ProvisionResult<()> {
        self.pool.close().await;
        teardown::cleanup(&self.config).await?;
        self.released = true;
        Ok(())
    }
}

impl Drop for LeasedDatabase {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let config = self.config.clone();
        let pool = self.pool.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    pool.close().await;
                    if let Err(e) = teardown::cleanup(&config).await {
                        tracing::warn!(database = %config.database, error = %e, "Background cleanup of leased database failed");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    database = %self.config.database,
                    "Leased database dropped outside a runtime, leaving it to the expiry sweep"
                );
            }
        }
    }
}
