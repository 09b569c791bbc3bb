pub mod advisory_lock;

use crate::error::{ProvisionError, ProvisionResult};
use crate::infrastructure::config::DbConfig;
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::{ConnectOptions, Pool, Postgres};
use std::time::Duration;

pub use advisory_lock::AdvisoryLock;

pub type DbPool = Pool<Postgres>;

/// Administrative database used for every catalog-level statement
pub const MAINTENANCE_DATABASE: &str = "postgres";

/// Opens a single control session on the maintenance database.
///
/// A dedicated connection rather than a pool: advisory locks belong to the
/// session that took them.
pub async fn connect_maintenance(config: &DbConfig) -> ProvisionResult<PgConnection> {
    let maintenance = config.with_database(MAINTENANCE_DATABASE);
    maintenance
        .connect_options()
        .connect()
        .await
        .map_err(ProvisionError::connection(MAINTENANCE_DATABASE))
}

pub async fn create_pool(config: &DbConfig, max_connections: u32) -> ProvisionResult<DbPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(config.connect_options())
        .await
        .map_err(ProvisionError::connection(&config.database))
}

/// Quotes a database name for DDL, which cannot take bind parameters
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
