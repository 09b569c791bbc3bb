pub mod clone;
pub mod janitor;
pub mod lease;
pub mod migrator;
pub mod service;
pub mod teardown;
pub mod template;

use std::time::Duration;

pub use lease::LeasedDatabase;
pub use migrator::{FnMigrator, NoopMigrator, SqlxMigrations, TemplateMigrator};
pub use service::{DbConfigProvider, TestDbProvider};
pub use template::RebuildReason;

/// Templates older than this are dropped and rebuilt on the next call
pub const TEMPLATE_TTL: Duration = Duration::from_secs(5 * 60);

/// Clones older than this are swept even if their owner never cleaned up
pub const TEST_DB_TTL: Duration = Duration::from_secs(180 * 60);

/// Key for the server-wide advisory lock serializing template work
pub const ADVISORY_LOCK_KEY: i64 = 5_436_123_451;
