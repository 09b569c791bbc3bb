//! Isolated, schema-ready PostgreSQL databases for concurrently running tests.
//!
//! A shared template database is migrated once per call and cloned with
//! `CREATE DATABASE ... TEMPLATE`, all under a server-wide advisory lock so
//! independent test processes can provision at the same time.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::provisioning::{
    DbConfigProvider, FnMigrator, LeasedDatabase, NoopMigrator, SqlxMigrations, TemplateMigrator,
    TestDbProvider, ADVISORY_LOCK_KEY, TEMPLATE_TTL, TEST_DB_TTL,
};
pub use error::{ProvisionError, ProvisionResult};
pub use infrastructure::config::{Config, DbConfig, LogFormat, SslMode};
