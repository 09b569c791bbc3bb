use crate::error::ProvisionResult;
use crate::infrastructure::repositories::{CatalogRepository, MetadataRepository};
use chrono::Utc;
use rand::Rng;
use sqlx::postgres::PgConnection;

/// `test_<template>_<0..9999>_<unix-millis>`
pub fn clone_name(template: &str) -> String {
    let salt: u16 = rand::rng().random_range(0..10_000);
    format!("test_{}_{}_{}", template, salt, Utc::now().timestamp_millis())
}

/// Copy the template into a new uniquely-named database and record it.
///
/// Must run while holding the advisory lock; `CREATE DATABASE ... TEMPLATE`
/// fails if any other session is attached to the template.
pub async fn clone_fresh(conn: &mut PgConnection, template: &str) -> ProvisionResult<String> {
    let name = clone_name(template);

    CatalogRepository::create_from_template(conn, &name, template).await?;
    MetadataRepository::record_created(conn, &name).await?;

    tracing::info!(template = %template, database = %name, "Cloned fresh test database");
    Ok(name)
}
