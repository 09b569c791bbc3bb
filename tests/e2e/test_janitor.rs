use crate::e2e::helpers;

use helpers::TestContext;
use test_context::test_context;
use testdb_provider::DbConfigProvider;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_sweep_expired_databases_on_next_provision(ctx: &TestContext) {
    let abandoned = ctx.provider.get_fresh_db_config().await.unwrap();
    ctx.catalog
        .backdate(&abandoned.database, 181)
        .await
        .unwrap();

    let fresh = ctx.provider.get_fresh_db_config().await.unwrap();

    assert!(!ctx
        .catalog
        .database_exists(&abandoned.database)
        .await
        .unwrap());
    assert!(!ctx
        .catalog
        .ledger_has_row(&abandoned.database)
        .await
        .unwrap());
    assert!(ctx.catalog.database_exists(&fresh.database).await.unwrap());

    ctx.provider.cleanup(&fresh).await.unwrap();
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_keep_databases_younger_than_test_ttl(ctx: &TestContext) {
    let kept = ctx.provider.get_fresh_db_config().await.unwrap();
    ctx.catalog.backdate(&kept.database, 179).await.unwrap();

    let swept = ctx.provider.sweep_expired().await.unwrap();

    assert!(!swept.contains(&kept.database));
    assert!(ctx.catalog.database_exists(&kept.database).await.unwrap());
    assert!(ctx.catalog.ledger_has_row(&kept.database).await.unwrap());

    ctx.provider.cleanup(&kept).await.unwrap();
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_sweep_rows_whose_database_is_already_gone(ctx: &TestContext) {
    let ghost = format!("{}_ghost", ctx.template.database);
    ctx.catalog.backdate(&ghost, 200).await.unwrap();

    let result = ctx.provider.sweep_expired().await;

    // Another test's sweep may have taken it first; either way it is gone
    assert!(result.is_ok(), "Sweep failed: {:?}", result.err());
    assert!(!ctx.catalog.ledger_has_row(&ghost).await.unwrap());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_swept_databases(ctx: &TestContext) {
    let abandoned = ctx.provider.get_fresh_db_config().await.unwrap();
    ctx.catalog
        .backdate(&abandoned.database, 240)
        .await
        .unwrap();

    let swept = ctx.provider.sweep_expired().await.unwrap();

    // Concurrent tests can sweep it first, so only check the outcome when it is ours
    if swept.contains(&abandoned.database) {
        assert!(!ctx
            .catalog
            .database_exists(&abandoned.database)
            .await
            .unwrap());
    }
    assert!(!ctx
        .catalog
        .ledger_has_row(&abandoned.database)
        .await
        .unwrap());
}
