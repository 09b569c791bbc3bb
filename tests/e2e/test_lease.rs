use crate::e2e::helpers;

use helpers::TestContext;
use pretty_assertions::assert_eq;
use std::time::Duration;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_lease_a_connected_database(ctx: &TestContext) {
    let lease = ctx.provider.lease().await.unwrap();

    let marker_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM migration_marker")
        .fetch_one(lease.pool())
        .await
        .unwrap();
    assert_eq!(marker_rows, 0);
    assert!(lease
        .database_url()
        .ends_with(&format!("/{}?sslmode=disable", lease.config().database)));

    let name = lease.config().database.clone();
    lease.release().await.unwrap();

    assert!(!ctx.catalog.database_exists(&name).await.unwrap());
    assert!(!ctx.catalog.ledger_has_row(&name).await.unwrap());
}

#[test_context(TestContext)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn it_should_clean_up_a_dropped_lease_in_the_background(ctx: &TestContext) {
    let lease = ctx.provider.lease().await.unwrap();
    let name = lease.config().database.clone();

    drop(lease);

    let mut gone = false;
    for _ in 0..50 {
        if !ctx.catalog.database_exists(&name).await.unwrap() {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert!(gone, "Dropped lease {name} was never cleaned up");
}
