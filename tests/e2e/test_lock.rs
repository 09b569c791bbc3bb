use crate::e2e::helpers;

use helpers::{server_config, unique_template_name, Catalog, TestContext};
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use test_context::test_context;
use testdb_provider::infrastructure::db::{connect_maintenance, AdvisoryLock};
use testdb_provider::{DbConfigProvider, FnMigrator, TestDbProvider, ADVISORY_LOCK_KEY};

async fn hold_lock() -> AdvisoryLock {
    let conn = connect_maintenance(&server_config("postgres")).await.unwrap();
    AdvisoryLock::acquire(conn, ADVISORY_LOCK_KEY).await.unwrap()
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_wait_for_the_lock_before_provisioning(ctx: &TestContext) {
    let held = hold_lock().await;

    let blocked = tokio::time::timeout(
        Duration::from_millis(500),
        ctx.provider.get_fresh_db_config(),
    )
    .await;
    assert!(blocked.is_err(), "Provisioning should wait while the lock is held");
    assert!(!ctx
        .catalog
        .database_exists(&ctx.template.database)
        .await
        .unwrap());

    held.release().await;

    let config = tokio::time::timeout(Duration::from_secs(30), ctx.provider.get_fresh_db_config())
        .await
        .expect("Provisioning should proceed once the lock is released")
        .unwrap();

    ctx.provider.cleanup(&config).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn it_should_release_the_lock_when_the_guard_is_dropped() {
    let held = hold_lock().await;
    assert_eq!(held.key(), ADVISORY_LOCK_KEY);
    drop(held);

    let reacquired = tokio::time::timeout(Duration::from_secs(30), hold_lock())
        .await
        .expect("Dropped guard should not leak the lock");
    reacquired.release().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn it_should_release_the_lock_when_the_session_closes() {
    let held = hold_lock().await;

    // A holder that dies without unlocking: no runtime, so the socket just closes
    std::thread::spawn(move || drop(held)).join().unwrap();

    let reacquired = tokio::time::timeout(Duration::from_secs(30), hold_lock())
        .await
        .expect("Server should release the lock of a closed session");
    reacquired.release().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn it_should_release_the_lock_when_provisioning_is_cancelled() {
    let template = server_config(&unique_template_name());
    let slow = Arc::new(AtomicBool::new(true));

    let migrator = {
        let slow = slow.clone();
        FnMigrator::new(move |pool: PgPool| {
            let slow = slow.clone();
            async move {
                if slow.load(Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                sqlx::query("CREATE TABLE IF NOT EXISTS migration_marker (id INT)")
                    .execute(&pool)
                    .await?;
                Ok::<_, anyhow::Error>(())
            }
        })
    };
    let provider = TestDbProvider::new(template.clone(), migrator).unwrap();

    // Gives up mid-migration, while the call holds the lock
    let cancelled =
        tokio::time::timeout(Duration::from_secs(1), provider.get_fresh_db_config()).await;
    assert!(cancelled.is_err(), "Migration should still be running");

    let reacquired = tokio::time::timeout(Duration::from_secs(30), hold_lock())
        .await
        .expect("Cancelled call should not leak the lock");
    reacquired.release().await;

    slow.store(false, Ordering::SeqCst);
    let config = tokio::time::timeout(Duration::from_secs(30), provider.get_fresh_db_config())
        .await
        .expect("Provisioning should proceed after a cancelled call")
        .unwrap();

    let catalog = Catalog::connect(&server_config("postgres")).await.unwrap();
    assert!(catalog
        .table_exists(&config, "migration_marker")
        .await
        .unwrap());

    provider.cleanup(&config).await.unwrap();
    provider.cleanup(&template).await.unwrap();
    catalog.close().await;
}
