use crate::error::{ProvisionError, ProvisionResult};
use sqlx::postgres::PgConnection;
use sqlx::Connection;
use std::ops::{Deref, DerefMut};

/// Server-wide advisory lock held on a dedicated session.
///
/// The guard owns the session. `release` unlocks and closes it; dropping the
/// guard without releasing (error paths, cancelled futures, panics) does the
/// same on the current tokio runtime. Either way PostgreSQL frees the lock once
/// the session ends, so a crashed holder never deadlocks other callers.
pub struct AdvisoryLock {
    conn: Option<PgConnection>,
    key: i64,
}

impl AdvisoryLock {
    /// Blocks until the lock for `key` is granted on `conn`
    pub async fn acquire(mut conn: PgConnection, key: i64) -> ProvisionResult<Self> {
        tracing::debug!(key, "Waiting for advisory lock");

        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(key)
            .execute(&mut conn)
            .await
            .map_err(ProvisionError::query("acquire advisory lock", "postgres"))?;

        tracing::debug!(key, "Advisory lock acquired");

        Ok(Self {
            conn: Some(conn),
            key,
        })
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    /// Unlocks and closes the session. Never fails: a session that cannot be
    /// unlocked cleanly is closed, which releases the lock server-side.
    pub async fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            unlock_and_close(conn, self.key).await;
        }
    }
}

impl Deref for AdvisoryLock {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("advisory lock session is only taken on release")
    }
}

impl DerefMut for AdvisoryLock {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .expect("advisory lock session is only taken on release")
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        let key = self.key;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(key, "Advisory lock dropped without release, unlocking in background");
                handle.spawn(unlock_and_close(conn, key));
            }
            // No runtime to drive the unlock; dropping the socket ends the session.
            Err(_) => drop(conn),
        }
    }
}

async fn unlock_and_close(mut conn: PgConnection, key: i64) {
    let unlocked = sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
        .bind(key)
        .fetch_one(&mut conn)
        .await;

    match unlocked {
        Ok(true) => tracing::debug!(key, "Advisory lock released"),
        Ok(false) => tracing::warn!(key, "Advisory lock was not held at release"),
        Err(e) => tracing::warn!(key, error = %e, "Advisory unlock failed, closing session"),
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(error = %e, "Maintenance session did not close cleanly");
    }
}
