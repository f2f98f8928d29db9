//! Lease-based distributed lock over a single database row.
//!
//! Acquire reaps the row if its lease expired, then races an insert; a
//! conflict means another runner holds the lock. Release deletes the row
//! only when `locked_by` still matches, so a slow runner whose lease was
//! reclaimed cannot steal the lock back. Correctness depends on the lease
//! staying shorter than the external trigger cadence.

use chrono::{Duration, Utc};
use sqlx::PgPool;

use contrail_common::error::AppError;

/// Lock name used by the scheduler tick.
pub const SCHEDULER_LOCK_NAME: &str = "scheduler:tick";

pub struct LeaseLock;

impl LeaseLock {
    /// Try to take the named lease for `ttl_seconds`.
    ///
    /// Returns `false` when another runner holds an unexpired lease — a
    /// normal outcome, not an error.
    pub async fn acquire(
        pool: &PgPool,
        name: &str,
        run_id: &str,
        ttl_seconds: i64,
    ) -> Result<bool, AppError> {
        sqlx::query("DELETE FROM scheduler_locks WHERE name = $1 AND expires_at <= now()")
            .bind(name)
            .execute(pool)
            .await?;

        let expires_at = Utc::now() + Duration::seconds(ttl_seconds);
        let result = sqlx::query(
            r#"
            INSERT INTO scheduler_locks (name, locked_by, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(run_id)
        .bind(expires_at)
        .execute(pool)
        .await?;

        let acquired = result.rows_affected() == 1;
        if acquired {
            tracing::debug!(name, run_id, ttl_seconds, "Lock acquired");
        } else {
            tracing::debug!(name, run_id, "Lock held elsewhere, skipping");
        }

        Ok(acquired)
    }

    /// Release the lease, but only if this runner still owns it.
    pub async fn release(pool: &PgPool, name: &str, run_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM scheduler_locks WHERE name = $1 AND locked_by = $2")
            .bind(name)
            .bind(run_id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
