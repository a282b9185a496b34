//! Duplicate-event suppression repository for `SQLite` persistence.
//!
//! The platform delivers events at-least-once and may retry after a
//! timeout, so every delivery is claimed here before any side effect
//! runs. The claim is atomic: the `INSERT OR IGNORE` decides which of
//! two concurrent deliveries of the same key proceeds.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::Result;

use super::db::Database;

/// Repository wrapper around `SQLite` for dedup entries.
#[derive(Clone)]
pub struct DedupRepo {
    db: Arc<Database>,
}

impl DedupRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Atomically claim an event key, returning whether it was new.
    ///
    /// Exactly one of any number of concurrent calls with the same key
    /// observes `true`. A previously claimed key becomes claimable again
    /// once its TTL elapses; events are not expected to be retried after
    /// the platform's own retry window closes.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a statement fails. Callers are expected
    /// to fail open (process the event, log a warning): losing dedup
    /// occasionally is less harmful than dropping legitimate events.
    pub async fn check_and_mark(&self, event_key: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now();

        // Clear an expired claim for this key so it can be re-taken.
        sqlx::query("DELETE FROM dedup_entry WHERE event_key = ?1 AND expires_at <= ?2")
            .bind(event_key)
            .bind(now.to_rfc3339())
            .execute(self.db.as_ref())
            .await?;

        let expires_at = (now + ttl).to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO dedup_entry (event_key, expires_at) VALUES (?1, ?2)
             ON CONFLICT(event_key) DO NOTHING",
        )
        .bind(event_key)
        .bind(&expires_at)
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Release a claimed event key.
    ///
    /// Used when downstream task creation fails: the platform retries on
    /// a non-200 response, and the retried delivery must not be dropped
    /// as a duplicate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn release(&self, event_key: &str) -> Result<()> {
        sqlx::query("DELETE FROM dedup_entry WHERE event_key = ?1")
            .bind(event_key)
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Delete all entries that expired at or before `now`, returning the count.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM dedup_entry WHERE expires_at <= ?1")
            .bind(now.to_rfc3339())
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}
