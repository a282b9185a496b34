//! Maintenance service for time-based data purge.
//!
//! Runs as a background task deleting expired dedup entries every tick
//! and completed task records older than `retention_days`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::db::Database;
use super::dedup_repo::DedupRepo;
use super::task_repo::TaskRepo;
use crate::Result;

const PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// Spawn the maintenance purge background task.
///
/// The task runs every five minutes. On each tick it removes dedup
/// entries past their TTL and `Done` task records completed more than
/// `retention_days` ago.
#[must_use]
pub fn spawn_retention_task(
    db: Arc<Database>,
    retention_days: u32,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("retention task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = purge(&db, retention_days).await {
                        error!(?err, "retention purge failed");
                    }
                }
            }
        }
    })
}

async fn purge(db: &Arc<Database>, retention_days: u32) -> Result<()> {
    let now = Utc::now();

    let dedup = DedupRepo::new(Arc::clone(db));
    let expired = dedup.purge_expired(now).await?;

    let tasks = TaskRepo::new(Arc::clone(db));
    let cutoff = now - chrono::Duration::days(i64::from(retention_days));
    let purged = tasks.purge_done_before(cutoff).await?;

    if expired > 0 || purged > 0 {
        info!(expired, purged, "maintenance purge completed");
    }
    Ok(())
}
