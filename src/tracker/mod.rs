//! Task tracker gateway: external create/update RPCs.
//!
//! The tracker is the system that owns the task's full lifecycle; this
//! subsystem only creates items and reports their completion. Both
//! operations are single RPCs behind the [`TrackTasks`] trait so the
//! router never sees transport details.

pub mod monday;

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::models::task::TrackerAssignee;
use crate::Result;

/// Interface between the event router and the external task tracker.
pub trait TrackTasks: Send + Sync {
    /// Create a tracker item, returning its opaque identifier.
    ///
    /// On failure the caller must not persist a task record — a task
    /// exists for a thread iff creation succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tracker`](crate::AppError::Tracker) if the RPC
    /// fails or the response carries no item id.
    fn create_task(
        &self,
        summary: &str,
        author: &str,
        origin_link: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Mark a tracker item complete.
    ///
    /// Carries the elapsed working duration (`completed_at - created_at`)
    /// and the resolved assignee. A missing assignee is sent as an
    /// explicit empty value, never omitted.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tracker`](crate::AppError::Tracker) if the RPC
    /// fails. The caller reports the failure in-conversation rather than
    /// retrying: the deliverable has already been handed over.
    fn complete_task(
        &self,
        task_id: &str,
        assignee: &TrackerAssignee,
        completed_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
