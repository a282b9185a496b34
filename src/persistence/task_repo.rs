//! Thread-task index repository for `SQLite` persistence.
//!
//! Keyed by the *root* message timestamp of a conversation thread:
//! replies carry the root's timestamp as their thread key, not their
//! own. Durable across restarts — webhook deliveries are not guaranteed
//! to hit the same process instance twice.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::task::{TaskRecord, TaskState, TrackerAssignee};
use crate::{AppError, Result};

use super::db::Database;

/// Repository wrapper around `SQLite` for task records.
#[derive(Clone)]
pub struct TaskRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct TaskRow {
    thread_key: String,
    task_id: String,
    summary: String,
    author_user_id: String,
    state: String,
    created_at: String,
    completed_at: Option<String>,
    assignee: Option<String>,
}

impl TaskRow {
    /// Convert a database row into the domain model.
    fn into_record(self) -> Result<TaskRecord> {
        let state = parse_state(&self.state)?;
        let created_at = parse_timestamp(&self.created_at, "created_at")?;
        let completed_at = self
            .completed_at
            .as_deref()
            .map(|s| parse_timestamp(s, "completed_at"))
            .transpose()?;
        let assignee = self.assignee.map(|value| {
            if value.is_empty() {
                TrackerAssignee::Missing
            } else {
                TrackerAssignee::Resolved(value)
            }
        });

        Ok(TaskRecord {
            thread_key: self.thread_key,
            task_id: self.task_id,
            summary: self.summary,
            author_user_id: self.author_user_id,
            state,
            created_at,
            completed_at,
            assignee,
        })
    }
}

fn parse_timestamp(s: &str, field: &str) -> Result<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

fn parse_state(s: &str) -> Result<TaskState> {
    match s {
        "open" => Ok(TaskState::Open),
        "done" => Ok(TaskState::Done),
        other => Err(AppError::Db(format!("invalid task state: {other}"))),
    }
}

fn state_str(state: TaskState) -> &'static str {
    match state {
        TaskState::Open => "open",
        TaskState::Done => "done",
    }
}

impl TaskRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new task record for its thread key.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails, including when a
    /// record already exists for the thread key.
    pub async fn put(&self, record: &TaskRecord) -> Result<()> {
        let created_at = record.created_at.to_rfc3339();
        let completed_at = record.completed_at.map(|dt| dt.to_rfc3339());
        let assignee = record
            .assignee
            .as_ref()
            .map(|a| a.as_column_value().to_owned());

        sqlx::query(
            "INSERT INTO task_record (thread_key, task_id, summary, author_user_id,
             state, created_at, completed_at, assignee)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&record.thread_key)
        .bind(&record.task_id)
        .bind(&record.summary)
        .bind(&record.author_user_id)
        .bind(state_str(record.state))
        .bind(&created_at)
        .bind(&completed_at)
        .bind(&assignee)
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Retrieve the task record for a thread key.
    ///
    /// Returns `Ok(None)` if no task was ever created for the thread.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, thread_key: &str) -> Result<Option<TaskRecord>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM task_record WHERE thread_key = ?1")
            .bind(thread_key)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(TaskRow::into_record).transpose()
    }

    /// Atomically claim the `Open → Done` transition for a thread,
    /// recording assignee and completion time.
    ///
    /// The `state = 'open'` predicate is the mutual-exclusion point for
    /// concurrent deliverables on the same thread: exactly one of any
    /// number of concurrent calls observes `true`. Returns `false` when
    /// the record is absent or already `Done`, leaving an earlier
    /// completion's assignee and timestamps untouched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn claim_done(
        &self,
        thread_key: &str,
        assignee: &TrackerAssignee,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE task_record SET state = 'done', completed_at = ?1, assignee = ?2
             WHERE thread_key = ?3 AND state = 'open'",
        )
        .bind(completed_at.to_rfc3339())
        .bind(assignee.as_column_value())
        .bind(thread_key)
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Release a `Done` claim, returning the record to `Open`.
    ///
    /// Used when the tracker completion RPC fails after the claim was
    /// taken: a later redelivery of the deliverable must be able to
    /// complete the task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn reopen(&self, thread_key: &str) -> Result<()> {
        sqlx::query(
            "UPDATE task_record SET state = 'open', completed_at = NULL, assignee = NULL
             WHERE thread_key = ?1",
        )
        .bind(thread_key)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Delete `Done` records completed before `cutoff`, returning the count.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn purge_done_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM task_record WHERE state = 'done' AND completed_at < ?1")
                .bind(cutoff.to_rfc3339())
                .execute(self.db.as_ref())
                .await?;
        Ok(result.rows_affected())
    }
}
