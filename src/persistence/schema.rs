//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` — safe to
//! re-run on every server startup. Produces a convergent result.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// Creates both tables idempotently. Safe to call on every startup.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS task_record (
    thread_key      TEXT PRIMARY KEY NOT NULL,
    task_id         TEXT NOT NULL,
    summary         TEXT NOT NULL,
    author_user_id  TEXT NOT NULL,
    state           TEXT NOT NULL CHECK(state IN ('open','done')),
    created_at      TEXT NOT NULL,
    completed_at    TEXT,
    assignee        TEXT
);

CREATE TABLE IF NOT EXISTS dedup_entry (
    event_key       TEXT PRIMARY KEY NOT NULL,
    expires_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_state ON task_record(state);
CREATE INDEX IF NOT EXISTS idx_dedup_expiry ON dedup_entry(expires_at);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
