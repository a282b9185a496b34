//! Persistence layer modules.

pub mod db;
pub mod dedup_repo;
pub mod retention;
pub mod schema;
pub mod task_repo;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;
