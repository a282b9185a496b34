//! Task record model and lifecycle helpers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state for a tracked task.
///
/// The only permitted transition is `Open → Done`; `Done` is terminal
/// for this subsystem (lifecycle end is owned by the external tracker).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Task created in the tracker, awaiting its deliverable.
    Open,
    /// Deliverable received and reconciled onto the tracker item.
    Done,
}

impl TaskState {
    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (Self::Open, Self::Done))
    }
}

/// Resolved tracker identity for a completion assignee.
///
/// A lookup miss is an explicit value, never a silent omission: the
/// tracker always receives either the mapped identity or the sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackerAssignee {
    /// Identity mapped to a tracker-side account, email, or name.
    Resolved(String),
    /// No mapping exists for the chat-platform user.
    Missing,
}

impl TrackerAssignee {
    /// Value sent to the tracker's assignee column.
    ///
    /// The missing sentinel maps to an empty value so the field is set
    /// explicitly rather than omitted.
    #[must_use]
    pub fn as_column_value(&self) -> &str {
        match self {
            Self::Resolved(identity) => identity,
            Self::Missing => "",
        }
    }

    /// Whether the identity lookup missed.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// Durable unit of work correlating a conversation thread to a tracker item.
///
/// Created exactly once per qualifying inbound message, mutated exactly
/// once by the first valid deliverable on the same thread, never deleted
/// by this subsystem (retention purges aside).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TaskRecord {
    /// Originating message timestamp; primary key of the index.
    pub thread_key: String,
    /// Opaque handle returned by the tracker's create call.
    pub task_id: String,
    /// Classifier-produced summary used as the tracker item name.
    pub summary: String,
    /// Chat-platform identifier of the requesting author.
    pub author_user_id: String,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Deliverable timestamp; set on completion.
    pub completed_at: Option<DateTime<Utc>>,
    /// Resolved assignee; set on completion.
    pub assignee: Option<TrackerAssignee>,
}

impl TaskRecord {
    /// Construct a freshly created, open task record.
    #[must_use]
    pub fn new(
        thread_key: String,
        task_id: String,
        summary: String,
        author_user_id: String,
    ) -> Self {
        Self {
            thread_key,
            task_id,
            summary,
            author_user_id,
            state: TaskState::Open,
            created_at: Utc::now(),
            completed_at: None,
            assignee: None,
        }
    }

    /// Elapsed working duration from creation to the given completion time.
    #[must_use]
    pub fn elapsed(&self, completed_at: DateTime<Utc>) -> Duration {
        completed_at - self.created_at
    }
}
