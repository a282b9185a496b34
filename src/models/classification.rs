//! Classifier output contract.

use serde::Deserialize;

/// Verdict produced by the external text classifier.
///
/// Produced once per non-duplicate plain message event and never
/// persisted independently; only the summary survives into a
/// [`TaskRecord`](crate::models::task::TaskRecord).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClassificationResult {
    /// Whether the message represents an actionable work request.
    #[serde(rename = "isTask")]
    pub is_task: bool,
    /// Short task summary; empty when `is_task` is false.
    #[serde(default)]
    pub summary: String,
}

impl ClassificationResult {
    /// The fail-soft verdict used when the external call errs or times out.
    #[must_use]
    pub fn not_a_task() -> Self {
        Self {
            is_task: false,
            summary: String::new(),
        }
    }
}
