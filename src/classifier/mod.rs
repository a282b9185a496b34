//! Classifier gateway: decides whether a message is an actionable task.
//!
//! Wraps a single non-deterministic external call behind the [`Classify`]
//! trait. The gateway fails soft everywhere: malformed output, transport
//! errors, and timeouts all degrade to "not a task" rather than aborting
//! the request.

pub mod openai;
pub mod policy;

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::models::classification::ClassificationResult;

/// Interface between the event router and the external text classifier.
pub trait Classify: Send + Sync {
    /// Classify a message, producing a task verdict and summary.
    ///
    /// Infallible by contract: implementations resolve every failure
    /// path to [`ClassificationResult::not_a_task`].
    fn classify(
        &self,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = ClassificationResult> + Send + '_>>;
}

/// Parse raw model output into a verdict, tolerating code fences.
///
/// Models occasionally wrap the JSON contract in markdown fences; strip
/// them before parsing. Unparseable output logs the raw text for
/// diagnosis and degrades to "not a task".
#[must_use]
pub fn parse_verdict(raw: &str) -> ClassificationResult {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map_or(trimmed, |rest| rest.trim_end_matches("```"))
        .trim();

    match serde_json::from_str::<ClassificationResult>(body) {
        Ok(verdict) => verdict,
        Err(err) => {
            warn!(%err, raw, "classifier returned unparseable output");
            ClassificationResult::not_a_task()
        }
    }
}
