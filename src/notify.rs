//! Notifier: acknowledgement reactions and messages back to the chat.
//!
//! Reactions are idempotent from the caller's perspective: the platform
//! reports a repeated identical reaction as "already applied", which is
//! a concurrency signal, not a fault. It is modelled as a success
//! variant of [`ReactionOutcome`] rather than an error to catch ad hoc.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::slack::gateway::SlackGateway;
use crate::Result;

/// Result of a reaction attempt. Both variants are success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// The reaction was newly applied.
    Applied,
    /// An identical reaction was already present (retry or race).
    AlreadyApplied,
}

/// Interface between the event router and the chat platform's
/// acknowledgement surface.
pub trait Notify: Send + Sync {
    /// Add a reaction emoji to a message.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Slack`](crate::AppError::Slack) on timeout or
    /// API failure. "Already applied" is **not** a failure.
    fn react(
        &self,
        channel: &str,
        ts: &str,
        emoji: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ReactionOutcome>> + Send + '_>>;

    /// Post a message into a conversation thread.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Slack`](crate::AppError::Slack) on timeout or
    /// API failure.
    fn post(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production notifier backed by the Slack Web API gateway.
pub struct SlackNotifier {
    gateway: Arc<SlackGateway>,
}

impl SlackNotifier {
    /// Create a notifier over a shared gateway.
    #[must_use]
    pub fn new(gateway: Arc<SlackGateway>) -> Self {
        Self { gateway }
    }
}

impl Notify for SlackNotifier {
    fn react(
        &self,
        channel: &str,
        ts: &str,
        emoji: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ReactionOutcome>> + Send + '_>> {
        let channel = channel.to_owned();
        let ts = ts.to_owned();
        let emoji = emoji.to_owned();
        Box::pin(async move { self.gateway.add_reaction(&channel, &ts, &emoji).await })
    }

    fn post(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let channel = channel.to_owned();
        let thread_ts = thread_ts.to_owned();
        let text = text.to_owned();
        Box::pin(async move { self.gateway.post_in_thread(&channel, &thread_ts, &text).await })
    }
}
