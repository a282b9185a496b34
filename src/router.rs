//! Event router: the event-to-task state machine.
//!
//! Per thread key the states are **NoTask** → **Open** (task created,
//! awaiting deliverable) → **Done** (terminal here). One router call per
//! webhook delivery; deliveries arrive concurrently and in any order,
//! so the dedup claim happens before any side-effecting call and the
//! durable index is the only cross-request state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::classifier::Classify;
use crate::config::GlobalConfig;
use crate::identity::ResolveIdentity;
use crate::models::event::InboundEvent;
use crate::models::task::{TaskRecord, TaskState};
use crate::notify::{Notify, ReactionOutcome};
use crate::persistence::db::Database;
use crate::persistence::dedup_repo::DedupRepo;
use crate::persistence::task_repo::TaskRepo;
use crate::tracker::TrackTasks;
use crate::Result;

/// Terminal disposition of one routed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterOutcome {
    /// A tracker item was created and indexed for the thread.
    Created {
        /// Tracker item identifier.
        task_id: String,
    },
    /// The thread's task was completed by a deliverable.
    Completed {
        /// Tracker item identifier.
        task_id: String,
    },
    /// The thread's task was already completed; no second completion call.
    AlreadyDone,
    /// The classifier decided the message is not a work request.
    NotATask,
    /// The event key was already processed.
    Duplicate,
    /// A deliverable arrived in a thread with no tracked task.
    NoTaskForThread,
    /// Tracker item creation failed; nothing was persisted.
    CreationFailed {
        /// Failure description for logs and the HTTP response.
        reason: String,
    },
    /// Tracker completion failed after the deliverable was received.
    CompletionFailed {
        /// Failure description for logs and the HTTP response.
        reason: String,
    },
    /// The event matched a suppression guard and was skipped.
    Ignored(&'static str),
}

/// Orchestrator wiring validation, dedup, classification, tracking, and
/// notification into the per-thread state machine.
pub struct EventRouter {
    config: Arc<GlobalConfig>,
    dedup: DedupRepo,
    tasks: TaskRepo,
    classifier: Arc<dyn Classify>,
    tracker: Arc<dyn TrackTasks>,
    notifier: Arc<dyn Notify>,
    identity: Arc<dyn ResolveIdentity>,
}

impl EventRouter {
    /// Assemble the router from its collaborators.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        db: Arc<Database>,
        classifier: Arc<dyn Classify>,
        tracker: Arc<dyn TrackTasks>,
        notifier: Arc<dyn Notify>,
        identity: Arc<dyn ResolveIdentity>,
    ) -> Self {
        Self {
            config,
            dedup: DedupRepo::new(Arc::clone(&db)),
            tasks: TaskRepo::new(db),
            classifier,
            tracker,
            notifier,
            identity,
        }
    }

    /// Route one inbound event through the state machine.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` only for unexpected persistence failures;
    /// every business-logic branch resolves to a [`RouterOutcome`].
    pub async fn handle_event(&self, event: InboundEvent) -> Result<RouterOutcome> {
        // ── Suppression guards (side-effect free) ───────────
        if event.is_bot_message() {
            return Ok(RouterOutcome::Ignored("bot message"));
        }
        if let Some(own_id) = &self.config.slack.bot_user_id {
            if &event.user == own_id {
                return Ok(RouterOutcome::Ignored("own message"));
            }
        }
        if !self.config.channel_allowed(&event.channel) {
            return Ok(RouterOutcome::Ignored("channel not allowed"));
        }

        // ── Duplicate suppression, before any side effect ───
        let ttl = chrono::Duration::seconds(i64::try_from(self.config.dedup.ttl_seconds).unwrap_or(600));
        let is_new = match self.dedup.check_and_mark(&event.event_key, ttl).await {
            Ok(is_new) => is_new,
            Err(err) => {
                // Fail open: losing dedup occasionally is less harmful
                // than dropping a legitimate event.
                warn!(event_key = %event.event_key, %err, "dedup store unavailable; processing anyway");
                true
            }
        };
        if !is_new {
            debug!(event_key = %event.event_key, "duplicate delivery suppressed");
            return Ok(RouterOutcome::Duplicate);
        }

        if event.is_thread_file_delivery() {
            self.handle_file_delivery(&event).await
        } else {
            self.handle_plain_message(&event).await
        }
    }

    // ── NoTask → Open ───────────────────────────────────────

    async fn handle_plain_message(&self, event: &InboundEvent) -> Result<RouterOutcome> {
        if event.text.trim().is_empty() {
            return Ok(RouterOutcome::Ignored("empty message"));
        }

        let verdict = self.classifier.classify(&event.text).await;
        if !verdict.is_task {
            return Ok(RouterOutcome::NotATask);
        }

        // Acknowledge receipt before the (slow) create call, mirroring
        // what a human sees: the request was noticed. A repeat reaction
        // from a retried delivery reports AlreadyApplied, which is fine.
        match self
            .notifier
            .react(&event.channel, &event.ts, &self.config.slack.ack_emoji)
            .await
        {
            Ok(ReactionOutcome::Applied) => {}
            Ok(ReactionOutcome::AlreadyApplied) => {
                debug!(ts = %event.ts, "reaction already present");
            }
            Err(err) => warn!(%err, "ack reaction failed"),
        }

        let author = self.identity.resolve(&event.user).await;
        let task_id = match self
            .tracker
            .create_task(&verdict.summary, &author.display, &event.origin_link())
            .await
        {
            Ok(task_id) => task_id,
            Err(err) => {
                // Release the dedup claim so the platform's retry of
                // this delivery is not dropped as a duplicate.
                if let Err(release_err) = self.dedup.release(&event.event_key).await {
                    warn!(%release_err, "failed to release dedup claim");
                }
                warn!(%err, "tracker creation failed; no record persisted");
                return Ok(RouterOutcome::CreationFailed {
                    reason: err.to_string(),
                });
            }
        };

        let record = TaskRecord::new(
            event.ts.clone(),
            task_id.clone(),
            verdict.summary.clone(),
            event.user.clone(),
        );
        self.tasks.put(&record).await?;

        if let Err(err) = self
            .notifier
            .post(&event.channel, &event.ts, &self.config.slack.ack_message)
            .await
        {
            warn!(%err, "ack message failed");
        }

        info!(task_id, thread_key = %event.ts, "task created");
        Ok(RouterOutcome::Created { task_id })
    }

    // ── Open → Done ─────────────────────────────────────────

    async fn handle_file_delivery(&self, event: &InboundEvent) -> Result<RouterOutcome> {
        let Some(file) = event.first_accepted_file(&self.config.image_extensions) else {
            return Ok(RouterOutcome::Ignored("non-image attachment"));
        };

        let thread_key = event.thread_key();
        let Some(record) = self.tasks.get(thread_key).await? else {
            // Never fabricate a task on completion; tell a human instead.
            warn!(thread_key, "deliverable in thread with no tracked task");
            if let Err(err) = self
                .notifier
                .post(
                    &event.channel,
                    thread_key,
                    "⚠️ No tracked task found for this thread — the file was not recorded.",
                )
                .await
            {
                warn!(%err, "missing-task warning failed");
            }
            return Ok(RouterOutcome::NoTaskForThread);
        };

        if !record.state.can_transition_to(TaskState::Done) {
            debug!(thread_key, "task already done; ignoring repeat deliverable");
            return Ok(RouterOutcome::AlreadyDone);
        }

        let assignee = self.identity.resolve(&event.user).await;
        let completed_at = file
            .created
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        // First delivery wins. The index claim is taken before the
        // tracker RPC so concurrent deliverables on the same thread race
        // on the atomic update, not on the external call: the loser sees
        // Done here and never issues a second completion, so duration
        // and assignee are never overwritten.
        if !self
            .tasks
            .claim_done(thread_key, &assignee.tracker, completed_at)
            .await?
        {
            debug!(thread_key, "lost the completion claim; task already done");
            return Ok(RouterOutcome::AlreadyDone);
        }

        if let Err(err) = self
            .tracker
            .complete_task(
                &record.task_id,
                &assignee.tracker,
                completed_at,
                record.created_at,
            )
            .await
        {
            // The deliverable cannot be "un-delivered"; report, do not
            // retry — but release the claim so a redelivery can finish
            // the job, mirroring the dedup release on failed creation.
            if let Err(reopen_err) = self.tasks.reopen(thread_key).await {
                warn!(%reopen_err, "failed to reopen task after completion failure");
            }
            warn!(task_id = %record.task_id, %err, "tracker completion failed");
            if let Err(post_err) = self
                .notifier
                .post(
                    &event.channel,
                    thread_key,
                    &format!("⚠️ Couldn't mark the task done in the tracker ({err}). Please update it manually."),
                )
                .await
            {
                warn!(%post_err, "completion-failure notice failed");
            }
            return Ok(RouterOutcome::CompletionFailed {
                reason: err.to_string(),
            });
        }

        match self
            .notifier
            .react(&event.channel, &event.ts, &self.config.slack.done_emoji)
            .await
        {
            Ok(ReactionOutcome::Applied) => {}
            Ok(ReactionOutcome::AlreadyApplied) => {
                debug!(ts = %event.ts, "reaction already present");
            }
            Err(err) => warn!(%err, "done reaction failed"),
        }

        let ack = if assignee.tracker.is_missing() {
            format!(
                "🎉 Deliverable received — task marked done. No tracker identity is mapped for <@{}>; it was completed unassigned.",
                event.user
            )
        } else {
            "🎉 Deliverable received — task marked done.".to_owned()
        };
        if let Err(err) = self.notifier.post(&event.channel, thread_key, &ack).await {
            warn!(%err, "completion ack failed");
        }

        info!(task_id = %record.task_id, thread_key, "task completed");
        Ok(RouterOutcome::Completed {
            task_id: record.task_id,
        })
    }
}
