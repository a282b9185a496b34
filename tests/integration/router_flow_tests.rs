//! Message-to-task creation flows through the event router.

use std::sync::atomic::Ordering;

use taskbridge::models::task::TaskState;
use taskbridge::router::RouterOutcome;

use super::test_helpers::{harness, harness_with, message, FakeClassifier, CHANNEL};

const ROOT_TS: &str = "1726000000.000100";

#[tokio::test]
async fn actionable_message_creates_and_indexes_a_task() {
    let h = harness(FakeClassifier::task("Matchday banner")).await;

    let outcome = h
        .router
        .handle_event(message("Ev0001", ROOT_TS, "U0AUTHOR", "need a banner for Saturday"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        RouterOutcome::Created {
            task_id: "item-1".to_owned()
        }
    );

    let record = h.tasks().get(ROOT_TS).await.unwrap().unwrap();
    assert_eq!(record.task_id, "item-1");
    assert_eq!(record.summary, "Matchday banner");
    assert_eq!(record.author_user_id, "U0AUTHOR");
    assert_eq!(record.state, TaskState::Open);

    let creates = h.tracker.creates.lock().unwrap();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].0, "Matchday banner");
    assert!(creates[0].2.contains(CHANNEL));
    assert!(creates[0].2.contains(ROOT_TS));
}

#[tokio::test]
async fn creation_acknowledges_in_channel() {
    let h = harness(FakeClassifier::task("Matchday banner")).await;
    h.router
        .handle_event(message("Ev0001", ROOT_TS, "U0AUTHOR", "need a banner"))
        .await
        .unwrap();

    let reactions = h.notifier.reactions.lock().unwrap();
    assert_eq!(
        reactions.as_slice(),
        &[(CHANNEL.to_owned(), ROOT_TS.to_owned(), "robot_face".to_owned())]
    );

    let posts = h.notifier.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].1, ROOT_TS);
    assert_eq!(posts[0].2, h.config.slack.ack_message);
}

#[tokio::test]
async fn non_task_message_leaves_no_trace() {
    let h = harness(FakeClassifier::not_a_task()).await;

    let outcome = h
        .router
        .handle_event(message("Ev0001", ROOT_TS, "U0AUTHOR", "lol nice one"))
        .await
        .unwrap();
    assert_eq!(outcome, RouterOutcome::NotATask);

    assert!(h.tasks().get(ROOT_TS).await.unwrap().is_none());
    assert!(h.tracker.creates.lock().unwrap().is_empty());
    assert!(h.notifier.reactions.lock().unwrap().is_empty());
    assert!(h.notifier.posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn bot_authored_messages_are_ignored() {
    let h = harness(FakeClassifier::task("should never run")).await;

    let mut event = message("Ev0001", ROOT_TS, "U0AUTHOR", "automated notice");
    event.bot_id = Some("B0BOT".to_owned());
    let outcome = h.router.handle_event(event).await.unwrap();
    assert_eq!(outcome, RouterOutcome::Ignored("bot message"));

    let mut event = message("Ev0002", ROOT_TS, "U0AUTHOR", "automated notice");
    event.subtype = Some("bot_message".to_owned());
    let outcome = h.router.handle_event(event).await.unwrap();
    assert_eq!(outcome, RouterOutcome::Ignored("bot message"));

    assert!(h.tracker.creates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn the_bridges_own_messages_are_ignored() {
    let h = harness(FakeClassifier::task("should never run")).await;

    let outcome = h
        .router
        .handle_event(message("Ev0001", ROOT_TS, "U0BRIDGE", "✅ Task created!"))
        .await
        .unwrap();
    assert_eq!(outcome, RouterOutcome::Ignored("own message"));
    assert!(h.tracker.creates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn events_from_unlisted_channels_are_ignored() {
    let mut config = super::test_helpers::test_config();
    config.slack.channel_allowlist = vec!["C0OTHER".to_owned()];
    let h = harness_with(config, FakeClassifier::task("should never run"), &[]).await;

    let outcome = h
        .router
        .handle_event(message("Ev0001", ROOT_TS, "U0AUTHOR", "need a banner"))
        .await
        .unwrap();
    assert_eq!(outcome, RouterOutcome::Ignored("channel not allowed"));
    assert!(h.tracker.creates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn blank_messages_are_ignored() {
    let h = harness(FakeClassifier::task("should never run")).await;

    let outcome = h
        .router
        .handle_event(message("Ev0001", ROOT_TS, "U0AUTHOR", "   "))
        .await
        .unwrap();
    assert_eq!(outcome, RouterOutcome::Ignored("empty message"));
    assert!(h.tracker.creates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn redelivered_event_is_suppressed_as_duplicate() {
    let h = harness(FakeClassifier::task("Matchday banner")).await;
    let event = message("Ev0001", ROOT_TS, "U0AUTHOR", "need a banner");

    let first = h.router.handle_event(event.clone()).await.unwrap();
    assert!(matches!(first, RouterOutcome::Created { .. }));

    let second = h.router.handle_event(event).await.unwrap();
    assert_eq!(second, RouterOutcome::Duplicate);

    assert_eq!(h.tracker.creates.lock().unwrap().len(), 1);
    assert_eq!(h.notifier.reactions.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_creation_persists_nothing_and_allows_a_retry() {
    let h = harness(FakeClassifier::task("Matchday banner")).await;
    h.tracker.fail_create.store(true, Ordering::SeqCst);

    let event = message("Ev0001", ROOT_TS, "U0AUTHOR", "need a banner");
    let outcome = h.router.handle_event(event.clone()).await.unwrap();
    assert!(matches!(outcome, RouterOutcome::CreationFailed { .. }));
    assert!(h.tasks().get(ROOT_TS).await.unwrap().is_none());

    // The dedup claim was released, so the platform's retried delivery
    // of the same event id is processed rather than dropped.
    h.tracker.fail_create.store(false, Ordering::SeqCst);
    let retried = h.router.handle_event(event).await.unwrap();
    assert_eq!(
        retried,
        RouterOutcome::Created {
            task_id: "item-1".to_owned()
        }
    );
    assert!(h.tasks().get(ROOT_TS).await.unwrap().is_some());
}

#[tokio::test]
async fn repeated_ack_reaction_does_not_block_creation() {
    let h = harness(FakeClassifier::task("Matchday banner")).await;
    h.notifier.already_applied.store(true, Ordering::SeqCst);

    let outcome = h
        .router
        .handle_event(message("Ev0001", ROOT_TS, "U0AUTHOR", "need a banner"))
        .await
        .unwrap();
    assert!(matches!(outcome, RouterOutcome::Created { .. }));
}

#[tokio::test]
async fn author_identity_is_resolved_for_the_tracker() {
    let h = harness(FakeClassifier::task("Matchday banner")).await;

    h.router
        .handle_event(message("Ev0001", ROOT_TS, "U0JANA", "need a banner"))
        .await
        .unwrap();

    let creates = h.tracker.creates.lock().unwrap();
    assert_eq!(creates[0].1, "jana@example.com");
}
