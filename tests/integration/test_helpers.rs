#![allow(dead_code)]

//! Shared fixtures: in-memory wiring of the event router with fake
//! gateways that record every outbound call for assertions.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use taskbridge::classifier::Classify;
use taskbridge::errors::AppError;
use taskbridge::identity::{DisplayIdentity, ResolveIdentity};
use taskbridge::models::classification::ClassificationResult;
use taskbridge::models::event::{InboundEvent, SlackFile};
use taskbridge::models::task::TrackerAssignee;
use taskbridge::notify::{Notify, ReactionOutcome};
use taskbridge::persistence::db::{self, Database};
use taskbridge::persistence::task_repo::TaskRepo;
use taskbridge::router::EventRouter;
use taskbridge::tracker::TrackTasks;
use taskbridge::GlobalConfig;
use taskbridge::Result;

pub const CHANNEL: &str = "C0DESIGN";

/// Parse a minimal but valid configuration for router tests.
pub fn test_config() -> GlobalConfig {
    GlobalConfig::from_toml_str(
        r#"
db_path = ":memory:"

[slack]
bot_user_id = "U0BRIDGE"

[tracker]
board_id = "4422"
"#,
    )
    .expect("test config parses")
}

/// Classifier fake returning a fixed verdict.
pub struct FakeClassifier {
    pub verdict: ClassificationResult,
}

impl FakeClassifier {
    pub fn task(summary: &str) -> Self {
        Self {
            verdict: ClassificationResult {
                is_task: true,
                summary: summary.to_owned(),
            },
        }
    }

    pub fn not_a_task() -> Self {
        Self {
            verdict: ClassificationResult::not_a_task(),
        }
    }
}

impl Classify for FakeClassifier {
    fn classify(
        &self,
        _text: &str,
    ) -> Pin<Box<dyn Future<Output = ClassificationResult> + Send + '_>> {
        let verdict = self.verdict.clone();
        Box::pin(async move { verdict })
    }
}

/// Tracker fake recording create and complete calls.
#[derive(Default)]
pub struct FakeTracker {
    pub fail_create: AtomicBool,
    pub fail_complete: AtomicBool,
    /// Holds every complete call in flight for this long, so tests can
    /// interleave a concurrent delivery while the RPC is outstanding.
    pub complete_hold_ms: AtomicU64,
    /// (summary, author, origin_link) per create call.
    pub creates: Mutex<Vec<(String, String, String)>>,
    /// (task_id, assignee, completed_at, created_at) per complete call.
    pub completions: Mutex<Vec<(String, TrackerAssignee, DateTime<Utc>, DateTime<Utc>)>>,
}

impl TrackTasks for FakeTracker {
    fn create_task(
        &self,
        summary: &str,
        author: &str,
        origin_link: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let summary = summary.to_owned();
        let author = author.to_owned();
        let origin_link = origin_link.to_owned();
        Box::pin(async move {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(AppError::Tracker("simulated outage".into()));
            }
            let mut creates = self.creates.lock().unwrap();
            creates.push((summary, author, origin_link));
            Ok(format!("item-{}", creates.len()))
        })
    }

    fn complete_task(
        &self,
        task_id: &str,
        assignee: &TrackerAssignee,
        completed_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let task_id = task_id.to_owned();
        let assignee = assignee.clone();
        Box::pin(async move {
            if self.fail_complete.load(Ordering::SeqCst) {
                return Err(AppError::Tracker("simulated outage".into()));
            }
            let hold = self.complete_hold_ms.load(Ordering::SeqCst);
            if hold > 0 {
                tokio::time::sleep(Duration::from_millis(hold)).await;
            }
            self.completions
                .lock()
                .unwrap()
                .push((task_id, assignee, completed_at, created_at));
            Ok(())
        })
    }
}

/// Notifier fake recording reactions and thread posts.
#[derive(Default)]
pub struct FakeNotifier {
    pub already_applied: AtomicBool,
    /// (channel, ts, emoji) per reaction.
    pub reactions: Mutex<Vec<(String, String, String)>>,
    /// (channel, thread_ts, text) per post.
    pub posts: Mutex<Vec<(String, String, String)>>,
}

impl Notify for FakeNotifier {
    fn react(
        &self,
        channel: &str,
        ts: &str,
        emoji: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ReactionOutcome>> + Send + '_>> {
        let entry = (channel.to_owned(), ts.to_owned(), emoji.to_owned());
        Box::pin(async move {
            self.reactions.lock().unwrap().push(entry);
            if self.already_applied.load(Ordering::SeqCst) {
                Ok(ReactionOutcome::AlreadyApplied)
            } else {
                Ok(ReactionOutcome::Applied)
            }
        })
    }

    fn post(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let entry = (channel.to_owned(), thread_ts.to_owned(), text.to_owned());
        Box::pin(async move {
            self.posts.lock().unwrap().push(entry);
            Ok(())
        })
    }
}

/// Resolver fake backed by a plain map; misses stay unassigned.
pub struct FakeResolver {
    pub map: HashMap<String, String>,
}

impl FakeResolver {
    pub fn from_entries(entries: &[(&str, &str)]) -> Self {
        Self {
            map: entries
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        }
    }
}

impl ResolveIdentity for FakeResolver {
    fn resolve(&self, user_id: &str) -> Pin<Box<dyn Future<Output = DisplayIdentity> + Send + '_>> {
        let user_id = user_id.to_owned();
        Box::pin(async move {
            match self.map.get(&user_id) {
                Some(mapped) => DisplayIdentity {
                    display: mapped.clone(),
                    tracker: TrackerAssignee::Resolved(mapped.clone()),
                },
                None => DisplayIdentity {
                    display: user_id,
                    tracker: TrackerAssignee::Missing,
                },
            }
        })
    }
}

/// A fully wired router over an in-memory database, with handles onto
/// the fakes for assertions.
pub struct Harness {
    pub router: EventRouter,
    pub db: Arc<Database>,
    pub tracker: Arc<FakeTracker>,
    pub notifier: Arc<FakeNotifier>,
    pub config: Arc<GlobalConfig>,
}

impl Harness {
    pub fn tasks(&self) -> TaskRepo {
        TaskRepo::new(Arc::clone(&self.db))
    }
}

pub async fn harness(classifier: FakeClassifier) -> Harness {
    harness_with(test_config(), classifier, &[("U0JANA", "jana@example.com")]).await
}

pub async fn harness_with(
    config: GlobalConfig,
    classifier: FakeClassifier,
    identities: &[(&str, &str)],
) -> Harness {
    let config = Arc::new(config);
    let db = Arc::new(db::connect_memory().await.expect("in-memory db"));
    let tracker = Arc::new(FakeTracker::default());
    let notifier = Arc::new(FakeNotifier::default());

    let router = EventRouter::new(
        Arc::clone(&config),
        Arc::clone(&db),
        Arc::new(classifier),
        Arc::clone(&tracker) as Arc<dyn TrackTasks>,
        Arc::clone(&notifier) as Arc<dyn Notify>,
        Arc::new(FakeResolver::from_entries(identities)),
    );

    Harness {
        router,
        db,
        tracker,
        notifier,
        config,
    }
}

/// A root-channel message event.
pub fn message(event_key: &str, ts: &str, user: &str, text: &str) -> InboundEvent {
    InboundEvent {
        event_key: event_key.to_owned(),
        channel: CHANNEL.to_owned(),
        ts: ts.to_owned(),
        thread_ts: None,
        user: user.to_owned(),
        text: text.to_owned(),
        files: vec![],
        subtype: None,
        bot_id: None,
    }
}

/// A thread reply carrying one attached file.
pub fn file_reply(
    event_key: &str,
    ts: &str,
    thread_ts: &str,
    user: &str,
    file_name: &str,
    created: Option<i64>,
) -> InboundEvent {
    InboundEvent {
        event_key: event_key.to_owned(),
        channel: CHANNEL.to_owned(),
        ts: ts.to_owned(),
        thread_ts: Some(thread_ts.to_owned()),
        user: user.to_owned(),
        text: String::new(),
        files: vec![SlackFile {
            name: file_name.to_owned(),
            created,
        }],
        subtype: None,
        bot_id: None,
    }
}
