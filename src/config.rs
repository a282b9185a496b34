//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

const KEYRING_SERVICE: &str = "taskbridge";

/// Nested Slack configuration for the Events API webhook.
///
/// The signing secret and bot token are loaded at runtime via OS keychain
/// or environment variables, not from the TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// Channels the router accepts events from; empty means all channels.
    #[serde(default)]
    pub channel_allowlist: Vec<String>,
    /// The bridge's own bot user id; events it authored are ignored.
    #[serde(default)]
    pub bot_user_id: Option<String>,
    /// Reaction applied when a task is created.
    #[serde(default = "default_ack_emoji")]
    pub ack_emoji: String,
    /// Reaction applied when a deliverable completes the task.
    #[serde(default = "default_done_emoji")]
    pub done_emoji: String,
    /// Acknowledgement posted into the thread after task creation.
    #[serde(default = "default_ack_message")]
    pub ack_message: String,
    /// Per-call timeout for outbound Slack API requests.
    #[serde(default = "default_slack_timeout")]
    pub timeout_seconds: u64,
    /// Webhook signing secret (populated at runtime).
    #[serde(skip)]
    pub signing_secret: String,
    /// Bot user token used for posting messages (populated at runtime).
    #[serde(skip)]
    pub bot_token: String,
}

fn default_ack_emoji() -> String {
    "robot_face".into()
}

fn default_done_emoji() -> String {
    "white_check_mark".into()
}

fn default_ack_message() -> String {
    "✅ Task created!\nDrop your PNG/JPG here when ready.".into()
}

fn default_slack_timeout() -> u64 {
    10
}

/// Classifier gateway configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ClassifierConfig {
    /// Chat-completions endpoint URL.
    #[serde(default = "default_classifier_url")]
    pub api_url: String,
    /// Model identifier sent to the endpoint.
    #[serde(default = "default_classifier_model")]
    pub model: String,
    /// Decision-prompt policy version to apply.
    #[serde(default = "default_prompt_version")]
    pub prompt_version: String,
    /// Bounded timeout for the classification call; timeout means "not a task".
    #[serde(default = "default_classifier_timeout")]
    pub timeout_seconds: u64,
    /// API key (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

fn default_classifier_url() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}

fn default_classifier_model() -> String {
    "gpt-4".into()
}

fn default_prompt_version() -> String {
    "v1".into()
}

fn default_classifier_timeout() -> u64 {
    15
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_url: default_classifier_url(),
            model: default_classifier_model(),
            prompt_version: default_prompt_version(),
            timeout_seconds: default_classifier_timeout(),
            api_key: String::new(),
        }
    }
}

/// Tracker column identifiers on the target board.
///
/// Defaults match the production board layout; override per deployment.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TrackerColumns {
    /// Text column holding the requesting author.
    #[serde(default = "default_author_column")]
    pub author: String,
    /// Text column holding the resolved assignee.
    #[serde(default = "default_assignee_column")]
    pub assignee: String,
    /// Status column; index 0 is "Working on it", index 1 is "Done".
    #[serde(default = "default_status_column")]
    pub status: String,
    /// Date column holding the creation date.
    #[serde(default = "default_create_date_column")]
    pub create_date: String,
    /// Link column pointing back to the originating message.
    #[serde(default = "default_link_column")]
    pub link: String,
    /// Duration column tracking elapsed working time.
    #[serde(default = "default_time_tracker_column")]
    pub time_tracker: String,
}

fn default_author_column() -> String {
    "text_mkt8cq0ag".into()
}

fn default_assignee_column() -> String {
    "text_mkt8jq0t".into()
}

fn default_status_column() -> String {
    "status".into()
}

fn default_create_date_column() -> String {
    "date4".into()
}

fn default_link_column() -> String {
    "link".into()
}

fn default_time_tracker_column() -> String {
    "duration_mkt8v8yq".into()
}

impl Default for TrackerColumns {
    fn default() -> Self {
        Self {
            author: default_author_column(),
            assignee: default_assignee_column(),
            status: default_status_column(),
            create_date: default_create_date_column(),
            link: default_link_column(),
            time_tracker: default_time_tracker_column(),
        }
    }
}

/// Task tracker gateway configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TrackerConfig {
    /// Tracker GraphQL endpoint URL.
    #[serde(default = "default_tracker_url")]
    pub api_url: String,
    /// Board the created items land on.
    pub board_id: String,
    /// Per-call timeout for tracker RPCs.
    #[serde(default = "default_tracker_timeout")]
    pub timeout_seconds: u64,
    /// Column identifiers on the target board.
    #[serde(default)]
    pub columns: TrackerColumns,
    /// API token (populated at runtime).
    #[serde(skip)]
    pub api_token: String,
}

fn default_tracker_url() -> String {
    "https://api.monday.com/v2".into()
}

fn default_tracker_timeout() -> u64 {
    10
}

/// Duplicate-suppression configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DedupConfig {
    /// How long a processed event key is remembered. Matches the
    /// platform's own retry horizon; entries expire to bound storage.
    #[serde(default = "default_dedup_ttl")]
    pub ttl_seconds: u64,
}

fn default_dedup_ttl() -> u64 {
    600
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_dedup_ttl(),
        }
    }
}

fn default_retention_days() -> u32 {
    30
}

fn default_http_port() -> u16 {
    8080
}

fn default_image_extensions() -> Vec<String> {
    vec!["png".into(), "jpg".into(), "jpeg".into()]
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// HTTP port the webhook endpoint binds.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Path to the `SQLite` database file.
    pub db_path: PathBuf,
    /// Optional path to the identity map TOML file.
    #[serde(default)]
    pub identity_map_path: Option<PathBuf>,
    /// File extensions accepted as task deliverables.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
    /// Days after completion before task records are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Slack connectivity settings.
    pub slack: SlackConfig,
    /// Classifier gateway settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Task tracker gateway settings.
    pub tracker: TrackerConfig,
    /// Duplicate-suppression settings.
    #[serde(default)]
    pub dedup: DedupConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load secrets from OS keychain with env-var fallback.
    ///
    /// Tries the `taskbridge` keyring service first, then falls back to
    /// `SLACK_SIGNING_SECRET` / `SLACK_BOT_TOKEN` / `MONDAY_API_TOKEN` /
    /// `OPENAI_API_KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if neither keychain nor env vars provide
    /// a required secret.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.slack.signing_secret =
            load_credential("slack_signing_secret", "SLACK_SIGNING_SECRET").await?;
        self.slack.bot_token = load_credential("slack_bot_token", "SLACK_BOT_TOKEN").await?;
        self.tracker.api_token = load_credential("tracker_api_token", "MONDAY_API_TOKEN").await?;
        self.classifier.api_key = load_credential("classifier_api_key", "OPENAI_API_KEY").await?;
        Ok(())
    }

    /// Whether events from `channel` should be processed.
    #[must_use]
    pub fn channel_allowed(&self, channel: &str) -> bool {
        self.slack.channel_allowlist.is_empty()
            || self.slack.channel_allowlist.iter().any(|c| c == channel)
    }

    fn validate(&mut self) -> Result<()> {
        if self.tracker.board_id.trim().is_empty() {
            return Err(AppError::Config("tracker.board_id must not be empty".into()));
        }

        if self.image_extensions.is_empty() {
            return Err(AppError::Config(
                "image_extensions must not be empty".into(),
            ));
        }

        // Extension matching is case-insensitive; normalize once here.
        for ext in &mut self.image_extensions {
            *ext = ext.trim_start_matches('.').to_ascii_lowercase();
        }

        if self.dedup.ttl_seconds == 0 {
            return Err(AppError::Config(
                "dedup.ttl_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // Try OS keychain first via spawn_blocking (keyring is synchronous I/O).
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    // Fallback to environment variable.
    env::var(env_key).map_err(|_| {
        AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))
    })
}
