//! Inbound Slack webhook payload shapes.
//!
//! The Events API delivers a JSON envelope that is either the one-time
//! `url_verification` handshake or an `event_callback` wrapping a message
//! event. Deliveries are at-least-once: the same envelope may arrive more
//! than once, concurrently, and out of order across threads.

use serde::Deserialize;

/// Top-level webhook envelope, discriminated by the `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Pre-authentication handshake; the literal challenge must be echoed back.
    UrlVerification {
        /// Opaque challenge string to return verbatim.
        challenge: String,
    },
    /// A delivered platform event.
    EventCallback {
        /// Unique delivery identifier (`Ev…`), used as the dedup key.
        event_id: Option<String>,
        /// The wrapped event payload.
        event: MessageEvent,
    },
}

/// Raw message event as delivered inside an `event_callback` envelope.
///
/// Non-message event types are filtered out before this is parsed.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    /// Event type discriminator (`message`, `reaction_added`, …).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Message text; absent for pure file-share events.
    #[serde(default)]
    pub text: Option<String>,
    /// Message timestamp; the natural key of the originating message.
    pub ts: String,
    /// Authoring user identifier.
    #[serde(default)]
    pub user: Option<String>,
    /// Root-message timestamp when this message is a thread reply.
    #[serde(default)]
    pub thread_ts: Option<String>,
    /// Conversation channel identifier.
    pub channel: String,
    /// Attached files, if any.
    #[serde(default)]
    pub files: Vec<SlackFile>,
    /// Message subtype (`bot_message`, `message_changed`, …).
    #[serde(default)]
    pub subtype: Option<String>,
    /// Present when the message was authored by a bot integration.
    #[serde(default)]
    pub bot_id: Option<String>,
}

/// A single file attached to a message event.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackFile {
    /// Original filename, used for deliverable-type matching.
    pub name: String,
    /// Upload time as Unix epoch seconds.
    #[serde(default)]
    pub created: Option<i64>,
}

/// One occurrence of a chat message or file-share notification, normalized
/// for routing. Immutable once constructed; not persisted beyond dedup.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Key used for duplicate suppression (delivery id, or message ts).
    pub event_key: String,
    /// Conversation channel identifier.
    pub channel: String,
    /// Message timestamp; acts as the task's natural key.
    pub ts: String,
    /// Root-message timestamp when the message is a thread reply.
    pub thread_ts: Option<String>,
    /// Authoring user identifier; empty for some bot subtypes.
    pub user: String,
    /// Raw message text.
    pub text: String,
    /// Attached files, if any.
    pub files: Vec<SlackFile>,
    /// Message subtype, if any.
    pub subtype: Option<String>,
    /// Bot integration identifier, when bot-authored.
    pub bot_id: Option<String>,
}

impl InboundEvent {
    /// Normalize a delivered message event into an [`InboundEvent`].
    ///
    /// The envelope `event_id` is the dedup key; when the platform omits
    /// it the message timestamp is used instead.
    #[must_use]
    pub fn from_callback(event_id: Option<String>, event: MessageEvent) -> Self {
        let event_key = event_id.unwrap_or_else(|| event.ts.clone());
        Self {
            event_key,
            channel: event.channel,
            ts: event.ts,
            thread_ts: event.thread_ts,
            user: event.user.unwrap_or_default(),
            text: event.text.unwrap_or_default(),
            files: event.files,
            subtype: event.subtype,
            bot_id: event.bot_id,
        }
    }

    /// Whether the event originated from a bot integration.
    #[must_use]
    pub fn is_bot_message(&self) -> bool {
        self.bot_id.is_some() || self.subtype.as_deref() == Some("bot_message")
    }

    /// Whether the event is a file delivery inside an existing thread.
    #[must_use]
    pub fn is_thread_file_delivery(&self) -> bool {
        self.thread_ts.is_some() && !self.files.is_empty()
    }

    /// The thread key correlating this event to its originating task.
    ///
    /// Replies carry the root message's timestamp in `thread_ts`; a root
    /// message is keyed by its own timestamp.
    #[must_use]
    pub fn thread_key(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }

    /// First attached file whose extension is in `accepted` (case-insensitive).
    #[must_use]
    pub fn first_accepted_file(&self, accepted: &[String]) -> Option<&SlackFile> {
        self.files.iter().find(|file| {
            file.name
                .rsplit_once('.')
                .is_some_and(|(_, ext)| accepted.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        })
    }

    /// Deep link back to the originating message, stored on the task.
    #[must_use]
    pub fn origin_link(&self) -> String {
        format!(
            "https://slack.com/app_redirect?channel={}&message_ts={}",
            self.channel, self.ts
        )
    }
}
