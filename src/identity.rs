//! Identity resolution from chat-platform users to tracker identities.
//!
//! Resolution is best-effort enrichment, not a precondition: a lookup
//! miss degrades to a well-defined fallback (the raw platform id for
//! display, the explicit missing sentinel for the tracker) and never
//! fails the request. The policy is uniform across call sites — a
//! missing mapping never blocks completion.

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::models::task::TrackerAssignee;
use crate::slack::gateway::SlackGateway;
use crate::{AppError, Result};

/// Resolved identity of a chat-platform user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayIdentity {
    /// Human-readable name for messages and tracker text columns.
    pub display: String,
    /// Tracker-side identity, or the explicit missing sentinel.
    pub tracker: TrackerAssignee,
}

/// Interface between the event router and identity resolution.
pub trait ResolveIdentity: Send + Sync {
    /// Resolve a chat-platform user id. Infallible by contract: misses
    /// and lookup errors resolve to the documented fallback.
    fn resolve(&self, user_id: &str) -> Pin<Box<dyn Future<Output = DisplayIdentity> + Send + '_>>;
}

/// On-disk identity map format.
///
/// ```toml
/// [users]
/// U0123ABCD = "jana@example.com"
/// ```
#[derive(Debug, Deserialize)]
struct IdentityMapFile {
    #[serde(default)]
    users: HashMap<String, String>,
}

/// Production resolver: externally supplied map, with a Slack profile
/// lookup as display-name fallback for unmapped users.
pub struct DirectoryResolver {
    map: HashMap<String, String>,
    slack: Option<Arc<SlackGateway>>,
}

impl DirectoryResolver {
    /// Build a resolver from an in-memory map.
    #[must_use]
    pub fn new(map: HashMap<String, String>, slack: Option<Arc<SlackGateway>>) -> Self {
        Self { map, slack }
    }

    /// Load the identity map from its TOML file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or parsed.
    pub fn load_map(path: &Path) -> Result<HashMap<String, String>> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read identity map: {err}")))?;
        let parsed: IdentityMapFile = toml::from_str(&raw)?;
        Ok(parsed.users)
    }

    async fn resolve_inner(&self, user_id: &str) -> DisplayIdentity {
        if let Some(mapped) = self.map.get(user_id) {
            return DisplayIdentity {
                display: mapped.clone(),
                tracker: TrackerAssignee::Resolved(mapped.clone()),
            };
        }

        // Unmapped: enrich the display name from the profile when
        // possible, but the tracker identity stays explicitly missing.
        let display = match &self.slack {
            Some(gateway) => match gateway.user_display_name(user_id).await {
                Ok(Some(name)) => name,
                Ok(None) => user_id.to_owned(),
                Err(err) => {
                    warn!(user_id, %err, "profile lookup failed; using raw id");
                    user_id.to_owned()
                }
            },
            None => user_id.to_owned(),
        };

        DisplayIdentity {
            display,
            tracker: TrackerAssignee::Missing,
        }
    }
}

impl ResolveIdentity for DirectoryResolver {
    fn resolve(&self, user_id: &str) -> Pin<Box<dyn Future<Output = DisplayIdentity> + Send + '_>> {
        let user_id = user_id.to_owned();
        Box::pin(async move { self.resolve_inner(&user_id).await })
    }
}
