//! Monday.com GraphQL tracker gateway.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::config::TrackerConfig;
use crate::models::task::TrackerAssignee;
use crate::{AppError, Result};

use super::TrackTasks;

/// Status column indices on the target board.
const STATUS_WORKING: u8 = 0;
const STATUS_DONE: u8 = 1;

/// Tracker gateway speaking the Monday.com v2 GraphQL API.
pub struct MondayTracker {
    http: reqwest::Client,
    config: TrackerConfig,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl MondayTracker {
    /// Build a tracker gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Tracker` if the HTTP client cannot be built.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|err| AppError::Tracker(format!("failed to build http client: {err}")))?;
        Ok(Self { http, config })
    }

    async fn execute(&self, query: String) -> Result<serde_json::Value> {
        let response = self
            .http
            .post(&self.config.api_url)
            .header("authorization", &self.config.api_token)
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|err| AppError::Tracker(format!("request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Tracker(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let parsed: GraphQlResponse = response
            .json()
            .await
            .map_err(|err| AppError::Tracker(format!("unreadable response: {err}")))?;

        parsed
            .data
            .ok_or_else(|| AppError::Tracker("response carried no data".into()))
    }

    /// Encode column values as the double-quoted JSON string the
    /// GraphQL mutation expects.
    fn encode_column_values(values: &serde_json::Value) -> Result<String> {
        let inner = serde_json::to_string(values)
            .map_err(|err| AppError::Tracker(format!("column encoding failed: {err}")))?;
        serde_json::to_string(&inner)
            .map_err(|err| AppError::Tracker(format!("column encoding failed: {err}")))
    }

    async fn create(&self, summary: &str, author: &str, origin_link: &str) -> Result<String> {
        let now = Utc::now();
        let columns = &self.config.columns;
        let values = json!({
            columns.author.as_str(): author,
            columns.assignee.as_str(): "",
            columns.status.as_str(): { "index": STATUS_WORKING },
            columns.create_date.as_str(): { "date": now.format("%Y-%m-%d").to_string() },
            columns.link.as_str(): { "url": origin_link, "text": "Slack message" },
            columns.time_tracker.as_str(): { "started_at": now.to_rfc3339() },
        });
        let column_values = Self::encode_column_values(&values)?;

        // Item names are embedded in the mutation text; double quotes
        // would terminate the GraphQL string early.
        let item_name = summary.replace('"', "'");
        let query = format!(
            "mutation {{ create_item(board_id: {}, item_name: \"{}\", column_values: {}) {{ id }} }}",
            self.config.board_id, item_name, column_values
        );

        let data = self.execute(query).await?;
        data.pointer("/create_item/id")
            .and_then(|id| match id {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| AppError::Tracker("create_item returned no id".into()))
    }

    async fn complete(
        &self,
        task_id: &str,
        assignee: &TrackerAssignee,
        completed_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let columns = &self.config.columns;
        let values = json!({
            columns.assignee.as_str(): assignee.as_column_value(),
            columns.status.as_str(): { "index": STATUS_DONE },
            columns.time_tracker.as_str(): {
                "started_at": created_at.to_rfc3339(),
                "ended_at": completed_at.to_rfc3339(),
            },
        });
        let column_values = Self::encode_column_values(&values)?;

        let query = format!(
            "mutation {{ change_multiple_column_values(board_id: {}, item_id: {}, column_values: {}) {{ id }} }}",
            self.config.board_id, task_id, column_values
        );

        self.execute(query).await.map(|_| ())
    }
}

impl TrackTasks for MondayTracker {
    fn create_task(
        &self,
        summary: &str,
        author: &str,
        origin_link: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let summary = summary.to_owned();
        let author = author.to_owned();
        let origin_link = origin_link.to_owned();
        Box::pin(async move { self.create(&summary, &author, &origin_link).await })
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
            self.complete(&task_id, &assignee, completed_at, created_at)
                .await
        })
    }
}
