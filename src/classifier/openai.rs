//! OpenAI-backed classifier gateway.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::ClassifierConfig;
use crate::models::classification::ClassificationResult;
use crate::{AppError, Result};

use super::policy::PromptPolicy;
use super::{parse_verdict, Classify};

/// Classifier gateway calling a chat-completions endpoint.
pub struct OpenAiClassifier {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    policy: PromptPolicy,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

impl OpenAiClassifier {
    /// Build a classifier from configuration.
    ///
    /// The HTTP client carries the configured timeout, so a hung call
    /// resolves to the fail-soft verdict instead of blocking the event.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for an unknown prompt version, or
    /// `AppError::Classifier` if the HTTP client cannot be built.
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let policy = PromptPolicy::for_version(&config.prompt_version)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|err| AppError::Classifier(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            policy,
        })
    }

    async fn call(&self, text: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": self.policy.render(text) }],
            "temperature": 0.3,
        });

        let response = self
            .http
            .post(&self.api_url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|err| AppError::Classifier(format!("request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Classifier(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|err| AppError::Classifier(format!("unreadable response: {err}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::Classifier("response contained no choices".into()))
    }
}

impl Classify for OpenAiClassifier {
    fn classify(
        &self,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = ClassificationResult> + Send + '_>> {
        let text = text.to_owned();
        Box::pin(async move {
            match self.call(&text).await {
                Ok(content) => parse_verdict(&content),
                Err(err) => {
                    // Timeouts and transport errors degrade to "not a task".
                    warn!(%err, "classification call failed");
                    ClassificationResult::not_a_task()
                }
            }
        })
    }
}
