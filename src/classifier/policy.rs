//! Versioned decision-prompt policy.
//!
//! Which phrasings count as a "new task" versus a "follow-up" is a
//! tunable business rule. It lives here as a versioned artifact injected
//! into the gateway, so policy tuning never touches transition logic.

use crate::{AppError, Result};

/// The prompt policy applied to every classification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPolicy {
    version: String,
    template: &'static str,
}

const V1_TEMPLATE: &str = "Decide if this Slack message is a task request. \
A task request asks for new work to be produced; a follow-up comment or \
status question is not. If it is a task, give a short summary suitable as \
a work item title.\n\n\
Message: \"{message}\"\n\n\
Respond in JSON only:\n\
{ \"isTask\": true|false, \"summary\": \"...\" }";

impl PromptPolicy {
    /// Look up a policy by version identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for an unknown version.
    pub fn for_version(version: &str) -> Result<Self> {
        match version {
            "v1" => Ok(Self {
                version: version.to_owned(),
                template: V1_TEMPLATE,
            }),
            other => Err(AppError::Config(format!(
                "unknown classifier prompt version: {other}"
            ))),
        }
    }

    /// The policy's version identifier.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Render the decision prompt for a message.
    #[must_use]
    pub fn render(&self, message: &str) -> String {
        // Quotes inside the message would otherwise close the prompt's
        // quoting early and distort the instruction.
        let sanitized = message.replace('"', "'");
        self.template.replace("{message}", &sanitized)
    }
}
