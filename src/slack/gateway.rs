//! Slack Web API gateway over the hyper connector.
//!
//! Owns the HTTP client and bot token and exposes the three calls this
//! subsystem needs: reactions, thread replies, and user lookup. Every
//! call carries a bounded timeout; exceeding it is that call's failure
//! path, never a hang.

use std::sync::Arc;
use std::time::Duration;

use slack_morphism::prelude::{
    SlackApiChatPostMessageRequest, SlackApiReactionsAddRequest, SlackApiToken,
    SlackApiTokenType, SlackApiTokenValue, SlackApiUsersInfoRequest, SlackChannelId,
    SlackClient, SlackClientHyperHttpsConnector, SlackClientSession, SlackMessageContent,
    SlackReactionName, SlackTs, SlackUserId,
};
use tokio::time::timeout;

use crate::config::SlackConfig;
use crate::notify::ReactionOutcome;
use crate::{AppError, Result};

/// Slack Web API wrapper shared by the notifier and identity resolver.
pub struct SlackGateway {
    client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    bot_token: SlackApiToken,
    call_timeout: Duration,
}

impl SlackGateway {
    /// Create the gateway from Slack configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the HTTPS connector cannot be created.
    pub fn new(config: &SlackConfig) -> Result<Self> {
        let connector = SlackClientHyperHttpsConnector::new()
            .map_err(|err| AppError::Slack(format!("failed to init slack connector: {err}")))?;
        let client = Arc::new(SlackClient::new(connector));
        let bot_token = SlackApiToken {
            token_value: SlackApiTokenValue(config.bot_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::Bot),
        };

        Ok(Self {
            client,
            bot_token,
            call_timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    fn session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.bot_token)
    }

    /// Add a reaction to a message.
    ///
    /// A second identical reaction attempt (webhook retry, concurrent
    /// delivery) surfaces as `already_reacted` from the API; that is a
    /// success outcome here, not an error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` on timeout or any other API failure.
    pub async fn add_reaction(
        &self,
        channel: &str,
        ts: &str,
        emoji: &str,
    ) -> Result<ReactionOutcome> {
        let request = SlackApiReactionsAddRequest {
            channel: SlackChannelId(channel.to_owned()),
            name: SlackReactionName(emoji.to_owned()),
            timestamp: SlackTs(ts.to_owned()),
        };

        let session = self.session();
        let call = timeout(self.call_timeout, session.reactions_add(&request))
            .await
            .map_err(|_| AppError::Slack("reactions.add timed out".into()))?;

        match call {
            Ok(_) => Ok(ReactionOutcome::Applied),
            Err(slack_morphism::errors::SlackClientError::ApiError(api_err))
                if api_err.code == "already_reacted" =>
            {
                Ok(ReactionOutcome::AlreadyApplied)
            }
            Err(err) => Err(AppError::Slack(format!("reactions.add failed: {err}"))),
        }
    }

    /// Post a message into a thread.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` on timeout or API failure.
    pub async fn post_in_thread(&self, channel: &str, thread_ts: &str, text: &str) -> Result<()> {
        let request = SlackApiChatPostMessageRequest {
            channel: SlackChannelId(channel.to_owned()),
            content: SlackMessageContent {
                text: Some(text.to_owned()),
                blocks: None,
                attachments: None,
                upload: None,
                files: None,
                reactions: None,
                metadata: None,
            },
            as_user: None,
            icon_emoji: None,
            icon_url: None,
            link_names: Some(true),
            parse: None,
            thread_ts: Some(SlackTs(thread_ts.to_owned())),
            username: None,
            reply_broadcast: None,
            unfurl_links: None,
            unfurl_media: None,
        };

        let session = self.session();
        timeout(self.call_timeout, session.chat_post_message(&request))
            .await
            .map_err(|_| AppError::Slack("chat.postMessage timed out".into()))?
            .map_err(|err| AppError::Slack(format!("chat.postMessage failed: {err}")))?;
        Ok(())
    }

    /// Look up a user's display name.
    ///
    /// Returns `Ok(None)` when the profile carries no usable name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` on timeout or API failure.
    pub async fn user_display_name(&self, user_id: &str) -> Result<Option<String>> {
        let request = SlackApiUsersInfoRequest::new(SlackUserId(user_id.to_owned()));

        let session = self.session();
        let response = timeout(self.call_timeout, session.users_info(&request))
            .await
            .map_err(|_| AppError::Slack("users.info timed out".into()))?
            .map_err(|err| AppError::Slack(format!("users.info failed: {err}")))?;

        Ok(response.user.real_name.or(response.user.name))
    }
}
