//! Slack Web API channel.
//!
//! Outbound only: answers and reminders go through `chat.postMessage`,
//! slash-command answers through the per-invocation `response_url`.

use std::time::Duration;

use async_trait::async_trait;
use chorebot_config::SlackConfig;
use chorebot_core::channel::{Channel, ChannelId};
use chorebot_core::error::ChannelError;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::response_url::ResponseUrlClient;

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Slack Web API responses always carry `ok`, plus `error` when it is false.
#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct SlackChannel {
    client: reqwest::Client,
    bot_token: String,
    api_base: String,
    channel_id: ChannelId,
    responder: ResponseUrlClient,
}

impl SlackChannel {
    pub fn new(bot_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.into(),
            channel_id: ChannelId("slack".into()),
            responder: ResponseUrlClient::new(),
        }
    }

    /// Build from config. `None` when no bot token is set.
    pub fn from_config(config: &SlackConfig) -> Option<Self> {
        let token = config.bot_token.as_deref().filter(|t| !t.is_empty())?;
        let channel = Self::new(token);
        Some(match &config.api_base {
            Some(base) => channel.with_api_base(base),
            None => channel,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn delivery_failed(reason: impl Into<String>) -> ChannelError {
        ChannelError::DeliveryFailed {
            channel: "slack".into(),
            reason: reason.into(),
        }
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<ApiReply, ChannelError> {
        let url = format!("{}/{method}", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::delivery_failed(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::delivery_failed(format!("{method}: HTTP {status}")));
        }
        response
            .json::<ApiReply>()
            .await
            .map_err(|e| Self::delivery_failed(format!("{method}: unreadable reply: {e}")))
    }
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn send(&self, chat_id: &str, content: &str, reply_to: Option<&str>) -> Result<(), ChannelError> {
        let mut body = json!({ "channel": chat_id, "text": content });
        if let Some(ts) = reply_to {
            body["thread_ts"] = json!(ts);
        }

        let reply = self.call("chat.postMessage", body).await?;
        if !reply.ok {
            let reason = reply.error.unwrap_or_else(|| "unknown_error".into());
            warn!(chat_id = %chat_id, error = %reason, "chat.postMessage rejected");
            return Err(Self::delivery_failed(reason));
        }
        debug!(chat_id = %chat_id, threaded = reply_to.is_some(), "Slack message posted");
        Ok(())
    }

    async fn respond(&self, response_url: &str, content: &str) -> Result<(), ChannelError> {
        self.responder.post(response_url, content).await
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        let reply = self.call("auth.test", json!({})).await?;
        if !reply.ok {
            info!(error = ?reply.error, "Slack auth.test failed");
        }
        Ok(reply.ok)
    }
}
