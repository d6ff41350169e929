//! Inbound Slack payloads: slash commands (form-encoded) and Events API
//! callbacks (JSON), normalized into [`ChannelMessage`]s.

use chorebot_core::channel::{ChannelId, ChannelMessage, InstructionSource};
use chorebot_core::error::ChannelError;
use serde::Deserialize;
use std::collections::HashMap;

/// A parsed slash command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SlashCommand {
    pub command: String,
    pub text: String,
    pub user_id: String,
    pub user_name: String,
    pub channel_id: String,
    pub response_url: Option<String>,
}

impl SlashCommand {
    /// Parse an `application/x-www-form-urlencoded` body.
    pub fn parse(body: &[u8]) -> Result<Self, ChannelError> {
        let fields: HashMap<String, String> = url::form_urlencoded::parse(body).into_owned().collect();
        let get = |key: &str| fields.get(key).cloned().unwrap_or_default();

        let command = get("command");
        if command.is_empty() {
            return Err(ChannelError::InvalidPayload("slash command without 'command'".into()));
        }

        Ok(Self {
            command,
            text: get("text").trim().to_string(),
            user_id: get("user_id"),
            user_name: get("user_name"),
            channel_id: get("channel_id"),
            response_url: fields.get("response_url").filter(|u| !u.is_empty()).cloned(),
        })
    }

    pub fn into_message(self) -> ChannelMessage {
        ChannelMessage {
            channel_id: ChannelId("slack".into()),
            source: InstructionSource::SlashCommand,
            sender_id: self.user_id,
            sender_name: Some(self.user_name).filter(|n| !n.is_empty()),
            content: self.text,
            chat_id: self.channel_id,
            reply_to_message_id: None,
            response_url: self.response_url,
        }
    }
}

/// Top-level Events API envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        event: SlackEvent,
        #[serde(default)]
        event_id: Option<String>,
    },
    #[serde(other)]
    Unsupported,
}

impl EventEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self, ChannelError> {
        serde_json::from_slice(body).map_err(|e| ChannelError::InvalidPayload(format!("event body: {e}")))
    }
}

/// The inner event of an `event_callback`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
}

impl SlackEvent {
    /// Turn a mention or direct message into an instruction.
    ///
    /// Bot messages, edits and other subtypes, and messages in public
    /// channels that do not mention the bot are ignored.
    pub fn into_message(self) -> Option<ChannelMessage> {
        if self.bot_id.is_some() || self.subtype.is_some() {
            return None;
        }
        let source = match (self.kind.as_str(), self.channel_type.as_deref()) {
            ("app_mention", _) => InstructionSource::Mention,
            ("message", Some("im")) => InstructionSource::DirectMessage,
            _ => return None,
        };
        let user = self.user?;
        let content = strip_mentions(&self.text);
        if content.is_empty() {
            return None;
        }

        Some(ChannelMessage {
            channel_id: ChannelId("slack".into()),
            source,
            sender_id: user,
            sender_name: None,
            content,
            chat_id: self.channel,
            reply_to_message_id: self.thread_ts.or(self.ts),
            response_url: None,
        })
    }
}

/// Remove `<@U123>` user mentions and tidy whitespace.
pub fn strip_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<@") {
        out.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
