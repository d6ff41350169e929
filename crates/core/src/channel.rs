//! Channel trait: the abstraction over chat delivery.
//!
//! Inbound instructions arrive over HTTP (see the gateway); a Channel is the
//! outbound half: it posts answers and reminders back to the chat platform.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an instruction came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionSource {
    SlashCommand,
    Mention,
    DirectMessage,
    Schedule,
    Cli,
}

impl std::fmt::Display for InstructionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstructionSource::SlashCommand => "slash_command",
            InstructionSource::Mention => "mention",
            InstructionSource::DirectMessage => "direct_message",
            InstructionSource::Schedule => "schedule",
            InstructionSource::Cli => "cli",
        };
        f.write_str(s)
    }
}

/// A normalized inbound instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// How the instruction arrived
    pub source: InstructionSource,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// The instruction text
    pub content: String,

    /// The conversation/channel identifier to answer in
    pub chat_id: String,

    /// Thread to reply in, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<String>,

    /// Deferred-response callback URL (slash commands)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_url: Option<String>,
}

/// The core Channel trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "slack").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Post a message to a specific chat, optionally in a thread.
    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> std::result::Result<(), ChannelError>;

    /// Answer through a deferred-response URL.
    async fn respond(&self, response_url: &str, content: &str) -> std::result::Result<(), ChannelError> {
        let _ = (response_url, content);
        Err(ChannelError::NotConfigured(format!(
            "channel '{}' does not support deferred responses",
            self.name()
        )))
    }

    /// Health check: are credentials present and valid?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullChannel {
        id: ChannelId,
    }

    #[async_trait]
    impl Channel for NullChannel {
        fn name(&self) -> &str { "null" }
        fn id(&self) -> &ChannelId { &self.id }
        async fn send(&self, _: &str, _: &str, _: Option<&str>) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn default_respond_is_unsupported() {
        let ch = NullChannel { id: ChannelId("null".into()) };
        let err = ch.respond("https://example.com/hook", "hi").await.unwrap_err();
        assert!(matches!(err, ChannelError::NotConfigured(_)));
    }

    #[test]
    fn source_display() {
        assert_eq!(InstructionSource::SlashCommand.to_string(), "slash_command");
        assert_eq!(InstructionSource::Schedule.to_string(), "schedule");
    }
}
