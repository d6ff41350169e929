//! Console channel: prints to stdout.
//!
//! Stands in for Slack when running `chorebot remind --print` or when no
//! bot token is configured. In the latter case slash-command answers still
//! go to their `response_url`, which needs no token.

use async_trait::async_trait;
use chorebot_core::channel::{Channel, ChannelId};
use chorebot_core::error::ChannelError;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::response_url::ResponseUrlClient;

pub struct ConsoleChannel {
    id: ChannelId,
    out: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    responder: Option<ResponseUrlClient>,
}

impl ConsoleChannel {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }

    pub fn with_writer(out: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            id: ChannelId("console".into()),
            out: Mutex::new(Box::new(out)),
            responder: None,
        }
    }

    /// Post slash-command answers to their `response_url` instead of
    /// printing them.
    pub fn with_responder(mut self, responder: ResponseUrlClient) -> Self {
        self.responder = Some(responder);
        self
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn send(&self, chat_id: &str, content: &str, _reply_to: Option<&str>) -> Result<(), ChannelError> {
        let line = format!("[{chat_id}] {content}\n");
        let mut out = self.out.lock().await;
        let written = async {
            out.write_all(line.as_bytes()).await?;
            out.flush().await
        };
        written.await.map_err(|e| ChannelError::DeliveryFailed {
                channel: "console".into(),
                reason: e.to_string(),
            })
    }

    async fn respond(&self, response_url: &str, content: &str) -> Result<(), ChannelError> {
        match &self.responder {
            Some(responder) => responder.post(response_url, content).await,
            None => self.send("response", content, None).await,
        }
    }
}
