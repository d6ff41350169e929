//! Deferred slash-command answers.
//!
//! Slack hands every slash command a one-off `response_url`. Posting to it
//! needs no bot token, so this client is available to every channel.

use std::time::Duration;

use chorebot_core::error::ChannelError;
use serde_json::json;
use tracing::debug;

#[derive(Clone)]
pub struct ResponseUrlClient {
    client: reqwest::Client,
}

impl ResponseUrlClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// Post a visible-to-channel answer.
    pub async fn post(&self, response_url: &str, content: &str) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(response_url)
            .json(&json!({ "response_type": "in_channel", "text": content }))
            .send()
            .await
            .map_err(|e| delivery_failed(format!("response_url: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(delivery_failed(format!("response_url: HTTP {status}")));
        }
        debug!("Deferred slash-command answer posted");
        Ok(())
    }
}

impl Default for ResponseUrlClient {
    fn default() -> Self {
        Self::new()
    }
}

fn delivery_failed(reason: String) -> ChannelError {
    ChannelError::DeliveryFailed {
        channel: "response_url".into(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    async fn hook(seen: Arc<Mutex<Vec<serde_json::Value>>>) -> String {
        let app = Router::new()
            .route(
                "/hook",
                post(move |Json(body): Json<serde_json::Value>| {
                    let seen = seen.clone();
                    async move {
                        seen.lock().unwrap().push(body);
                        "ok"
                    }
                }),
            )
            .route("/expired", post(|| async { StatusCode::NOT_FOUND }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn posts_in_channel_answer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = hook(seen.clone()).await;

        ResponseUrlClient::new().post(&format!("{base}/hook"), "Bob has dishes.").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["response_type"], "in_channel");
        assert_eq!(seen[0]["text"], "Bob has dishes.");
    }

    #[tokio::test]
    async fn non_success_is_delivery_failure() {
        let base = hook(Arc::new(Mutex::new(Vec::new()))).await;
        let err = ResponseUrlClient::new()
            .post(&format!("{base}/expired"), "late")
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::DeliveryFailed { ref reason, .. } if reason.contains("404")));
    }
}
