//! End-to-end tests for the chore bot.
//!
//! These wire the real runtime (store, tools, loop, reminder, gateway) the
//! way the binary does and swap only the completion provider and the chat
//! channel for scripted stand-ins.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chorebot::Runtime;
use chorebot_agent::loop_runner::GENERIC_FALLBACK;
use chorebot_agent::{ReminderOutcome, Termination};
use chorebot_config::AppConfig;
use chorebot_core::channel::{Channel, ChannelId};
use chorebot_core::error::{ChannelError, ProviderError};
use chorebot_core::message::{Message, MessageToolCall, Role};
use chorebot_core::provider::{FinishReason, Provider, ProviderRequest, ProviderResponse, Usage};
use http_body_util::BodyExt;
use tower::ServiceExt;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence and records
/// every request.
struct ScriptedProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
    /// Returned once the script is exhausted
    fallback: Option<ProviderResponse>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            fallback: None,
        }
    }

    fn forever(response: ProviderResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new(vec![])
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Tool-result messages seen in the last request.
    fn last_tool_results(&self) -> Vec<String> {
        let requests = self.requests.lock().unwrap();
        requests
            .last()
            .map(|r| {
                r.messages
                    .iter()
                    .filter(|m| m.role == Role::Tool)
                    .map(|m| m.content.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return self.fallback.clone().ok_or_else(|| ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            });
        }
        Ok(responses.remove(0))
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        finish_reason: FinishReason::Stop,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "e2e-model".into(),
    }
}

fn tool_response(name: &str, args: serde_json::Value) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls = vec![MessageToolCall {
        id: format!("call_{name}"),
        name: name.into(),
        arguments: args.to_string(),
    }];
    ProviderResponse {
        message,
        finish_reason: FinishReason::ToolCalls,
        usage: None,
        model: "e2e-model".into(),
    }
}

// ── Mock Channel ─────────────────────────────────────────────────────────

struct RecordingChannel {
    id: ChannelId,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingChannel {
    fn new() -> Self {
        Self {
            id: ChannelId("recording".into()),
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn send(&self, chat_id: &str, content: &str, _: Option<&str>) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push((chat_id.into(), content.into()));
        Ok(())
    }
}

fn memory_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.store.backend = "memory".into();
    config
}

async fn runtime(provider: Arc<ScriptedProvider>) -> Runtime {
    Runtime::with_provider(memory_config(), provider).await.unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_direct_answer_touches_nothing() {
    let provider = Arc::new(ScriptedProvider::new(vec![text_response("Hi! Ask me about chores.")]));
    let rt = runtime(provider.clone()).await;
    let before = rt.store.read().await.unwrap();

    let outcome = rt.agent.run("hello").await;
    assert_eq!(outcome.termination, Termination::Stop);
    assert_eq!(outcome.text, "Hi! Ask me about chores.");
    assert_eq!(outcome.tool_calls, 0);
    assert_eq!(provider.calls(), 1);
    assert_eq!(rt.store.read().await.unwrap(), before);
}

#[tokio::test]
async fn e2e_update_then_read_back() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(
            "updateState",
            serde_json::json!({ "description": "Alice: trash, Bob: dishes" }),
        ),
        text_response("Got it."),
        tool_response("readState", serde_json::json!({})),
        text_response("Alice has trash and Bob has dishes."),
    ]));
    let rt = runtime(provider.clone()).await;
    let before = rt.store.read().await.unwrap();

    let update = rt.agent.run("Alice takes trash, Bob takes dishes").await;
    assert_eq!(update.text, "Got it.");
    let written = rt.store.read().await.unwrap();
    assert!(written.last_updated > before.last_updated);

    let read = rt.agent.run("Who does what?").await;
    assert_eq!(read.text, "Alice has trash and Bob has dishes.");

    let results = provider.last_tool_results();
    assert_eq!(results.len(), 1);
    assert!(results[0].contains("Alice: trash"));
    assert!(results[0].contains("Bob: dishes"));
    assert!(results[0].contains(&chorebot_core::state::format_timestamp(&written.last_updated)));

    // Reading never changes the timestamps
    assert_eq!(rt.store.read().await.unwrap(), written);
}

#[tokio::test]
async fn e2e_runaway_tool_calls_capped_at_five() {
    let provider = Arc::new(ScriptedProvider::forever(tool_response("readState", serde_json::json!({}))));
    let rt = runtime(provider.clone()).await;

    let outcome = rt.agent.run("loop forever").await;
    assert_eq!(outcome.termination, Termination::IterationExceeded);
    assert_eq!(outcome.text, GENERIC_FALLBACK);
    assert_eq!(provider.calls(), 5);
}

#[tokio::test]
async fn e2e_unknown_tool_reported_to_model() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response("deleteEverything", serde_json::json!({})),
        text_response("I can't do that."),
    ]));
    let rt = runtime(provider.clone()).await;

    let outcome = rt.agent.run("wipe it").await;
    assert_eq!(outcome.text, "I can't do that.");
    let results = provider.last_tool_results();
    assert!(results[0].contains("Unknown operation"));
}

#[tokio::test]
async fn e2e_calendar_tool_absent_without_credentials() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(
            "createCalendarEvent",
            serde_json::json!({
                "summary": "Clean gutters",
                "startDateTime": "2026-01-10T10:00:00",
                "endDateTime": "2026-01-10T11:00:00"
            }),
        ),
        text_response("Calendar isn't set up."),
    ]));
    let rt = runtime(provider.clone()).await;

    let outcome = rt.agent.run("schedule gutters").await;
    assert_eq!(outcome.termination, Termination::Stop);

    let requests = provider.requests.lock().unwrap();
    let tool_names: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert!(!tool_names.contains(&"createCalendarEvent"));
}

#[tokio::test]
async fn e2e_reminder_once_per_day() {
    let provider = Arc::new(ScriptedProvider::forever(text_response("Reminder: Alice has trash today.")));
    let rt = runtime(provider.clone()).await;
    let channel = Arc::new(RecordingChannel::new());

    let trigger = rt.reminder(channel.clone(), Some("C0HOUSE".into())).unwrap();
    let first = trigger.fire().await.unwrap();
    assert!(matches!(first, ReminderOutcome::Sent { .. }));
    assert!(rt.store.read().await.unwrap().last_sent.is_some());

    let second = trigger.fire().await.unwrap();
    assert!(matches!(second, ReminderOutcome::Skipped { .. }));
    assert_eq!(provider.calls(), 1);
    assert_eq!(channel.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn e2e_gateway_state_api_over_runtime() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let rt = runtime(provider).await;
    let state = Arc::new(rt.gateway_state(Arc::new(RecordingChannel::new()), None));
    let app = chorebot_gateway::build_router(state);

    let body = r#"{"description":"Carol: laundry","lastUpdated":"2026-01-05T13:00:00.000Z"}"#;
    let post = Request::builder()
        .method("POST")
        .uri("/state")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    assert_eq!(app.clone().oneshot(post).await.unwrap().status(), StatusCode::OK);

    let get = Request::builder().uri("/state").body(Body::empty()).unwrap();
    let response = app.oneshot(get).await.unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["description"], "Carol: laundry");
    assert_eq!(rt.store.read().await.unwrap().description, "Carol: laundry");
}

#[tokio::test]
async fn e2e_sqlite_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.store.path = Some(dir.path().join("chores.db").display().to_string());

    {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response("updateState", serde_json::json!({ "description": "Dave: vacuuming" })),
            text_response("Saved."),
        ]));
        let rt = Runtime::with_provider(config.clone(), provider).await.unwrap();
        rt.agent.run("Dave vacuums now").await;
    }

    let rt = Runtime::with_provider(config, Arc::new(ScriptedProvider::new(vec![]))).await.unwrap();
    let state = rt.store.read().await.unwrap();
    assert_eq!(state.description, "Dave: vacuuming");
    assert_eq!(rt.store.backups().await.unwrap().len(), 1);
}
