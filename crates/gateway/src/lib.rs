//! HTTP gateway for Chorebot.
//!
//! - `GET  /health`           : liveness
//! - `GET  /state`            : the chore record (wire shape)
//! - `POST /state`            : replace the record; 400 on a malformed body
//! - `GET  /state/backups`    : date-keyed backup keys
//! - `POST /reminder`         : run one reminder tick now
//! - `POST /slack/commands`   : slash commands (signed)
//! - `POST /slack/events`     : Events API callbacks (signed)
//!
//! The state and reminder routes sit behind an optional bearer token; the
//! Slack routes are authenticated by request signature instead.

pub mod slack_routes;
pub mod state_api;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::{self, Next},
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use chorebot_agent::{AgentLoop, ReminderTrigger};
use chorebot_core::channel::Channel;
use chorebot_core::event::EventBus;
use chorebot_store::ChoreStore;

/// Maximum accepted request body.
pub const BODY_LIMIT: usize = 1024 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub store: Arc<ChoreStore>,
    pub agent: Arc<AgentLoop>,
    /// Where Slack answers go
    pub slack: Arc<dyn Channel>,
    pub reminder: Option<Arc<ReminderTrigger>>,
    pub signing_secret: Option<String>,
    pub api_token: Option<String>,
    pub events: Option<Arc<EventBus>>,
}

impl GatewayState {
    pub fn new(store: Arc<ChoreStore>, agent: Arc<AgentLoop>, slack: Arc<dyn Channel>) -> Self {
        Self {
            store,
            agent,
            slack,
            reminder: None,
            signing_secret: None,
            api_token: None,
            events: None,
        }
    }

    pub fn with_reminder(mut self, reminder: Arc<ReminderTrigger>) -> Self {
        self.reminder = Some(reminder);
        self
    }

    pub fn with_signing_secret(mut self, secret: Option<String>) -> Self {
        self.signing_secret = secret.filter(|s| !s.is_empty());
        self
    }

    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }
}

pub type SharedState = Arc<GatewayState>;

/// JSON error body used by every route.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

/// Build the router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/state", get(state_api::get_state).post(state_api::post_state))
        .route("/state/backups", get(state_api::list_backups))
        .route("/reminder", post(state_api::fire_reminder))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let slack = Router::new()
        .route("/slack/commands", post(slack_routes::command_handler))
        .route("/slack/events", post(slack_routes::event_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            slack_routes::signature_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .merge(slack)
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn serve(state: SharedState, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    if state.signing_secret.is_none() {
        warn!("No Slack signing secret configured; /slack routes will reject every request");
    }
    if state.api_token.is_none() {
        warn!("No gateway api_token configured; /state and /reminder are unauthenticated");
    }

    let app = build_router(state);
    info!(addr = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    record: String,
    backend: String,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        record: state.store.record().to_string(),
        backend: state.store.backend_name().to_string(),
    })
}

/// Bearer-token check for the state and reminder routes.
///
/// Open when no token is configured.
async fn auth_middleware(
    State(state): State<SharedState>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected => Ok(next.run(req).await),
        _ => {
            warn!(path = %req.uri().path(), "Unauthorized request, missing or invalid bearer token");
            Err(api_error(StatusCode::UNAUTHORIZED, "missing or invalid bearer token"))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use chorebot_core::channel::ChannelId;
    use chorebot_core::error::{ChannelError, ProviderError};
    use chorebot_core::message::{Message, MessageToolCall};
    use chorebot_core::provider::{FinishReason, Provider, ProviderRequest, ProviderResponse};
    use chorebot_store::InMemoryBackend;
    use chorebot_tools::{ToolExecutor, chore_registry};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses; answers "done" once the script runs out.
    pub struct ScriptedProvider {
        script: Mutex<VecDeque<ProviderResponse>>,
    }

    impl ScriptedProvider {
        pub fn new(script: Vec<ProviderResponse>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    pub fn stop(text: &str) -> ProviderResponse {
        ProviderResponse {
            message: Message::assistant(text),
            finish_reason: FinishReason::Stop,
            usage: None,
            model: "scripted".into(),
        }
    }

    pub fn call(id: &str, name: &str, arguments: &str) -> ProviderResponse {
        let mut message = Message::assistant("");
        message.tool_calls = vec![MessageToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }];
        ProviderResponse {
            message,
            finish_reason: FinishReason::ToolCalls,
            usage: None,
            model: "scripted".into(),
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(self.script.lock().unwrap().pop_front().unwrap_or_else(|| stop("done")))
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum Delivery {
        Sent { chat_id: String, text: String, thread: Option<String> },
        Responded { url: String, text: String },
    }

    pub struct RecordingChannel {
        id: ChannelId,
        pub deliveries: Mutex<Vec<Delivery>>,
    }

    impl RecordingChannel {
        pub fn new() -> Self {
            Self {
                id: ChannelId("slack".into()),
                deliveries: Mutex::new(Vec::new()),
            }
        }

        /// Wait for the spawned handler to deliver.
        pub async fn wait_for(&self, count: usize) -> Vec<Delivery> {
            for _ in 0..200 {
                {
                    let deliveries = self.deliveries.lock().unwrap();
                    if deliveries.len() >= count {
                        return deliveries.clone();
                    }
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            panic!("expected {count} deliveries");
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        fn id(&self) -> &ChannelId {
            &self.id
        }

        async fn send(&self, chat_id: &str, content: &str, reply_to: Option<&str>) -> Result<(), ChannelError> {
            self.deliveries.lock().unwrap().push(Delivery::Sent {
                chat_id: chat_id.into(),
                text: content.into(),
                thread: reply_to.map(String::from),
            });
            Ok(())
        }

        async fn respond(&self, response_url: &str, content: &str) -> Result<(), ChannelError> {
            self.deliveries.lock().unwrap().push(Delivery::Responded {
                url: response_url.into(),
                text: content.into(),
            });
            Ok(())
        }
    }

    pub struct Harness {
        pub state: SharedState,
        pub store: Arc<ChoreStore>,
        pub channel: Arc<RecordingChannel>,
    }

    pub const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";

    pub fn harness(script: Vec<ProviderResponse>) -> Harness {
        harness_with(script, |s| s)
    }

    pub fn harness_with(
        script: Vec<ProviderResponse>,
        configure: impl FnOnce(GatewayState) -> GatewayState,
    ) -> Harness {
        let store = Arc::new(ChoreStore::new(Arc::new(InMemoryBackend::new()), "chore-state"));
        let registry = chore_registry(store.clone(), None, "UTC");
        let agent = Arc::new(AgentLoop::new(
            Arc::new(ScriptedProvider::new(script)),
            Arc::new(ToolExecutor::new(Arc::new(registry))),
            "scripted",
        ));
        let channel = Arc::new(RecordingChannel::new());
        let state = GatewayState::new(store.clone(), agent, channel.clone())
            .with_signing_secret(Some(SECRET.into()));
        Harness {
            state: Arc::new(configure(state)),
            store,
            channel,
        }
    }
}
