//! Slack inbound routes.
//!
//! Both routes acknowledge inside Slack's three-second window and run the
//! orchestration loop on a spawned task. Slash-command answers go back
//! through the command's `response_url`; mention and DM answers are posted
//! with `chat.postMessage` in the originating thread.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chorebot_channels::{EventEnvelope, SIGNATURE_HEADER, SlashCommand, TIMESTAMP_HEADER, verify_signature};
use chorebot_core::channel::ChannelMessage;
use chorebot_core::event::DomainEvent;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{ApiError, BODY_LIMIT, SharedState, api_error};

/// Shown to the invoking user while the loop runs.
pub const COMMAND_ACK: &str = "Working on it...";

const USAGE: &str = "Tell me what changed or ask about the chores, e.g. `/chores Bob takes over the dishes this week`.";

/// Header Slack sets on redelivered events.
const RETRY_HEADER: &str = "x-slack-retry-num";

/// Reject unsigned, badly signed, and stale requests before any handler
/// (and therefore any state access) runs.
pub async fn signature_middleware(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(secret) = state.signing_secret.as_deref() else {
        warn!("Slack request rejected: no signing secret configured");
        return Err(api_error(StatusCode::UNAUTHORIZED, "request signing is not configured"));
    };

    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|_| api_error(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"))?;

    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let now = chrono::Utc::now().timestamp();
    if let Err(e) = verify_signature(secret, &header(TIMESTAMP_HEADER), &header(SIGNATURE_HEADER), &bytes, now) {
        warn!(error = %e, path = %parts.uri.path(), "Slack signature check failed");
        return Err(api_error(StatusCode::UNAUTHORIZED, e.to_string()));
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// `POST /slack/commands`
pub async fn command_handler(State(state): State<SharedState>, body: Bytes) -> Result<Response, ApiError> {
    let command = SlashCommand::parse(&body).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    if command.text.is_empty() {
        return Ok(ephemeral(USAGE));
    }

    info!(command = %command.command, user = %command.user_name, "Slash command received");
    let message = command.into_message();
    tokio::spawn(answer(state, message));
    Ok(ephemeral(COMMAND_ACK))
}

/// `POST /slack/events`
pub async fn event_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let envelope = EventEnvelope::parse(&body).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    match envelope {
        EventEnvelope::UrlVerification { challenge } => Ok(Json(json!({ "challenge": challenge })).into_response()),
        EventEnvelope::EventCallback { event, event_id } => {
            if let Some(retry) = headers.get(RETRY_HEADER) {
                // The first delivery is already being answered.
                debug!(retry = ?retry, event_id = ?event_id, "Ignoring Slack event redelivery");
                return Ok(StatusCode::OK.into_response());
            }
            match event.into_message() {
                Some(message) => {
                    info!(source = %message.source, channel = %message.chat_id, event_id = ?event_id, "Slack event received");
                    tokio::spawn(answer(state, message));
                }
                None => debug!(event_id = ?event_id, "Slack event ignored"),
            }
            Ok(StatusCode::OK.into_response())
        }
        EventEnvelope::Unsupported => Ok(StatusCode::OK.into_response()),
    }
}

fn ephemeral(text: &str) -> Response {
    Json(json!({ "response_type": "ephemeral", "text": text })).into_response()
}

/// Run the loop and deliver its final text.
async fn answer(state: SharedState, message: ChannelMessage) {
    let outcome = state.agent.handle(&message).await;

    let delivered = match &message.response_url {
        Some(url) => state.slack.respond(url, &outcome.text).await,
        None => {
            state
                .slack
                .send(&message.chat_id, &outcome.text, message.reply_to_message_id.as_deref())
                .await
        }
    };

    if let Err(e) = delivered {
        warn!(error = %e, chat_id = %message.chat_id, "Could not deliver answer to Slack");
        if let Some(bus) = &state.events {
            bus.publish(DomainEvent::ErrorOccurred {
                context: format!("slack delivery to {}", message.chat_id),
                error_message: e.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
    }
}
