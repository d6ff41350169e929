//! State and reminder routes.

use axum::{body::Bytes, extract::State, http::StatusCode, response::Json};
use chorebot_core::error::StoreError;
use chorebot_core::state::ChoreState;
use serde::Serialize;
use tracing::{error, info};

use crate::{ApiError, SharedState, api_error};

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::Validation(_) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        other => {
            error!(error = %other, "State store failure");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

/// `GET /state`
pub async fn get_state(State(state): State<SharedState>) -> Result<Json<ChoreState>, ApiError> {
    state.store.read().await.map(Json).map_err(store_error)
}

/// `POST /state`: the body must be the full wire shape. Anything else is
/// rejected before the store is touched.
pub async fn post_state(State(state): State<SharedState>, body: Bytes) -> Result<Json<ChoreState>, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("body is not JSON: {e}")))?;

    let written = state.store.write_json(&value).await.map_err(store_error)?;
    info!(record = %state.store.record(), "State replaced over HTTP");
    Ok(Json(written))
}

#[derive(Debug, Serialize)]
pub struct BackupList {
    pub record: String,
    pub backups: Vec<String>,
}

/// `GET /state/backups`
pub async fn list_backups(State(state): State<SharedState>) -> Result<Json<BackupList>, ApiError> {
    let backups = state.store.backups().await.map_err(store_error)?;
    Ok(Json(BackupList {
        record: state.store.record().to_string(),
        backups,
    }))
}

#[derive(Debug, Serialize)]
pub struct ReminderResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// `POST /reminder`: one tick, same as the scheduler's.
pub async fn fire_reminder(State(state): State<SharedState>) -> Result<Json<ReminderResponse>, ApiError> {
    use chorebot_agent::ReminderOutcome;

    let Some(trigger) = state.reminder.as_ref() else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "reminders are not configured (set reminder.channel)",
        ));
    };

    let outcome = trigger.fire().await.map_err(store_error)?;
    let label = outcome.label();
    let (text, detail) = match outcome {
        ReminderOutcome::Skipped { last_sent } => (None, Some(format!("already sent at {last_sent}"))),
        ReminderOutcome::GenerationFailed { termination, text } => (Some(text), Some(termination.to_string())),
        ReminderOutcome::DeliveryFailed { reason } => (None, Some(reason)),
        ReminderOutcome::Sent { text, .. } => (Some(text), None),
    };
    Ok(Json(ReminderResponse {
        outcome: label,
        text,
        detail,
    }))
}

#[cfg(test)]
mod tests {
    use crate::build_router;
    use crate::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chorebot_agent::{AgentLoop, ReminderTrigger};
    use chorebot_tools::{ToolExecutor, chore_registry};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn get_state_returns_wire_shape() {
        let h = harness(vec![]);
        let app = build_router(h.state);

        let response = app
            .oneshot(Request::builder().uri("/state").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert!(json["description"].is_string());
        assert!(json["lastUpdated"].is_string());
        assert!(json["lastSent"].is_null());
    }

    #[tokio::test]
    async fn post_state_replaces_record() {
        let h = harness(vec![]);
        let app = build_router(h.state);

        let body = r#"{"description":"Alice: trash, Bob: dishes","lastUpdated":"2026-01-05T13:00:00.000Z","lastSent":null}"#;
        let response = app.oneshot(post_json("/state", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["description"], "Alice: trash, Bob: dishes");
        assert_eq!(h.store.read().await.unwrap().description, "Alice: trash, Bob: dishes");
    }

    #[tokio::test]
    async fn malformed_state_is_400_and_unchanged() {
        let h = harness(vec![]);
        h.store.update_description("Alice: trash").await.unwrap();
        let before = h.store.read().await.unwrap();
        let app = build_router(h.state);

        for body in [
            r#"{"lastUpdated":"2026-01-05T13:00:00.000Z"}"#,
            r#"{"description":42,"lastUpdated":"2026-01-05T13:00:00.000Z"}"#,
            "not json",
        ] {
            let response = app.clone().oneshot(post_json("/state", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            let json = json_body(response).await;
            assert!(json["error"].is_string());
        }

        assert_eq!(h.store.read().await.unwrap(), before);
    }

    #[tokio::test]
    async fn backups_listed() {
        let h = harness(vec![]);
        h.store.update_description("Alice: trash").await.unwrap();
        let app = build_router(h.state);

        let response = app
            .oneshot(Request::builder().uri("/state/backups").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["record"], "chore-state");
        let backups = json["backups"].as_array().unwrap();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].as_str().unwrap().starts_with("chore-state:backup:"));
    }

    #[tokio::test]
    async fn reminder_without_trigger_is_503() {
        let h = harness(vec![]);
        let app = build_router(h.state);
        let response = app.oneshot(post_json("/reminder", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn reminder_sends_then_skips() {
        let h = harness_with(vec![], |state| {
            let registry = chore_registry(state.store.clone(), None, "UTC");
            let agent = Arc::new(AgentLoop::new(
                Arc::new(ScriptedProvider::new(vec![stop("Alice: trash today")])),
                Arc::new(ToolExecutor::new(Arc::new(registry))),
                "scripted",
            ));
            let trigger = ReminderTrigger::new(
                state.store.clone(),
                agent,
                state.slack.clone(),
                "C0HOUSE",
                "Remind the household",
            );
            state.with_reminder(Arc::new(trigger))
        });
        let app = build_router(h.state);

        let first = json_body(app.clone().oneshot(post_json("/reminder", "")).await.unwrap()).await;
        assert_eq!(first["outcome"], "sent");
        assert_eq!(first["text"], "Alice: trash today");

        let second = json_body(app.oneshot(post_json("/reminder", "")).await.unwrap()).await;
        assert_eq!(second["outcome"], "skipped");

        let deliveries = h.channel.deliveries.lock().unwrap();
        assert_eq!(
            deliveries.as_slice(),
            &[Delivery::Sent {
                chat_id: "C0HOUSE".into(),
                text: "Alice: trash today".into(),
                thread: None,
            }]
        );
    }
}
