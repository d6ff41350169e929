//! Calendar collaborator and the `createCalendarEvent` tool.
//!
//! [`GoogleCalendarClient`] exchanges a long-lived refresh token for an
//! access token on every call, then inserts the event. There is no token
//! cache and no retry.

use async_trait::async_trait;
use chorebot_config::CalendarConfig;
use chorebot_core::error::ToolError;
use chorebot_core::tool::{Tool, ToolResult};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::invocation::{decode_args, CalendarEventArgs, CREATE_CALENDAR_EVENT};

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("credential exchange failed: {0}")]
    TokenExchange(String),

    #[error("calendar rejected the event (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("calendar request failed: {0}")]
    Network(String),
}

impl From<CalendarError> for ToolError {
    fn from(e: CalendarError) -> Self {
        ToolError::ExecutionFailed {
            tool_name: CREATE_CALENDAR_EVENT.into(),
            reason: e.to_string(),
        }
    }
}

/// Start or end of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    pub time_zone: String,
}

/// The event payload sent to the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
}

/// What the calendar returned for a created event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub html_link: Option<String>,
}

#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn create_event(&self, event: &CalendarEvent) -> Result<CreatedEvent, CalendarError>;
}

/// Google Calendar over REST with an OAuth refresh-token grant.
pub struct GoogleCalendarClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    calendar_id: String,
    token_url: String,
    api_base: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GoogleCalendarClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
        calendar_id: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            calendar_id: calendar_id.into(),
            token_url: GOOGLE_TOKEN_URL.into(),
            api_base: GOOGLE_CALENDAR_API.into(),
        }
    }

    /// Build from config. `None` unless enabled with all three credentials.
    pub fn from_config(config: &CalendarConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        match (&config.client_id, &config.client_secret, &config.refresh_token) {
            (Some(id), Some(secret), Some(refresh)) => {
                Some(Self::new(id, secret, refresh, &config.calendar_id))
            }
            _ => {
                warn!("Calendar enabled but credentials are incomplete; createCalendarEvent disabled");
                None
            }
        }
    }

    /// Point the client at different endpoints (tests, proxies).
    pub fn with_endpoints(mut self, token_url: impl Into<String>, api_base: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn access_token(&self) -> Result<String, CalendarError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::TokenExchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::TokenExchange(format!("status {}: {body}", status.as_u16())));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CalendarError::TokenExchange(format!("unreadable token response: {e}")))?;
        Ok(token.access_token)
    }

    /// `{api_base}/calendars/{calendar_id}/events`, with the id as a single
    /// percent-encoded segment.
    fn events_url(&self) -> Result<url::Url, CalendarError> {
        let mut url = url::Url::parse(&self.api_base)
            .map_err(|e| CalendarError::Network(format!("invalid calendar API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::Network("calendar API base cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);
        Ok(url)
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    async fn create_event(&self, event: &CalendarEvent) -> Result<CreatedEvent, CalendarError> {
        let url = self.events_url()?;
        let token = self.access_token().await?;
        debug!(calendar = %self.calendar_id, summary = %event.summary, "Creating calendar event");

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(event)
            .send()
            .await
            .map_err(|e| CalendarError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Calendar rejected event");
            return Err(CalendarError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await.unwrap_or_default())
    }
}

/// The `createCalendarEvent` tool.
#[derive(Clone)]
pub struct CreateCalendarEventTool {
    calendar: Arc<dyn CalendarClient>,
    time_zone: String,
}

impl CreateCalendarEventTool {
    pub fn new(calendar: Arc<dyn CalendarClient>, time_zone: impl Into<String>) -> Self {
        Self {
            calendar,
            time_zone: time_zone.into(),
        }
    }

    /// Validate the arguments, then make one calendar call.
    pub async fn create(&self, args: CalendarEventArgs) -> Result<ToolResult, ToolError> {
        let event = self.build_event(args)?;
        let created = self.calendar.create_event(&event).await?;

        let mut output = format!(
            "Created calendar event \"{}\" from {} to {} ({}).",
            event.summary, event.start.date_time, event.end.date_time, self.time_zone
        );
        if let Some(link) = created.html_link {
            output.push_str(&format!(" Link: {link}"));
        }
        Ok(ToolResult::ok(output))
    }

    fn build_event(&self, args: CalendarEventArgs) -> Result<CalendarEvent, ToolError> {
        if args.summary.trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "createCalendarEvent: summary must not be empty".into(),
            ));
        }
        let start = parse_event_time("startDateTime", &args.start_date_time)?;
        let end = parse_event_time("endDateTime", &args.end_date_time)?;
        if end <= start {
            return Err(ToolError::InvalidArguments(
                "createCalendarEvent: endDateTime must be after startDateTime".into(),
            ));
        }

        Ok(CalendarEvent {
            summary: args.summary,
            description: args.description.filter(|d| !d.trim().is_empty()),
            start: EventTime {
                date_time: args.start_date_time,
                time_zone: self.time_zone.clone(),
            },
            end: EventTime {
                date_time: args.end_date_time,
                time_zone: self.time_zone.clone(),
            },
        })
    }
}

/// Accepts RFC 3339 or a local `YYYY-MM-DDTHH:MM[:SS]`. Offsets are
/// dropped for ordering; the calendar interprets the string with `timeZone`.
fn parse_event_time(field: &str, value: &str) -> Result<NaiveDateTime, ToolError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .map_err(|_| {
            ToolError::InvalidArguments(format!(
                "createCalendarEvent: {field} '{value}' is not an ISO 8601 date-time"
            ))
        })
}

#[async_trait]
impl Tool for CreateCalendarEventTool {
    fn name(&self) -> &str {
        CREATE_CALENDAR_EVENT
    }

    fn description(&self) -> &str {
        "Create an event on the household calendar, for example a chore that happens at \
         a specific time. Date-times are ISO 8601 in the household's local time zone."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "Short event title"
                },
                "startDateTime": {
                    "type": "string",
                    "description": "Start, e.g. 2026-01-10T10:00:00"
                },
                "endDateTime": {
                    "type": "string",
                    "description": "End, e.g. 2026-01-10T11:00:00"
                },
                "description": {
                    "type": "string",
                    "description": "Optional longer details"
                }
            },
            "required": ["summary", "startDateTime", "endDateTime"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.create(decode_args(CREATE_CALENDAR_EVENT, &arguments)?).await
    }
}
