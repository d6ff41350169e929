//! Chore state: the single persisted record, and the key-value contract it
//! is stored through.
//!
//! The record's whole semantic payload is free text. Structure lives only in
//! the two timestamps: `lastUpdated` (refreshed on every write) and
//! `lastSent` (stamped by the reminder trigger).

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use crate::error::StoreError;

/// Description stored when the record is read before anything was written.
pub const PLACEHOLDER_DESCRIPTION: &str = "No chore assignments have been recorded yet.";

/// The persisted chore record. Serializes with camelCase keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoreState {
    pub description: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub last_sent: Option<DateTime<Utc>>,
}

impl ChoreState {
    /// A fresh record holding the placeholder description.
    pub fn placeholder(now: DateTime<Utc>) -> Self {
        Self {
            description: PLACEHOLDER_DESCRIPTION.into(),
            last_updated: now,
            last_sent: None,
        }
    }

    /// Validate an untrusted wire payload.
    ///
    /// Accepts `{description: string, lastUpdated: string, lastSent?: string | null}`
    /// where both timestamps are RFC 3339. Anything else is a `Validation` error.
    pub fn from_wire(value: &serde_json::Value) -> Result<Self, StoreError> {
        let obj = value
            .as_object()
            .ok_or_else(|| StoreError::Validation("payload must be a JSON object".into()))?;

        let description = match obj.get("description") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(_) => return Err(StoreError::Validation("'description' must be a string".into())),
            None => return Err(StoreError::Validation("'description' is required".into())),
        };

        let last_updated = match obj.get("lastUpdated") {
            Some(serde_json::Value::String(s)) => parse_timestamp("lastUpdated", s)?,
            Some(_) => return Err(StoreError::Validation("'lastUpdated' must be a string".into())),
            None => return Err(StoreError::Validation("'lastUpdated' is required".into())),
        };

        let last_sent = match obj.get("lastSent") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(parse_timestamp("lastSent", s)?),
            Some(_) => {
                return Err(StoreError::Validation(
                    "'lastSent' must be a string or null".into(),
                ));
            }
        };

        Ok(Self {
            description,
            last_updated,
            last_sent,
        })
    }

    /// Render the record as text for the model.
    pub fn describe(&self) -> String {
        let mut out = format!(
            "Current chore assignments:\n{}\n\nLast updated: {}",
            self.description,
            format_timestamp(&self.last_updated)
        );
        if let Some(sent) = &self.last_sent {
            out.push_str(&format!("\nLast reminder sent: {}", format_timestamp(sent)));
        }
        out
    }

    /// Whether a reminder already went out on `now`'s local calendar date.
    pub fn reminder_sent_on(&self, now: DateTime<Utc>, offset: FixedOffset) -> bool {
        self.last_sent
            .is_some_and(|sent| same_local_date(sent, now, offset))
    }
}

fn parse_timestamp(field: &str, s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Validation(format!("'{field}' is not an RFC 3339 timestamp: {e}")))
}

/// Canonical text form for timestamps shown to people and the model.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Compare two instants by calendar date in the given offset, ignoring time of day.
pub fn same_local_date(a: DateTime<Utc>, b: DateTime<Utc>, offset: FixedOffset) -> bool {
    a.with_timezone(&offset).date_naive() == b.with_timezone(&offset).date_naive()
}

/// A minimal durable key-value backend.
///
/// Implementations: SQLite, in-memory (for testing).
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Fetch a raw value by key.
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError>;

    /// Insert or replace a raw value.
    async fn put(&self, key: &str, value: &str) -> std::result::Result<(), StoreError>;

    /// List keys starting with `prefix`, sorted ascending.
    async fn keys_with_prefix(&self, prefix: &str) -> std::result::Result<Vec<String>, StoreError>;
}
