//! `ChoreStore`: the single writer for one named chore record.
//!
//! Every mutation goes validate → stamp → store → backup while holding the
//! record's mutex, so concurrent slash commands and scheduled reminders
//! never interleave a read-modify-write.

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use chorebot_core::error::StoreError;
use chorebot_core::{ChoreState, DomainEvent, EventBus, KvBackend};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Storage front for one chore record.
pub struct ChoreStore {
    backend: Arc<dyn KvBackend>,
    record: String,
    offset: FixedOffset,
    lock: Mutex<()>,
    clock: Clock,
    events: Option<Arc<EventBus>>,
}

impl ChoreStore {
    /// A store for `record` over `backend`, dating backups in UTC.
    pub fn new(backend: Arc<dyn KvBackend>, record: impl Into<String>) -> Self {
        Self {
            backend,
            record: record.into(),
            offset: Utc.fix(),
            lock: Mutex::new(()),
            clock: Arc::new(Utc::now),
            events: None,
        }
    }

    /// Date backup keys in this offset instead of UTC.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Publish `StateWritten` on every successful write.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the wall clock (tests).
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn record(&self) -> &str {
        &self.record
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Prefix shared by every backup key of this record.
    pub fn backup_prefix(&self) -> String {
        format!("{}:backup:", self.record)
    }

    /// Current record. A missing record is created with the placeholder
    /// description and persisted before returning.
    pub async fn read(&self) -> Result<ChoreState, StoreError> {
        let _guard = self.lock.lock().await;
        if let Some(state) = self.load().await? {
            return Ok(state);
        }

        let state = ChoreState::placeholder((self.clock)());
        self.persist(&state).await?;
        info!(record = %self.record, "Initialized chore record with placeholder");
        Ok(state)
    }

    /// Persist `state`, refreshing `lastUpdated`. Returns what was stored.
    pub async fn write(&self, state: ChoreState) -> Result<ChoreState, StoreError> {
        let _guard = self.lock.lock().await;
        self.stamp_and_persist(state).await
    }

    /// Validate an untrusted payload, then write it. Invalid payloads leave
    /// the record untouched.
    pub async fn write_json(&self, value: &serde_json::Value) -> Result<ChoreState, StoreError> {
        let state = ChoreState::from_wire(value).inspect_err(|e| {
            warn!(record = %self.record, error = %e, "Rejected state payload");
        })?;
        self.write(state).await
    }

    /// Replace the description, keeping `lastSent`.
    pub async fn update_description(&self, description: &str) -> Result<ChoreState, StoreError> {
        let _guard = self.lock.lock().await;
        let mut state = self.current_or_placeholder().await?;
        state.description = description.to_string();
        self.stamp_and_persist(state).await
    }

    /// Record that a reminder went out at `at`.
    pub async fn mark_sent(&self, at: DateTime<Utc>) -> Result<ChoreState, StoreError> {
        let _guard = self.lock.lock().await;
        let mut state = self.current_or_placeholder().await?;
        state.last_sent = Some(at);
        self.stamp_and_persist(state).await
    }

    /// Backup keys for this record, oldest first.
    pub async fn backups(&self) -> Result<Vec<String>, StoreError> {
        self.backend.keys_with_prefix(&self.backup_prefix()).await
    }

    /// Raw contents of one backup.
    pub async fn backup(&self, key: &str) -> Result<Option<ChoreState>, StoreError> {
        if !key.starts_with(&self.backup_prefix()) {
            return Ok(None);
        }
        match self.backend.get(key).await? {
            Some(raw) => Ok(Some(decode(key, &raw)?)),
            None => Ok(None),
        }
    }

    async fn load(&self) -> Result<Option<ChoreState>, StoreError> {
        match self.backend.get(&self.record).await? {
            Some(raw) => Ok(Some(decode(&self.record, &raw)?)),
            None => Ok(None),
        }
    }

    async fn current_or_placeholder(&self) -> Result<ChoreState, StoreError> {
        Ok(self
            .load()
            .await?
            .unwrap_or_else(|| ChoreState::placeholder((self.clock)())))
    }

    /// Caller must hold `self.lock`.
    async fn stamp_and_persist(&self, mut state: ChoreState) -> Result<ChoreState, StoreError> {
        let previous = self.load().await?.map(|s| s.last_updated);
        let now = (self.clock)();
        state.last_updated = match previous {
            Some(prev) if now <= prev => prev + Duration::milliseconds(1),
            _ => now,
        };

        self.persist(&state).await?;

        let backup_key = format!(
            "{}{}",
            self.backup_prefix(),
            state.last_updated.with_timezone(&self.offset).format("%Y-%m-%d")
        );
        let raw = encode(&state)?;
        self.backend.put(&backup_key, &raw).await?;
        debug!(record = %self.record, backup = %backup_key, "Wrote backup");

        if let Some(events) = &self.events {
            events.publish(DomainEvent::StateWritten {
                record: self.record.clone(),
                last_updated: state.last_updated,
                timestamp: Utc::now(),
            });
        }

        Ok(state)
    }

    async fn persist(&self, state: &ChoreState) -> Result<(), StoreError> {
        let raw = encode(state)?;
        self.backend.put(&self.record, &raw).await
    }
}

fn encode(state: &ChoreState) -> Result<String, StoreError> {
    serde_json::to_string(state).map_err(|e| StoreError::Storage(format!("serialize: {e}")))
}

fn decode(key: &str, raw: &str) -> Result<ChoreState, StoreError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| StoreError::Corrupted(format!("{key}: {e}")))?;
    ChoreState::from_wire(&value).map_err(|e| StoreError::Corrupted(format!("{key}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBackend;
    use chrono::TimeZone;
    use std::sync::Mutex as StdMutex;

    fn fixed_clock(at: DateTime<Utc>) -> (Arc<StdMutex<DateTime<Utc>>>, impl Fn() -> DateTime<Utc>) {
        let cell = Arc::new(StdMutex::new(at));
        let reader = cell.clone();
        (cell, move || *reader.lock().unwrap())
    }

    fn store() -> (ChoreStore, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        (ChoreStore::new(backend.clone(), "chore-state"), backend)
    }

    #[tokio::test]
    async fn read_initializes_and_persists_placeholder() {
        let (store, backend) = store();
        assert!(backend.is_empty().await);

        let state = store.read().await.unwrap();
        assert_eq!(state.description, chorebot_core::state::PLACEHOLDER_DESCRIPTION);
        assert!(state.last_sent.is_none());
        assert!(backend.get("chore-state").await.unwrap().is_some());

        let again = store.read().await.unwrap();
        assert_eq!(again, state);
    }

    #[tokio::test]
    async fn repeated_reads_never_touch_timestamps() {
        let (store, _) = store();
        store.update_description("Alice: trash").await.unwrap();
        let first = store.read().await.unwrap();
        for _ in 0..3 {
            let next = store.read().await.unwrap();
            assert_eq!(next.last_updated, first.last_updated);
            assert_eq!(next.last_sent, first.last_sent);
        }
    }

    #[tokio::test]
    async fn write_is_strictly_monotonic_under_frozen_clock() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let (_cell, clock) = fixed_clock(t0);
        let backend = Arc::new(InMemoryBackend::new());
        let store = ChoreStore::new(backend, "chore-state").with_clock(clock);

        let first = store.update_description("one").await.unwrap();
        let second = store.update_description("two").await.unwrap();
        assert_eq!(first.last_updated, t0);
        assert!(second.last_updated > first.last_updated);
        assert_eq!(second.last_updated - first.last_updated, Duration::milliseconds(1));
    }

    #[tokio::test]
    async fn write_ignores_caller_supplied_timestamp() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let (_cell, clock) = fixed_clock(t0);
        let backend = Arc::new(InMemoryBackend::new());
        let store = ChoreStore::new(backend, "chore-state").with_clock(clock);

        let stale = ChoreState {
            description: "x".into(),
            last_updated: Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap(),
            last_sent: None,
        };
        let stored = store.write(stale).await.unwrap();
        assert_eq!(stored.last_updated, t0);
    }

    #[tokio::test]
    async fn write_json_rejects_malformed_without_mutation() {
        let (store, _) = store();
        let before = store.update_description("Alice: trash").await.unwrap();

        let err = store
            .write_json(&serde_json::json!({ "lastUpdated": "2026-01-05T08:00:00Z" }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let after = store.read().await.unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn write_json_accepts_valid_payload() {
        let (store, _) = store();
        let stored = store
            .write_json(&serde_json::json!({
                "description": "Bob: dishes",
                "lastUpdated": "2026-01-05T08:00:00Z",
                "lastSent": "2026-01-05T08:00:00Z"
            }))
            .await
            .unwrap();
        assert_eq!(stored.description, "Bob: dishes");
        assert!(stored.last_sent.is_some());
    }

    #[tokio::test]
    async fn update_description_preserves_last_sent() {
        let (store, _) = store();
        let sent = Utc.with_ymd_and_hms(2026, 1, 5, 13, 0, 0).unwrap();
        store.mark_sent(sent).await.unwrap();

        let state = store.update_description("Carol: laundry").await.unwrap();
        assert_eq!(state.last_sent, Some(sent));
        assert_eq!(state.description, "Carol: laundry");
    }

    #[tokio::test]
    async fn backups_are_keyed_by_local_date() {
        let (cell, clock) = fixed_clock(Utc.with_ymd_and_hms(2026, 1, 6, 3, 0, 0).unwrap());
        let backend = Arc::new(InMemoryBackend::new());
        let store = ChoreStore::new(backend, "chore-state")
            .with_offset(FixedOffset::west_opt(5 * 3600).unwrap())
            .with_clock(clock);

        // 03:00 UTC on Jan 6 is still Jan 5 at UTC-5.
        store.update_description("first").await.unwrap();
        store.update_description("second, same day").await.unwrap();
        *cell.lock().unwrap() = Utc.with_ymd_and_hms(2026, 1, 6, 15, 0, 0).unwrap();
        store.update_description("third").await.unwrap();

        let keys = store.backups().await.unwrap();
        assert_eq!(
            keys,
            vec![
                "chore-state:backup:2026-01-05".to_string(),
                "chore-state:backup:2026-01-06".to_string(),
            ]
        );

        let jan5 = store.backup(&keys[0]).await.unwrap().unwrap();
        assert_eq!(jan5.description, "second, same day");
        assert!(store.backup("unrelated").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupted_record_is_reported() {
        let (store, backend) = store();
        backend.put("chore-state", "not json").await.unwrap();
        let err = store.read().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupted(_)));
    }

    #[tokio::test]
    async fn writes_publish_events() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let backend = Arc::new(InMemoryBackend::new());
        let store = ChoreStore::new(backend, "chore-state").with_events(bus);

        store.update_description("x").await.unwrap();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event.as_ref(), DomainEvent::StateWritten { record, .. } if record == "chore-state"));
    }

    #[tokio::test]
    async fn concurrent_updates_all_land() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(ChoreStore::new(backend, "chore-state"));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.update_description(&format!("update {i}")).await.unwrap()
            }));
        }
        let mut stamps = Vec::new();
        for h in handles {
            stamps.push(h.await.unwrap().last_updated);
        }
        stamps.sort();
        stamps.dedup();
        assert_eq!(stamps.len(), 8);
    }
}
