//! In-memory [`KeyedStore`] test double, used by orchestrator-core's unit
//! tests and this crate's own integration tests so they don't need a live
//! Redis instance to exercise the contract in [`KeyedStore`] (§4.2).

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::keyed_store::{KeyedStore, PubSubRecord, RecordStream, StoreError, HISTORY_LIMIT};
use crate::keys;
use crate::types::{HistoryEntry, SessionEntryCount, SessionSummary, ToolState};

struct Cached {
    value: Value,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    history: HashMap<String, Vec<HistoryEntry>>,
    summaries: HashMap<String, Value>,
    tool_states: HashMap<String, Value>,
    person_cache: HashMap<String, Cached>,
    channels: HashMap<String, broadcast::Sender<PubSubRecord>>,
}

pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl KeyedStore for InMemoryStore {
    async fn append_history(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        entry: HistoryEntry,
    ) -> Result<(), StoreError> {
        let key = keys::chat_history(user_id, session_id);
        let mut inner = self.lock();
        let entries = inner.history.entry(key).or_default();
        entries.push(entry);
        if entries.len() > HISTORY_LIMIT {
            let drop_count = entries.len() - HISTORY_LIMIT;
            entries.drain(0..drop_count);
        }
        Ok(())
    }

    async fn read_history(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let key = keys::chat_history(user_id, session_id);
        Ok(self.lock().history.get(&key).cloned().unwrap_or_default())
    }

    async fn delete_history(&self, user_id: &str, session_id: Option<&str>) -> Result<(), StoreError> {
        let key = keys::chat_history(user_id, session_id);
        self.lock().history.remove(&key);
        Ok(())
    }

    async fn delete_all_history(&self, user_id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let prefix = format!("chat_history:{user_id}");
        inner.history.retain(|k, _| !(k == &prefix || k.starts_with(&format!("{prefix}:"))));
        Ok(())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionEntryCount>, StoreError> {
        let inner = self.lock();
        let prefix = format!("chat_history:{user_id}");
        Ok(inner
            .history
            .iter()
            .filter(|(k, _)| **k == prefix || k.starts_with(&format!("{prefix}:")))
            .map(|(k, v)| SessionEntryCount {
                session_id: keys::session_id_from_key("chat_history", user_id, k),
                entry_count: v.len(),
            })
            .collect())
    }

    async fn read_summary(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Option<SessionSummary>, StoreError> {
        let key = keys::session_summary(user_id, session_id);
        Ok(self.lock().summaries.get(&key).cloned().map(SessionSummary))
    }

    async fn write_summary(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        summary: SessionSummary,
    ) -> Result<(), StoreError> {
        let key = keys::session_summary(user_id, session_id);
        self.lock().summaries.insert(key, summary.0);
        Ok(())
    }

    async fn delete_summary(&self, user_id: &str, session_id: Option<&str>) -> Result<(), StoreError> {
        let key = keys::session_summary(user_id, session_id);
        self.lock().summaries.remove(&key);
        Ok(())
    }

    async fn list_summaries(&self, user_id: &str) -> Result<Vec<(Option<String>, SessionSummary)>, StoreError> {
        let inner = self.lock();
        let prefix = format!("session_summary:{user_id}");
        Ok(inner
            .summaries
            .iter()
            .filter(|(k, _)| **k == prefix || k.starts_with(&format!("{prefix}:")))
            .map(|(k, v)| {
                (
                    keys::session_id_from_key("session_summary", user_id, k),
                    SessionSummary(v.clone()),
                )
            })
            .collect())
    }

    async fn read_tool_state(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Option<ToolState>, StoreError> {
        let key = keys::tool_state(user_id, session_id);
        Ok(self.lock().tool_states.get(&key).cloned().map(ToolState))
    }

    async fn write_tool_state(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        state: ToolState,
    ) -> Result<(), StoreError> {
        let key = keys::tool_state(user_id, session_id);
        self.lock().tool_states.insert(key, state.0);
        Ok(())
    }

    async fn delete_tool_state(&self, user_id: &str, session_id: Option<&str>) -> Result<(), StoreError> {
        let key = keys::tool_state(user_id, session_id);
        self.lock().tool_states.remove(&key);
        Ok(())
    }

    async fn list_tool_states(&self, user_id: &str) -> Result<Vec<(Option<String>, ToolState)>, StoreError> {
        let inner = self.lock();
        let prefix = format!("tool_state:{user_id}");
        Ok(inner
            .tool_states
            .iter()
            .filter(|(k, _)| **k == prefix || k.starts_with(&format!("{prefix}:")))
            .map(|(k, v)| (keys::session_id_from_key("tool_state", user_id, k), ToolState(v.clone())))
            .collect())
    }

    async fn publish(&self, channel: &str, record: PubSubRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let sender = inner
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(256).0);
        // No subscribers yet is not an error: the channel is lazily created by subscribe().
        let _ = sender.send(record);
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<RecordStream, StoreError> {
        let mut inner = self.lock();
        let sender = inner
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(256).0)
            .clone();
        let stream = BroadcastStream::new(sender.subscribe()).filter_map(|item| item.ok());
        Ok(Box::pin(stream) as Pin<Box<dyn Stream<Item = PubSubRecord> + Send>>)
    }

    async fn cache_person(
        &self,
        user_id: &str,
        person_id: &str,
        profile: Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let key = keys::person_profile(user_id, person_id);
        self.lock().person_cache.insert(
            key,
            Cached {
                value: profile,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn read_person(&self, user_id: &str, person_id: &str) -> Result<Option<Value>, StoreError> {
        let key = keys::person_profile(user_id, person_id);
        let mut inner = self.lock();
        match inner.person_cache.get(&key) {
            Some(cached) if cached.expires_at > Instant::now() => Ok(Some(cached.value.clone())),
            Some(_) => {
                inner.person_cache.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
