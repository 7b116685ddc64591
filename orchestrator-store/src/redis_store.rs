//! Redis-backed [`KeyedStore`] (§4.2).
//!
//! History is a Redis list: `appendHistory` is `LPUSH` + `LTRIM` wrapped in a
//! pipeline so the two are sent as one round trip (§4.2's atomicity invariant
//! doesn't require a full MULTI/EXEC here — nothing else writes this key
//! between the two commands). `readHistory` reverses the list back to
//! oldest-first on the way out, since `LPUSH` puts the newest entry at index 0.
//! Summaries and tool state are JSON scalars under `GET`/`SET`. `listSessions`,
//! `listSummaries`, and `listToolStates` scan for the user's key prefix with
//! `SCAN` rather than `KEYS`, so they don't block the server on a large keyspace.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::Stream;

use crate::keyed_store::{KeyedStore, PubSubRecord, RecordStream, StoreError, HISTORY_LIMIT};
use crate::keys;
use crate::types::{HistoryEntry, SessionEntryCount, SessionSummary, ToolState};

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError::Backend(e.to_string()))?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { client, conn })
    }

    async fn scan_scoped(&self, prefix: &str, user_id: &str) -> Result<Vec<String>, StoreError> {
        let pattern = keys::scoped_scan_pattern(prefix, user_id);
        let mut conn = self.conn.clone();
        let mut iter: redis::AsyncIter<String> = conn.scan_match(&pattern).await?;
        let mut found = Vec::new();
        while let Some(key) = iter.next_item().await {
            found.push(key);
        }
        Ok(found)
    }
}

fn history_key_value(entry: &HistoryEntry) -> Result<String, StoreError> {
    Ok(serde_json::to_string(entry)?)
}

#[async_trait]
impl KeyedStore for RedisStore {
    async fn append_history(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        entry: HistoryEntry,
    ) -> Result<(), StoreError> {
        let key = keys::chat_history(user_id, session_id);
        let value = history_key_value(&entry)?;
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .lpush(&key, value)
            .ltrim(&key, 0, HISTORY_LIMIT as isize - 1)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn read_history(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let key = keys::chat_history(user_id, session_id);
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(&key, 0, HISTORY_LIMIT as isize - 1).await?;
        let mut entries = raw
            .into_iter()
            .map(|s| serde_json::from_str::<HistoryEntry>(&s).map_err(StoreError::from))
            .collect::<Result<Vec<_>, _>>()?;
        entries.reverse();
        Ok(entries)
    }

    async fn delete_history(&self, user_id: &str, session_id: Option<&str>) -> Result<(), StoreError> {
        let key = keys::chat_history(user_id, session_id);
        let mut conn = self.conn.clone();
        let _: () = conn.del(&key).await?;
        Ok(())
    }

    async fn delete_all_history(&self, user_id: &str) -> Result<(), StoreError> {
        let keys = self.scan_scoped("chat_history", user_id).await?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys).await?;
        Ok(())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionEntryCount>, StoreError> {
        let keys = self.scan_scoped("chat_history", user_id).await?;
        let mut conn = self.conn.clone();
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let entry_count: usize = conn.llen(&key).await?;
            let session_id = keys::session_id_from_key("chat_history", user_id, &key);
            out.push(SessionEntryCount { session_id, entry_count });
        }
        Ok(out)
    }

    async fn read_summary(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Option<SessionSummary>, StoreError> {
        let key = keys::session_summary(user_id, session_id);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await?;
        raw.map(|s| Ok(SessionSummary(serde_json::from_str::<Value>(&s)?)))
            .transpose()
    }

    async fn write_summary(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        summary: SessionSummary,
    ) -> Result<(), StoreError> {
        let key = keys::session_summary(user_id, session_id);
        let value = serde_json::to_string(&summary.0)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(&key, value).await?;
        Ok(())
    }

    async fn delete_summary(&self, user_id: &str, session_id: Option<&str>) -> Result<(), StoreError> {
        let key = keys::session_summary(user_id, session_id);
        let mut conn = self.conn.clone();
        let _: () = conn.del(&key).await?;
        Ok(())
    }

    async fn list_summaries(&self, user_id: &str) -> Result<Vec<(Option<String>, SessionSummary)>, StoreError> {
        let keys = self.scan_scoped("session_summary", user_id).await?;
        let mut conn = self.conn.clone();
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = conn.get(&key).await?;
            if let Some(raw) = raw {
                let session_id = keys::session_id_from_key("session_summary", user_id, &key);
                out.push((session_id, SessionSummary(serde_json::from_str(&raw)?)));
            }
        }
        Ok(out)
    }

    async fn read_tool_state(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Option<ToolState>, StoreError> {
        let key = keys::tool_state(user_id, session_id);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await?;
        raw.map(|s| Ok(ToolState(serde_json::from_str::<Value>(&s)?))).transpose()
    }

    async fn write_tool_state(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        state: ToolState,
    ) -> Result<(), StoreError> {
        let key = keys::tool_state(user_id, session_id);
        let value = serde_json::to_string(&state.0)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(&key, value).await?;
        Ok(())
    }

    async fn delete_tool_state(&self, user_id: &str, session_id: Option<&str>) -> Result<(), StoreError> {
        let key = keys::tool_state(user_id, session_id);
        let mut conn = self.conn.clone();
        let _: () = conn.del(&key).await?;
        Ok(())
    }

    async fn list_tool_states(&self, user_id: &str) -> Result<Vec<(Option<String>, ToolState)>, StoreError> {
        let keys = self.scan_scoped("tool_state", user_id).await?;
        let mut conn = self.conn.clone();
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = conn.get(&key).await?;
            if let Some(raw) = raw {
                let session_id = keys::session_id_from_key("tool_state", user_id, &key);
                out.push((session_id, ToolState(serde_json::from_str(&raw)?)));
            }
        }
        Ok(out)
    }

    async fn publish(&self, channel: &str, record: PubSubRecord) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&record)?;
        let mut conn = self.conn.clone();
        let _: () = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<RecordStream, StoreError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str::<Value>(&payload).ok()
        });
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
        let value = serde_json::to_string(&profile)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(&key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn read_person(&self, user_id: &str, person_id: &str) -> Result<Option<Value>, StoreError> {
        let key = keys::person_profile(user_id, person_id);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await?;
        raw.map(|s| serde_json::from_str(&s).map_err(StoreError::from)).transpose()
    }
}
