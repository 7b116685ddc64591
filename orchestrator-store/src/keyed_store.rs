//! The keyed store adapter trait (§4.2) and its error type.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio_stream::Stream;
use std::pin::Pin;

use crate::types::{HistoryEntry, SessionEntryCount, SessionSummary, ToolState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage: {0}")]
    Backend(String),
    #[error("json: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Maximum number of entries `appendHistory` retains per key (§4.2).
pub const HISTORY_LIMIT: usize = 5;

/// A record published on a pub/sub channel; opaque to the store itself.
pub type PubSubRecord = Value;

pub type RecordStream = Pin<Box<dyn Stream<Item = PubSubRecord> + Send>>;

/// Bounded chat history, session summaries, tool-argument state, pub/sub
/// channels, and short-TTL profile caches, all keyed by `(user_id, session_id?)`
/// (§4.2). Implementations must make history append+trim effectively atomic.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    async fn append_history(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        entry: HistoryEntry,
    ) -> Result<(), StoreError>;

    /// At most [`HISTORY_LIMIT`] entries, oldest first.
    async fn read_history(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Vec<HistoryEntry>, StoreError>;

    async fn delete_history(&self, user_id: &str, session_id: Option<&str>) -> Result<(), StoreError>;

    async fn delete_all_history(&self, user_id: &str) -> Result<(), StoreError>;

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionEntryCount>, StoreError>;

    async fn read_summary(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Option<SessionSummary>, StoreError>;

    async fn write_summary(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        summary: SessionSummary,
    ) -> Result<(), StoreError>;

    async fn delete_summary(&self, user_id: &str, session_id: Option<&str>) -> Result<(), StoreError>;

    async fn list_summaries(&self, user_id: &str) -> Result<Vec<(Option<String>, SessionSummary)>, StoreError>;

    async fn read_tool_state(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Option<ToolState>, StoreError>;

    async fn write_tool_state(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        state: ToolState,
    ) -> Result<(), StoreError>;

    async fn delete_tool_state(&self, user_id: &str, session_id: Option<&str>) -> Result<(), StoreError>;

    async fn list_tool_states(&self, user_id: &str) -> Result<Vec<(Option<String>, ToolState)>, StoreError>;

    async fn publish(&self, channel: &str, record: PubSubRecord) -> Result<(), StoreError>;

    /// A lazy sequence of records on `channel`, terminating only when the
    /// consumer drops it or the underlying connection is cancelled (§4.2).
    async fn subscribe(&self, channel: &str) -> Result<RecordStream, StoreError>;

    async fn cache_person(
        &self,
        user_id: &str,
        person_id: &str,
        profile: Value,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn read_person(&self, user_id: &str, person_id: &str) -> Result<Option<Value>, StoreError>;
}

/// TTL for `cachePerson`/`readPerson` when callers don't need a different one (§4.2: 24h).
pub const PERSON_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
