//! Keyed store adapter (§4.2): bounded chat history, session summaries,
//! per-tool argument state, pub/sub status channels, and short-TTL person
//! caches, all keyed by `(user_id, session_id?)`.
//!
//! [`RedisStore`] is the production backend; [`InMemoryStore`] is a test
//! double implementing the same [`KeyedStore`] trait for use without a live
//! Redis instance.

mod keyed_store;
mod keys;
mod memory_store;
mod redis_store;
mod types;

pub use keyed_store::{KeyedStore, PubSubRecord, RecordStream, StoreError, HISTORY_LIMIT, PERSON_CACHE_TTL};
pub use memory_store::InMemoryStore;
pub use redis_store::RedisStore;
pub use types::{HistoryEntry, Role, SessionEntryCount, SessionSummary, ToolState};
