//! Bus adapter (§4.1): two named topics, `jobs` and `responses`, carrying
//! JSON-encoded [`LlmJob`]/[`LlmResponse`] records.
//!
//! The production backend uses Redis Streams (`XADD`/`XREAD`), the same
//! connection-manager-backed client the keyed store adapter uses, so a
//! publish failure and a consume failure fail independently without one
//! blocking the other's retry. Ordering is per-stream, matching §4.1's
//! guarantee ("within a single `request_id` on the response topic, delivery
//! is in arrival order; no cross-id ordering is guaranteed" — a single
//! stream already serializes every record that lands on it).

use async_trait::async_trait;
use orchestrator_protocol::{LlmJob, LlmResponse};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus: {0}")]
    Backend(String),
    #[error("json: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<redis::RedisError> for BusError {
    fn from(err: redis::RedisError) -> Self {
        BusError::Backend(err.to_string())
    }
}

/// Publishes jobs and consumes responses over the two bus topics (§4.1).
#[async_trait]
pub trait BusAdapter: Send + Sync {
    async fn publish_job(&self, job: &LlmJob) -> Result<(), BusError>;

    /// Invokes `handler` once per inbound response, in arrival order, until
    /// cancelled. A consume failure reconnects with backoff rather than
    /// returning (§4.1).
    async fn subscribe_responses(
        &self,
        topic: &str,
        handler: mpsc::Sender<LlmResponse>,
    ) -> Result<(), BusError>;
}

const RECONNECT_BACKOFF: Duration = Duration::from_millis(500);

/// Redis Streams-backed [`BusAdapter`]. `XADD` per publish, `XREAD BLOCK`
/// loop per subscription, reconnecting with a fixed backoff on read failure.
pub struct RedisBus {
    client: redis::Client,
    conn: ConnectionManager,
    jobs_stream: String,
}

impl RedisBus {
    pub async fn connect(url: &str, jobs_stream: impl Into<String>) -> Result<Self, BusError> {
        let client = redis::Client::open(url).map_err(|e| BusError::Backend(e.to_string()))?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            client,
            conn,
            jobs_stream: jobs_stream.into(),
        })
    }
}

#[async_trait]
impl BusAdapter for RedisBus {
    async fn publish_job(&self, job: &LlmJob) -> Result<(), BusError> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();
        let _: String = conn.xadd(&self.jobs_stream, "*", &[("payload", payload.as_str())]).await?;
        Ok(())
    }

    async fn subscribe_responses(
        &self,
        topic: &str,
        handler: mpsc::Sender<LlmResponse>,
    ) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let mut last_id = "$".to_string();
        loop {
            let opts = redis::streams::StreamReadOptions::default().block(5_000).count(100);
            let read: Result<redis::streams::StreamReadReply, redis::RedisError> =
                conn.xread_options(&[topic], &[&last_id], &opts).await;
            let reply = match read {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::warn!(error = %err, "bus read failed, reconnecting");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                    match self.client.get_connection_manager().await {
                        Ok(fresh) => conn = fresh,
                        Err(err) => tracing::warn!(error = %err, "bus reconnect failed"),
                    }
                    continue;
                }
            };
            for key in reply.keys {
                for entry in key.ids {
                    last_id = entry.id.clone();
                    let Some(payload) = entry
                        .map
                        .get("payload")
                        .and_then(|v| redis::from_redis_value::<String>(v).ok())
                    else {
                        continue;
                    };
                    match serde_json::from_str::<LlmResponse>(&payload) {
                        Ok(response) => {
                            if handler.send(response).await.is_err() {
                                return Ok(());
                            }
                        }
                        Err(err) => tracing::warn!(error = %err, "dropping malformed response record"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_protocol::Step;

    #[tokio::test]
    async fn publish_job_serializes_without_error() {
        let job = LlmJob::new("req-1", Step::CheckToolRequired, "responses");
        let encoded = serde_json::to_string(&job).unwrap();
        let decoded: LlmJob = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.request_id, "req-1");
    }
}
