//! Pending-future registry (§4.6): the correlation layer between outbound
//! bus jobs and inbound responses. A single guarded map keyed by `request_id`;
//! waiters are one-shot channels, matching the dispatcher pattern the LLM
//! manager uses for per-call tool waiters.

use dashmap::DashMap;
use orchestrator_protocol::LlmResponse;
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Error)]
pub enum PendingFutureError {
    #[error("a pending future is already registered for request {0}")]
    AlreadyRegistered(String),
    #[error("waiter for request {0} was dropped before resolving")]
    WaiterDropped(String),
}

/// A handle returned by [`PendingFutureRegistry::register`]; await it to
/// receive the correlated response.
pub struct Waiter {
    request_id: String,
    rx: oneshot::Receiver<LlmResponse>,
}

impl Waiter {
    pub async fn wait(self) -> Result<LlmResponse, PendingFutureError> {
        self.rx
            .await
            .map_err(|_| PendingFutureError::WaiterDropped(self.request_id))
    }
}

/// Guarded map from `request_id` to a single-shot waiter (§4.6, §5 "the
/// pending-future registry is the only mutable shared map").
#[derive(Default)]
pub struct PendingFutureRegistry {
    waiters: DashMap<String, oneshot::Sender<LlmResponse>>,
}

impl PendingFutureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for `request_id`. Fails if one is already
    /// outstanding for the same id (§3 PendingFuture invariant).
    pub fn register(&self, request_id: impl Into<String>) -> Result<Waiter, PendingFutureError> {
        let request_id = request_id.into();
        if self.waiters.contains_key(&request_id) {
            return Err(PendingFutureError::AlreadyRegistered(request_id));
        }
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(request_id.clone(), tx);
        Ok(Waiter { request_id, rx })
    }

    /// Wakes the waiter for `response.request_id` and removes the entry. A
    /// second resolve for the same id (or one with no registered waiter) is
    /// silently dropped (§4.6).
    pub fn resolve(&self, response: LlmResponse) {
        if let Some((_, tx)) = self.waiters.remove(&response.request_id) {
            let _ = tx.send(response);
        }
    }

    pub fn is_registered(&self, request_id: &str) -> bool {
        self.waiters.contains_key(request_id)
    }

    /// Cancels every outstanding waiter by dropping its sender, so
    /// `Waiter::wait` resolves to `WaiterDropped` (§5 shutdown cancellation).
    pub fn cancel_all(&self) {
        self.waiters.clear();
    }

    /// Drops the single registration for `request_id` (e.g. after a per-step
    /// timeout), freeing the id to be registered again by the next step. A
    /// response that arrives afterward finds no entry and is silently
    /// dropped by [`Self::resolve`], same as any other unknown id.
    pub fn cancel(&self, request_id: &str) {
        self.waiters.remove(request_id);
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_protocol::Step;

    fn response_for(request_id: &str) -> LlmResponse {
        LlmResponse {
            request_id: request_id.to_string(),
            step: Some(Step::Summarize),
            final_answer: Some("hi".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn double_register_fails() {
        let registry = PendingFutureRegistry::new();
        registry.register("req-1").unwrap();
        assert!(matches!(
            registry.register("req-1"),
            Err(PendingFutureError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn resolve_wakes_the_waiter() {
        let registry = PendingFutureRegistry::new();
        let waiter = registry.register("req-1").unwrap();
        registry.resolve(response_for("req-1"));
        let response = waiter.wait().await.unwrap();
        assert_eq!(response.request_id, "req-1");
    }

    #[test]
    fn resolve_with_no_waiter_is_a_silent_no_op() {
        let registry = PendingFutureRegistry::new();
        registry.resolve(response_for("req-unknown"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn second_resolve_for_same_id_is_dropped() {
        let registry = PendingFutureRegistry::new();
        let waiter = registry.register("req-1").unwrap();
        registry.resolve(response_for("req-1"));
        registry.resolve(response_for("req-1"));
        let response = waiter.wait().await.unwrap();
        assert_eq!(response.request_id, "req-1");
    }

    #[test]
    fn cancel_frees_the_id_for_reregistration() {
        let registry = PendingFutureRegistry::new();
        let _waiter = registry.register("req-1").unwrap();
        registry.cancel("req-1");
        assert!(registry.register("req-1").is_ok());
    }

    #[tokio::test]
    async fn cancel_all_drops_outstanding_waiters() {
        let registry = PendingFutureRegistry::new();
        let waiter = registry.register("req-1").unwrap();
        registry.cancel_all();
        assert!(matches!(waiter.wait().await, Err(PendingFutureError::WaiterDropped(_))));
    }
}
