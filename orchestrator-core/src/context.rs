//! Per-process orchestration context: the shared adapters and config values
//! every per-request task needs, built once at startup and cloned into each
//! task. A concrete, non-generic cousin of a run-scoped runtime builder —
//! this domain has exactly one bus, one store, one MCP subprocess, and one
//! metrics registry per process, so no generic context/state parameters are
//! needed.

use std::sync::Arc;
use std::time::Duration;

use crate::bus::BusAdapter;
use crate::mcp::McpAdapter;
use crate::metrics::Metrics;
use crate::pending_future::PendingFutureRegistry;
use orchestrator_store::KeyedStore;

/// Timeouts and topic names pulled from the environment (§6).
#[derive(Clone, Debug)]
pub struct ContextConfig {
    pub responses_topic: String,
    pub step_timeout: Duration,
    pub ping_interval: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            responses_topic: "responses".to_string(),
            step_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(30),
        }
    }
}

/// Shared dependencies for every per-request orchestrator task (§5).
pub struct Context {
    pub bus: Arc<dyn BusAdapter>,
    pub store: Arc<dyn KeyedStore>,
    pub mcp: Arc<dyn McpAdapter>,
    pub metrics: Arc<Metrics>,
    pub pending: Arc<PendingFutureRegistry>,
    pub config: ContextConfig,
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            store: self.store.clone(),
            mcp: self.mcp.clone(),
            metrics: self.metrics.clone(),
            pending: self.pending.clone(),
            config: self.config.clone(),
        }
    }
}

impl Context {
    pub fn new(bus: Arc<dyn BusAdapter>, store: Arc<dyn KeyedStore>, mcp: Arc<dyn McpAdapter>) -> Self {
        Self {
            bus,
            store,
            mcp,
            metrics: Arc::new(Metrics::new()),
            pending: Arc::new(PendingFutureRegistry::default()),
            config: ContextConfig::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_pending(mut self, pending: Arc<PendingFutureRegistry>) -> Self {
        self.pending = pending;
        self
    }

    pub fn with_config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeBus, FakeMcp};
    use orchestrator_store::InMemoryStore;

    #[test]
    fn new_context_uses_default_config() {
        let ctx = Context::new(Arc::new(FakeBus::new()), Arc::new(InMemoryStore::default()), Arc::new(FakeMcp::default()));
        assert_eq!(ctx.config.responses_topic, "responses");
        assert_eq!(ctx.config.step_timeout, Duration::from_secs(60));
    }

    #[test]
    fn with_config_overrides_defaults_and_clone_shares_adapters() {
        let ctx = Context::new(Arc::new(FakeBus::new()), Arc::new(InMemoryStore::default()), Arc::new(FakeMcp::default()))
            .with_config(ContextConfig {
                responses_topic: "custom-responses".to_string(),
                step_timeout: Duration::from_secs(5),
                ping_interval: Duration::from_secs(10),
            });
        let cloned = ctx.clone();
        assert_eq!(cloned.config.responses_topic, "custom-responses");
        assert!(Arc::ptr_eq(&ctx.metrics, &cloned.metrics));
    }
}
