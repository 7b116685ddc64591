//! In-process test doubles for the bus and MCP adapters, used by this
//! crate's own unit tests so the state machine can be exercised without a
//! live Redis instance or MCP subprocess.

use async_trait::async_trait;
use orchestrator_protocol::{LlmJob, LlmResponse};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::bus::{BusAdapter, BusError};
use crate::mcp::{McpAdapter, McpError, ToolCallOutcome, ToolDescriptor};

/// Records every published job and lets the test push back a canned response
/// per `request_id` by calling [`FakeBus::deliver`].
pub struct FakeBus {
    pub published: Mutex<Vec<LlmJob>>,
    sender: mpsc::Sender<LlmResponse>,
    receiver: Mutex<Option<mpsc::Receiver<LlmResponse>>>,
}

impl FakeBus {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(64);
        Self {
            published: Mutex::new(Vec::new()),
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Pushes a response as though the worker pool had answered.
    pub async fn deliver(&self, response: LlmResponse) {
        let _ = self.sender.send(response).await;
    }
}

impl Default for FakeBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusAdapter for FakeBus {
    async fn publish_job(&self, job: &LlmJob) -> Result<(), BusError> {
        self.published.lock().unwrap().push(job.clone());
        Ok(())
    }

    async fn subscribe_responses(&self, _topic: &str, handler: mpsc::Sender<LlmResponse>) -> Result<(), BusError> {
        let mut receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .expect("subscribe_responses called twice on FakeBus");
        while let Some(response) = receiver.recv().await {
            if handler.send(response).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// A scripted MCP adapter: per-tool canned outcomes, consumed in call order.
#[derive(Default)]
pub struct FakeMcp {
    outcomes: Mutex<HashMap<String, Vec<ToolCallOutcome>>>,
    pub calls: Mutex<Vec<(String, serde_json::Value)>>,
    catalog: Mutex<Vec<ToolDescriptor>>,
}

impl FakeMcp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, tool: impl Into<String>, outcome: ToolCallOutcome) {
        self.outcomes.lock().unwrap().entry(tool.into()).or_default().push(outcome);
    }

    pub fn set_catalog(&self, catalog: Vec<ToolDescriptor>) {
        *self.catalog.lock().unwrap() = catalog;
    }
}

#[async_trait]
impl McpAdapter for FakeMcp {
    async fn catalog(&self) -> Vec<ToolDescriptor> {
        self.catalog.lock().unwrap().clone()
    }

    async fn call_tool(&self, name: &str, args: serde_json::Value) -> Result<ToolCallOutcome, McpError> {
        self.calls.lock().unwrap().push((name.to_string(), args));
        let mut outcomes = self.outcomes.lock().unwrap();
        let queue = outcomes.entry(name.to_string()).or_default();
        if queue.is_empty() {
            return Ok(ToolCallOutcome::success(serde_json::json!({ "docs": [] })));
        }
        Ok(queue.remove(0))
    }
}
