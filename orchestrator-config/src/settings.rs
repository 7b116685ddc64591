//! Typed settings resolved from the process environment (§6 "Environment"),
//! after [`crate::load_and_apply`] has folded `.env` and XDG config into it.

use std::time::Duration;

use clap::Parser;

fn parse_seconds(raw: &str) -> Result<Duration, std::num::ParseIntError> {
    raw.parse::<u64>().map(Duration::from_secs)
}

/// Addresses and timeouts the orchestrator needs at startup (§6): bus address,
/// keyed-store address, MCP subprocess command, poll interval, per-step
/// timeout, and the response topic name.
#[derive(Parser, Clone, Debug)]
#[command(name = "orchestrator")]
pub struct OrchestratorConfig {
    /// Redis connection URL backing both the bus and the keyed store.
    #[arg(long, env = "ORCHESTRATOR_BUS_URL")]
    pub bus_url: String,

    /// Redis connection URL for the keyed store, when it differs from `bus_url`.
    #[arg(long, env = "ORCHESTRATOR_STORE_URL")]
    pub store_url: Option<String>,

    /// Name of the Redis stream the bus publishes jobs onto.
    #[arg(long, env = "ORCHESTRATOR_JOBS_STREAM", default_value = "jobs")]
    pub jobs_stream: String,

    /// Name of the topic the worker pool echoes responses onto (§4.1, §6).
    #[arg(long, env = "ORCHESTRATOR_RESPONSES_TOPIC", default_value = "responses")]
    pub responses_topic: String,

    /// Executable launched as the MCP subprocess worker (§4.3).
    #[arg(long, env = "ORCHESTRATOR_MCP_COMMAND")]
    pub mcp_command: String,

    /// Arguments passed to the MCP subprocess, space-separated.
    #[arg(long, env = "ORCHESTRATOR_MCP_ARGS", value_delimiter = ' ', default_value = "")]
    pub mcp_args: Vec<String>,

    /// Ping heartbeat interval in seconds (§4.6, §6: default 30s).
    #[arg(long, env = "ORCHESTRATOR_PING_INTERVAL_SECS", value_parser = parse_seconds, default_value = "30")]
    pub ping_interval: Duration,

    /// Per-step LLM response timeout in seconds (§4.5, §6: default 60s).
    #[arg(long, env = "ORCHESTRATOR_STEP_TIMEOUT_SECS", value_parser = parse_seconds, default_value = "60")]
    pub step_timeout: Duration,

    /// Address the thin HTTP/SSE adapter binds to.
    #[arg(long, env = "ORCHESTRATOR_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    pub http_addr: String,
}

impl OrchestratorConfig {
    /// The keyed store's connection URL, falling back to `bus_url` when no
    /// separate store address is configured (they're often the same Redis).
    pub fn store_url(&self) -> &str {
        self.store_url.as_deref().unwrap_or(&self.bus_url)
    }
}
