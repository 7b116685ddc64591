//! Per-request orchestration: the pending-future registry, the bus and MCP
//! adapters, the tool-argument engine, the prompt assembler, and the
//! four-step state machine that ties them together (§4-§6).

mod bus;
mod context;
mod fallback;
mod mcp;
mod metrics;
mod pending_future;
mod persona;
mod prompt;
mod request;
mod state_machine;
mod tool_args;

#[cfg(test)]
mod test_support;

pub use bus::{BusAdapter, BusError, RedisBus};
pub use context::{Context, ContextConfig};
pub use fallback::{pick_fallback, FALLBACK_MESSAGES};
pub use mcp::{clean_schema, normalize_tool_output, McpAdapter, McpError, RmcpAdapter, ToolCallOutcome, ToolDescriptor};
pub use metrics::{LlmMetrics, Metrics, MetricsSnapshot, RequestMetrics};
pub use pending_future::{PendingFutureError, PendingFutureRegistry, Waiter};
pub use persona::{Academics, Family, Identity, Lifestyle, PersonaConfig, Professional, StrengthsAndWeaknesses};
pub use prompt::{
    decision_prompt, format_history, summarize_prompt, tool_args_prompt, tool_selection_prompt, ConnectedProfile,
    SummaryPromptInputs,
};
pub use request::{Request, SessionModality};
pub use state_machine::{run_ping_loop, run_request, run_response_loop, RequestOutcome};
pub use tool_args::{prune_by_schema, ToolArgsEngine, ToolArgsError};
