//! Wire schema shared by the orchestrator and the remote LLM worker pool.
//!
//! Two logical topics carry these records: `jobs` (orchestrator → worker) and
//! `responses` (worker → orchestrator). Both are UTF-8 JSON; see [`LlmJob`] and
//! [`LlmResponse`]. [`tolerant_json`] recovers structured output from models
//! that don't reliably emit clean JSON.

mod decision;
mod job;
pub mod tolerant_json;

pub use decision::Decision;
pub use job::{LlmJob, LlmResponse, Step, TokenUsage, SUMMARY_JOB_PREFIX};
pub use tolerant_json::{parse_tolerant, TolerantJsonError};
