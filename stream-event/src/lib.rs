//! Wire shape and sequencing for the per-request status channel (`chat_status:{request_id}`).
//!
//! [`event::ChannelRecord`] is what the orchestrator publishes and what the SSE
//! adapter and durable log both consume; [`envelope::ChannelSequencer`] assigns
//! each record its position within the channel.

pub mod envelope;
pub mod event;

pub use envelope::ChannelSequencer;
pub use event::ChannelRecord;
