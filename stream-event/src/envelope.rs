//! Per-channel monotonic sequencing, so an SSE consumer can detect gaps or
//! out-of-order delivery even though the bus only promises in-order delivery
//! within one `request_id` (§4.1).

use crate::event::ChannelRecord;

/// Assigns increasing `event_id`s to records published on one request's channel.
///
/// One [`ChannelSequencer`] is created per request and lives as long as the
/// orchestrator task that owns the request (§3 RequestChannel).
pub struct ChannelSequencer {
    request_id: String,
    next_event_id: u64,
}

impl ChannelSequencer {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            next_event_id: 1,
        }
    }

    /// Stamps `record` with this channel's next `event_id`, overwriting
    /// whatever the caller set (callers build records via [`ChannelRecord`]
    /// constructors without worrying about sequencing).
    pub fn stamp(&mut self, mut record: ChannelRecord) -> ChannelRecord {
        record.request_id = self.request_id.clone();
        record.event_id = self.next_event_id;
        self.next_event_id += 1;
        record
    }
}
