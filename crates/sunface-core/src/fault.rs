//! Non-fatal fault taxonomy and diagnostic counters
//!
//! Nothing the coordinator observes is fatal. Faults are recorded, counted,
//! and broadcast; the face degrades to last-known data or unset
//! placeholders and retries on the next natural event.

use serde::Serialize;

use crate::types::RequestId;

/// A non-fatal condition observed by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    /// Peer connection could not be established or broke
    ConnectionFailure { reason: String },
    /// A response older than already-applied data was dropped
    StaleResponseDiscarded { id: RequestId },
    /// Peer had no data, a request timed out, or the session failed mid-request
    FetchFailure,
    /// The external renderer reported an error
    RenderFailure { message: String },
}

/// Running totals, for diagnostics only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub connection_failures: u64,
    pub stale_responses_discarded: u64,
    pub fetch_failures: u64,
    pub render_failures: u64,
    pub frames_rendered: u64,
}

impl Diagnostics {
    pub fn record(&mut self, fault: &Fault) {
        let counter = match fault {
            Fault::ConnectionFailure { .. } => &mut self.connection_failures,
            Fault::StaleResponseDiscarded { .. } => &mut self.stale_responses_discarded,
            Fault::FetchFailure => &mut self.fetch_failures,
            Fault::RenderFailure { .. } => &mut self.render_failures,
        };
        *counter = counter.saturating_add(1);
    }

    pub fn record_frame(&mut self) {
        self.frames_rendered = self.frames_rendered.saturating_add(1);
    }
}
