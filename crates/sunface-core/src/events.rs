//! Events delivered by a peer transport into the coordinator's queue
//!
//! Every asynchronous completion of the peer link (connection outcome, fetch
//! response, peer-initiated push) arrives as one [`PeerEvent`]. Transports
//! never mutate session or sync state themselves.

use crate::types::{RequestId, WeatherSnapshot};

/// Outcome of a single fetch request
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Peer answered with (possibly partial) weather data
    Snapshot(WeatherSnapshot),
    /// Peer explicitly reported that it has no data
    NoData { message: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Snapshot(_))
    }
}

/// Asynchronous completion from the peer transport
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// Connect attempt `attempt` succeeded
    Connected { attempt: u64 },

    /// Connect attempt failed, or an established link broke
    ConnectionFailed { attempt: u64, reason: String },

    /// Established link went away without an error (peer closed it)
    ConnectionSuspended,

    /// Response to an issued fetch request
    Response { id: RequestId, outcome: FetchOutcome },

    /// Peer-initiated snapshot change
    Push(WeatherSnapshot),
}

impl PeerEvent {
    /// Short label for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            PeerEvent::Connected { .. } => "connected",
            PeerEvent::ConnectionFailed { .. } => "connection_failed",
            PeerEvent::ConnectionSuspended => "connection_suspended",
            PeerEvent::Response { .. } => "response",
            PeerEvent::Push(_) => "push",
        }
    }
}
