//! Test utilities for link types
//!
//! Provides a transport that records calls instead of touching a peer, and
//! helpers for building peer events.

use std::sync::{Arc, Mutex};

use sunface_core::{FetchOutcome, PeerEvent, RequestId, WeatherSnapshot};

use crate::transport::PeerTransport;

/// One call made on a [`RecordingTransport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCall {
    Connect(u64),
    Request(RequestId),
    Disconnect,
}

/// Transport that only records what it was asked to do.
///
/// Clones share the same log, so a test can keep one handle while the
/// engine owns the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    calls: Arc<Mutex<Vec<TransportCall>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all calls so far
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Ids of all requests sent so far, in order
    pub fn requests(&self) -> Vec<RequestId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Request(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Attempt number of the latest connect call
    pub fn last_attempt(&self) -> Option<u64> {
        self.calls().into_iter().rev().find_map(|call| match call {
            TransportCall::Connect(attempt) => Some(attempt),
            _ => None,
        })
    }

    fn record(&self, call: TransportCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl PeerTransport for RecordingTransport {
    fn connect(&mut self, attempt: u64) {
        self.record(TransportCall::Connect(attempt));
    }

    fn send_request(&mut self, id: RequestId) {
        self.record(TransportCall::Request(id));
    }

    fn disconnect(&mut self) {
        self.record(TransportCall::Disconnect);
    }
}

/// Successful response carrying both temperatures
pub fn temperature_response(id: RequestId, high: f64, low: f64) -> PeerEvent {
    PeerEvent::Response {
        id,
        outcome: FetchOutcome::Snapshot(WeatherSnapshot::temperatures(high, low)),
    }
}

/// Failed response
pub fn no_data_response(id: RequestId) -> PeerEvent {
    PeerEvent::Response {
        id,
        outcome: FetchOutcome::NoData {
            message: "no data".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_transport_shares_log_between_clones() {
        let probe = RecordingTransport::new();
        let mut owned = probe.clone();

        owned.connect(1);
        owned.send_request(1);
        owned.send_request(2);
        owned.disconnect();

        assert_eq!(
            probe.calls(),
            vec![
                TransportCall::Connect(1),
                TransportCall::Request(1),
                TransportCall::Request(2),
                TransportCall::Disconnect,
            ]
        );
        assert_eq!(probe.requests(), vec![1, 2]);
        assert_eq!(probe.last_attempt(), Some(1));
    }

    #[test]
    fn test_response_helpers() {
        assert!(matches!(
            temperature_response(3, 20.0, 10.0),
            PeerEvent::Response {
                id: 3,
                outcome: FetchOutcome::Snapshot(_)
            }
        ));
        assert!(matches!(
            no_data_response(4),
            PeerEvent::Response {
                id: 4,
                outcome: FetchOutcome::NoData { .. }
            }
        ));
    }
}
