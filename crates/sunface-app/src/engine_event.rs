//! Domain events emitted by the Engine for external consumers
//!
//! Events are broadcast after each message processing cycle via
//! `Engine::subscribe()`. The headless runner turns them into NDJSON.

use sunface_core::{Fault, RenderFrame, SessionState, WeatherSnapshot};

/// Domain events emitted by the Engine for external consumers.
///
/// Subscribers see events in the order the coordinator produced them. A
/// slow subscriber may lag and lose the oldest events.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The renderer accepted a frame
    FrameRendered(RenderFrame),

    /// The peer session moved to another state
    SessionStateChanged {
        old: SessionState,
        new: SessionState,
    },

    /// The accepted weather snapshot changed
    SnapshotUpdated(WeatherSnapshot),

    /// A non-fatal fault was observed
    Fault(Fault),

    /// Engine is shutting down
    Shutdown,
}

impl EngineEvent {
    /// Returns a short string label for this event type (for logging/debugging).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::FrameRendered(_) => "frame_rendered",
            Self::SessionStateChanged { .. } => "session_state_changed",
            Self::SnapshotUpdated(_) => "snapshot_updated",
            Self::Fault(_) => "fault",
            Self::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_event_type_labels() {
        assert_eq!(EngineEvent::Shutdown.event_type(), "shutdown");
        assert_eq!(
            EngineEvent::Fault(Fault::FetchFailure).event_type(),
            "fault"
        );
        assert_eq!(
            EngineEvent::SessionStateChanged {
                old: SessionState::Connecting,
                new: SessionState::Connected,
            }
            .event_type(),
            "session_state_changed"
        );
        assert_eq!(
            EngineEvent::SnapshotUpdated(WeatherSnapshot::default()).event_type(),
            "snapshot_updated"
        );
    }
}
