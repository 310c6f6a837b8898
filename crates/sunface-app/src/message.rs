//! Message types for the coordinator (TEA pattern)

use chrono::FixedOffset;
use sunface_core::{PeerEvent, RenderFrame};

/// Lifecycle notification pushed by the host environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// The face became visible or hidden
    VisibilityChanged(bool),
    /// The display entered or left ambient low-power mode
    AmbientModeChanged(bool),
    /// The local timezone changed
    TimezoneChanged(FixedOffset),
}

/// Steps of bringing the face back on screen, run strictly in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeStep {
    /// Ask the session to (re)connect
    Reconnect,
    /// Ask for fresh weather data
    Resync,
    /// Restart the render clock and timezone subscription
    ResumeClock,
}

/// All possible messages processed by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Signal from the host environment
    Host(HostSignal),

    /// Completion delivered by the peer transport
    Peer(PeerEvent),

    /// The engine's earliest deadline was reached (clock tick, request
    /// expiry or reconnect backoff)
    Tick,

    /// Housekeeping after a tick: expire requests, retry the session,
    /// refresh stale data
    Maintain,

    /// One step of the wake sequence
    Wake(WakeStep),

    /// Request a snapshot now (dropped silently if the session is not usable)
    Resync,

    /// Render the current state outside the tick schedule
    Redraw,

    // ─────────────────────────────────────────────────────────
    // Render feedback
    // ─────────────────────────────────────────────────────────
    /// The renderer accepted a frame
    FrameRendered(RenderFrame),

    /// The renderer rejected a frame
    RenderFailed { message: String },

    /// Stop everything and leave the engine loop
    Quit,
}

impl From<HostSignal> for Message {
    fn from(signal: HostSignal) -> Self {
        Message::Host(signal)
    }
}

impl From<PeerEvent> for Message {
    fn from(event: PeerEvent) -> Self {
        Message::Peer(event)
    }
}
