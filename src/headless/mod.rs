//! Headless mode - NDJSON frame and event stream
//!
//! The binary has no display. Rendered frames and engine events are written
//! to stdout as structured JSON so a host harness or test script can follow
//! the face without parsing anything else.
//!
//! # Event Format
//!
//! Events are output as NDJSON (newline-delimited JSON), one event per line.
//! Each event has an "event" field indicating its type, along with
//! event-specific data and a millisecond `timestamp`.
//!
//! # Example Output
//!
//! ```json
//! {"event":"session_state","old":"disconnected","new":"connecting","timestamp":1704700001000}
//! {"event":"snapshot","snapshot":{"high":21.0,"low":12.5},"timestamp":1704700002000}
//! {"event":"frame","time":"2024-01-08T08:00:02.500+01:00","power_mode":"interactive","snapshot":{"high":21.0,"low":12.5},"timestamp":1704700002500}
//! ```

pub mod runner;

use std::io::{self, Write};

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use sunface_app::EngineEvent;
use sunface_core::prelude::*;
use sunface_core::{Fault, PowerMode, RenderFrame, SessionState, WeatherSnapshot};

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// A frame the face would draw
    Frame {
        time: DateTime<FixedOffset>,
        power_mode: PowerMode,
        snapshot: WeatherSnapshot,
        timestamp: i64,
    },

    /// Peer session moved to another state
    SessionState {
        old: String,
        new: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        timestamp: i64,
    },

    /// Accepted weather data changed
    Snapshot {
        snapshot: WeatherSnapshot,
        timestamp: i64,
    },

    /// Non-fatal fault observed by the coordinator
    Fault { fault: Fault, timestamp: i64 },

    /// Engine stopped
    Shutdown { timestamp: i64 },

    /// Error occurred outside the engine
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON, logging any failure
    pub fn emit(&self) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = self.write_to(&mut stdout) {
            error!("Failed to write headless event to stdout: {}", e);
        }
    }

    /// Write this event as one NDJSON line and flush
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        let json = serde_json::to_string(self)?;
        writeln!(out, "{}", json)?;
        out.flush()?;
        Ok(())
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn frame(frame: &RenderFrame) -> Self {
        Self::Frame {
            time: frame.time,
            power_mode: frame.power_mode,
            snapshot: frame.snapshot.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn session_state(old: &SessionState, new: &SessionState) -> Self {
        let reason = match new {
            SessionState::Failed { reason } => Some(reason.clone()),
            _ => None,
        };
        Self::SessionState {
            old: old.label().to_string(),
            new: new.label().to_string(),
            reason,
            timestamp: Self::now(),
        }
    }

    pub fn snapshot(snapshot: &WeatherSnapshot) -> Self {
        Self::Snapshot {
            snapshot: snapshot.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn fault(fault: &Fault) -> Self {
        Self::Fault {
            fault: fault.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn shutdown() -> Self {
        Self::Shutdown {
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }

    /// Translate an engine event.
    ///
    /// Frames are written by the renderer itself, so `FrameRendered` maps
    /// to nothing.
    pub fn from_engine_event(event: &EngineEvent) -> Option<Self> {
        match event {
            EngineEvent::FrameRendered(_) => None,
            EngineEvent::SessionStateChanged { old, new } => Some(Self::session_state(old, new)),
            EngineEvent::SnapshotUpdated(snapshot) => Some(Self::snapshot(snapshot)),
            EngineEvent::Fault(fault) => Some(Self::fault(fault)),
            EngineEvent::Shutdown => Some(Self::shutdown()),
        }
    }
}
