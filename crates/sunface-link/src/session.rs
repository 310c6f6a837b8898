//! Peer session lifecycle
//!
//! Owns the [`SessionState`] of the link to the paired peer. Methods are the
//! only mutation path and only move along these edges:
//!
//! ```text
//! Disconnected --connect--> Connecting --on_connected--> Connected
//! Connected --suspend--> Suspended --resume--> Connecting
//! Failed --connect--> Connecting
//! <any> --on_connection_failed--> Failed
//! ```
//!
//! Nothing here performs I/O. Methods that start an attempt return the
//! attempt number; the caller hands it to the transport, whose completion
//! comes back later as a [`sunface_core::PeerEvent`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use sunface_core::prelude::*;
use sunface_core::SessionState;

/// Default initial reconnection backoff.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Default maximum reconnection backoff (cap).
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Reconnect pacing after a failed or suspended link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_BACKOFF,
            max: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl Backoff {
    /// Delay before reconnect attempt following `failures` consecutive failures.
    ///
    /// The formula is `initial * 2^(failures-1)`, capped at `max`.
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let multiplier: u32 = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(multiplier)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

/// Connectivity lifecycle to the paired peer
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    /// Number of the most recent connect attempt (0 = never attempted)
    attempt: u64,
    consecutive_failures: u32,
    /// When the link was last lost (Failed or Suspended)
    lost_at: Option<DateTime<Utc>>,
    backoff: Backoff,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Backoff::default())
    }
}

impl Session {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            state: SessionState::Disconnected,
            attempt: 0,
            consecutive_failures: 0,
            lost_at: None,
            backoff,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// True only while `Connected`
    pub fn is_usable(&self) -> bool {
        self.state.is_usable()
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Start connecting.
    ///
    /// Idempotent: returns `None` while already `Connecting` or `Connected`.
    /// From `Suspended` this is the `resume` edge. Otherwise returns the new
    /// attempt number the transport must be told to connect with.
    pub fn connect(&mut self) -> Option<u64> {
        match self.state {
            SessionState::Connecting | SessionState::Connected => {
                trace!("connect() ignored, session already {}", self.state);
                None
            }
            SessionState::Suspended => self.resume().ok(),
            SessionState::Disconnected | SessionState::Failed { .. } => {
                Some(self.begin_attempt())
            }
        }
    }

    /// `Suspended --resume--> Connecting`
    pub fn resume(&mut self) -> Result<u64> {
        if self.state != SessionState::Suspended {
            return Err(Error::invalid_transition(&self.state, "resume"));
        }
        Ok(self.begin_attempt())
    }

    /// `Connecting --on_connected--> Connected`
    ///
    /// Completions of an abandoned attempt are rejected.
    pub fn on_connected(&mut self, attempt: u64) -> Result<()> {
        if self.state != SessionState::Connecting || attempt != self.attempt {
            return Err(Error::invalid_transition(&self.state, "on_connected"));
        }
        info!("Peer session connected (attempt #{})", attempt);
        self.state = SessionState::Connected;
        self.consecutive_failures = 0;
        self.lost_at = None;
        Ok(())
    }

    /// `Connected --suspend--> Suspended`
    pub fn suspend(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.state != SessionState::Connected {
            return Err(Error::invalid_transition(&self.state, "suspend"));
        }
        info!("Peer session suspended");
        self.state = SessionState::Suspended;
        self.lost_at = Some(now);
        Ok(())
    }

    /// `<any> --on_connection_failed--> Failed`
    ///
    /// Failures reported for an attempt other than the current one are stale
    /// and rejected. Repeated failures of the same attempt only refresh the
    /// reason.
    pub fn on_connection_failed(
        &mut self,
        attempt: u64,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if attempt != self.attempt {
            return Err(Error::invalid_transition(
                &self.state,
                "on_connection_failed",
            ));
        }
        let reason = reason.into();
        if !matches!(self.state, SessionState::Failed { .. }) {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.lost_at = Some(now);
        }
        warn!(
            "Peer session failed (attempt #{}, {} consecutive): {}",
            attempt, self.consecutive_failures, reason
        );
        self.state = SessionState::Failed { reason };
        Ok(())
    }

    /// Drop back to `Disconnected`, e.g. on shutdown
    pub fn disconnect(&mut self) {
        if self.state != SessionState::Disconnected {
            debug!("Peer session disconnected (was {})", self.state);
        }
        self.state = SessionState::Disconnected;
        self.lost_at = None;
    }

    /// When a lost link should next be retried.
    ///
    /// `None` while connecting, connected, or deliberately disconnected.
    pub fn retry_at(&self) -> Option<DateTime<Utc>> {
        let lost_at = self.lost_at?;
        let delay = match self.state {
            SessionState::Failed { .. } => self.backoff.delay(self.consecutive_failures),
            SessionState::Suspended => self.backoff.initial,
            _ => return None,
        };
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        Some(lost_at.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }

    /// Whether a lost link is due for another attempt
    pub fn retry_due(&self, now: DateTime<Utc>) -> bool {
        self.retry_at().is_some_and(|at| at <= now)
    }

    fn begin_attempt(&mut self) -> u64 {
        self.attempt = self.attempt.saturating_add(1);
        debug!(
            "Peer session connecting (attempt #{}, was {})",
            self.attempt, self.state
        );
        self.state = SessionState::Connecting;
        self.attempt
    }
}
