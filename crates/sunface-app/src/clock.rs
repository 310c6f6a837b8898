//! Power-aware render scheduling
//!
//! [`RenderClock`] is a pure scheduler: it never sleeps or spawns. The
//! engine asks it for [`RenderClock::next_deadline`], waits until then, and
//! calls [`RenderClock::poll`] to collect the tick.
//!
//! Periodic ticks sit on a fixed grid aligned to the Unix epoch: every
//! `interactive_interval` while interactive, every minute boundary while
//! ambient. A poll that arrives late emits a single tick and moves on to the
//! next grid slot after `now`, so missed slots are coalesced instead of
//! bursting.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sunface_core::prelude::*;
use sunface_core::{PowerMode, TickReason, TickSpec};

/// Default interactive tick interval
pub const DEFAULT_INTERACTIVE_INTERVAL: Duration = Duration::from_millis(500);

/// Lower bound for the interactive interval
pub const MIN_INTERACTIVE_INTERVAL: Duration = Duration::from_millis(100);

/// Ambient cadence: one tick per minute boundary
pub const AMBIENT_INTERVAL: Duration = Duration::from_secs(60);

/// Whether the clock should be running for the given host state.
///
/// The clock runs whenever the face is visible. Ambient mode does not stop
/// it; it only drops the cadence to [`AMBIENT_INTERVAL`].
pub fn should_be_running(visible: bool, _in_ambient: bool) -> bool {
    visible
}

/// Tick scheduler for one watch face instance
#[derive(Debug, Clone)]
pub struct RenderClock {
    interactive_interval: Duration,
    mode: PowerMode,
    running: bool,
    /// Next periodic tick; `None` while stopped
    next_due: Option<DateTime<Utc>>,
}

impl Default for RenderClock {
    fn default() -> Self {
        Self::new(DEFAULT_INTERACTIVE_INTERVAL)
    }
}

impl RenderClock {
    /// Create a stopped clock in interactive mode.
    ///
    /// `interactive_interval` is clamped to at least [`MIN_INTERACTIVE_INTERVAL`].
    pub fn new(interactive_interval: Duration) -> Self {
        let interactive_interval = interactive_interval.max(MIN_INTERACTIVE_INTERVAL);
        Self {
            interactive_interval,
            mode: PowerMode::Interactive,
            running: false,
            next_due: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> PowerMode {
        self.mode
    }

    /// Interval of the current mode
    pub fn interval(&self) -> Duration {
        self.interval_for(self.mode)
    }

    pub fn interval_for(&self, mode: PowerMode) -> Duration {
        match mode {
            PowerMode::Interactive => self.interactive_interval,
            PowerMode::AmbientLowPower => AMBIENT_INTERVAL,
        }
    }

    /// When the next periodic tick is due
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.next_due
    }

    /// Start scheduling. No-op while already running.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.running {
            return;
        }
        self.running = true;
        self.next_due = Some(self.slot_after(now));
        debug!(
            "Render clock started ({}, every {:?})",
            self.mode,
            self.interval()
        );
    }

    /// Stop scheduling. Future ticks are cancelled.
    pub fn stop(&mut self) {
        if self.running {
            debug!("Render clock stopped");
        }
        self.running = false;
        self.next_due = None;
    }

    /// Collect the periodic tick if it is due
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<TickSpec> {
        let due = self.next_due?;
        if due > now {
            return None;
        }
        self.next_due = Some(self.slot_after(now));
        Some(self.tick(TickReason::Periodic))
    }

    /// Switch cadence.
    ///
    /// While running, returns an immediate `ModeChanged` tick. A periodic
    /// tick that is already due is kept; otherwise the next tick moves onto
    /// the new mode's grid.
    pub fn set_mode(&mut self, mode: PowerMode, now: DateTime<Utc>) -> Option<TickSpec> {
        if mode == self.mode {
            return None;
        }
        self.mode = mode;
        if !self.running {
            return None;
        }

        if self.next_due.is_some_and(|due| due > now) {
            self.next_due = Some(self.slot_after(now));
        }
        debug!("Render clock switched to {} ({:?})", mode, self.interval());
        Some(self.tick(TickReason::ModeChanged))
    }

    /// Out-of-band tick for a timezone change.
    ///
    /// Leaves the periodic schedule untouched. `None` while stopped.
    pub fn timezone_changed(&self) -> Option<TickSpec> {
        self.running.then(|| self.tick(TickReason::TimezoneChanged))
    }

    fn tick(&self, reason: TickReason) -> TickSpec {
        TickSpec {
            interval_millis: duration_millis(self.interval()),
            reason,
        }
    }

    /// First grid slot strictly after `t`
    fn slot_after(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let period = duration_millis(self.interval()).max(1) as i64;
        let ms = t.timestamp_millis();
        let slot = ms.div_euclid(period).saturating_add(1).saturating_mul(period);
        Utc.timestamp_millis_opt(slot)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
