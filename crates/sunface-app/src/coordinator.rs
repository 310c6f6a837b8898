//! Coordinator state (the Model in TEA)
//!
//! Composes the peer [`Session`], the [`WeatherSync`] and the
//! [`RenderClock`] of one watch face instance, together with the host state
//! they react to. All mutation goes through [`crate::handler::update`].

use chrono::{DateTime, FixedOffset, Utc};
use sunface_core::prelude::*;
use sunface_core::{Diagnostics, Fault, PowerMode, RenderFrame, WeatherSnapshot};
use sunface_link::{Session, WeatherSync};

use crate::clock::RenderClock;
use crate::config::Settings;

/// State of one watch face instance
#[derive(Debug, Clone)]
pub struct Coordinator {
    pub session: Session,
    pub sync: WeatherSync,
    pub clock: RenderClock,

    visible: bool,
    in_ambient: bool,
    timezone: FixedOffset,

    /// Whether the host timezone receiver is registered
    pub(crate) timezone_subscribed: bool,

    /// Last frame the renderer accepted
    last_frame: Option<RenderFrame>,

    /// A failed frame has already been retried once
    pub(crate) render_retry_pending: bool,

    diagnostics: Diagnostics,

    /// Faults observed since the engine last drained them
    faults: Vec<Fault>,

    quitting: bool,
}

impl Coordinator {
    /// Fresh instance with default timing, hidden and interactive
    pub fn new(timezone: FixedOffset) -> Self {
        Self::with_settings(&Settings::default(), timezone)
    }

    pub fn with_settings(settings: &Settings, timezone: FixedOffset) -> Self {
        Self {
            session: Session::new(settings.session.backoff()),
            sync: WeatherSync::new(settings.sync.policy()),
            clock: RenderClock::new(settings.clock.interactive_interval()),
            visible: false,
            in_ambient: false,
            timezone,
            timezone_subscribed: false,
            last_frame: None,
            render_retry_pending: false,
            diagnostics: Diagnostics::default(),
            faults: Vec::new(),
            quitting: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn in_ambient(&self) -> bool {
        self.in_ambient
    }

    pub(crate) fn set_ambient(&mut self, in_ambient: bool) {
        self.in_ambient = in_ambient;
    }

    pub fn power_mode(&self) -> PowerMode {
        PowerMode::from_ambient(self.in_ambient)
    }

    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    pub(crate) fn set_timezone(&mut self, timezone: FixedOffset) {
        self.timezone = timezone;
    }

    pub fn timezone_subscribed(&self) -> bool {
        self.timezone_subscribed
    }

    /// The latest accepted weather data
    pub fn snapshot(&self) -> &WeatherSnapshot {
        self.sync.snapshot()
    }

    pub fn last_frame(&self) -> Option<&RenderFrame> {
        self.last_frame.as_ref()
    }

    pub(crate) fn set_last_frame(&mut self, frame: RenderFrame) {
        self.last_frame = Some(frame);
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn should_quit(&self) -> bool {
        self.quitting
    }

    pub(crate) fn request_quit(&mut self) {
        self.quitting = true;
    }

    /// Build the frame for `now` from the current state
    pub fn build_frame(&self, now: DateTime<Utc>) -> RenderFrame {
        RenderFrame {
            time: now.with_timezone(&self.timezone),
            snapshot: self.sync.snapshot().clone(),
            power_mode: self.power_mode(),
        }
    }

    /// Record a non-fatal fault for diagnostics and broadcast
    pub(crate) fn record_fault(&mut self, fault: Fault) {
        match &fault {
            Fault::StaleResponseDiscarded { id } => debug!("Stale response #{} discarded", id),
            other => info!("Fault: {:?}", other),
        }
        self.diagnostics.record(&fault);
        self.faults.push(fault);
    }

    /// Faults observed since the last call
    pub fn take_faults(&mut self) -> Vec<Fault> {
        std::mem::take(&mut self.faults)
    }

    /// Earliest instant something time-driven needs attention.
    ///
    /// Considers the clock's next tick, the oldest in-flight request's
    /// expiry, and, while visible, the session's reconnect backoff.
    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        let retry = if self.visible {
            self.session.retry_at()
        } else {
            None
        };
        [self.clock.next_deadline(), self.sync.next_expiry(), retry]
            .into_iter()
            .flatten()
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sunface_core::FetchOutcome;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_new_coordinator_is_hidden_and_idle() {
        let coordinator = Coordinator::new(utc());
        assert!(!coordinator.is_visible());
        assert!(!coordinator.clock.is_running());
        assert_eq!(coordinator.power_mode(), PowerMode::Interactive);
        assert!(coordinator.snapshot().is_empty());
        assert_eq!(coordinator.next_wakeup(), None);
    }

    #[test]
    fn test_build_frame_uses_timezone_and_mode() {
        let mut coordinator = Coordinator::new(FixedOffset::east_opt(2 * 3600).unwrap());
        coordinator.set_ambient(true);

        let frame = coordinator.build_frame(at_ms(0));

        assert_eq!(frame.time.offset().local_minus_utc(), 7200);
        assert_eq!(frame.time.timestamp_millis(), 0);
        assert_eq!(frame.power_mode, PowerMode::AmbientLowPower);
    }

    #[test]
    fn test_record_fault_counts_and_queues() {
        let mut coordinator = Coordinator::new(utc());
        coordinator.record_fault(Fault::FetchFailure);
        coordinator.record_fault(Fault::StaleResponseDiscarded { id: 0 });

        assert_eq!(coordinator.diagnostics().fetch_failures, 1);
        assert_eq!(coordinator.diagnostics().stale_responses_discarded, 1);
        assert_eq!(coordinator.take_faults().len(), 2);
        assert!(coordinator.take_faults().is_empty());
    }

    #[test]
    fn test_next_wakeup_takes_earliest_deadline() {
        let mut coordinator = Coordinator::new(utc());
        coordinator.clock.start(at_ms(0));
        assert_eq!(coordinator.next_wakeup(), Some(at_ms(500)));

        let attempt = coordinator.session.connect().unwrap();
        coordinator.session.on_connected(attempt).unwrap();
        coordinator
            .sync
            .request_snapshot(&coordinator.session, at_ms(0))
            .unwrap();
        coordinator.clock.stop();

        // Only the request expiry is left
        assert_eq!(coordinator.next_wakeup(), Some(at_ms(10_000)));

        let _ = coordinator.sync.apply_response(
            1,
            FetchOutcome::Snapshot(WeatherSnapshot::temperatures(1.0, 0.0)),
            at_ms(5),
        );
        assert_eq!(coordinator.next_wakeup(), None);
    }

    #[test]
    fn test_reconnect_backoff_only_wakes_while_visible() {
        let mut coordinator = Coordinator::new(utc());
        let attempt = coordinator.session.connect().unwrap();
        coordinator
            .session
            .on_connection_failed(attempt, "refused", at_ms(0))
            .unwrap();

        assert_eq!(coordinator.next_wakeup(), None);

        coordinator.set_visible(true);
        assert_eq!(coordinator.next_wakeup(), Some(at_ms(1_000)));
    }
}
