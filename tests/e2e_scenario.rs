//! End-to-end coordinator scenarios driven through the Engine
//!
//! The transport only records calls and peer completions are injected by
//! hand, so every scenario runs on a paused clock and is deterministic.
//!
//! Run with: cargo test --test e2e_scenario

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use tokio::sync::broadcast;

use sunface_app::{Engine, EngineEvent, HostSignal, Message, Renderer, Settings, TimeSource};
use sunface_core::{
    Fault, FetchOutcome, PeerEvent, PowerMode, RenderFrame, Result, WeatherIcon, WeatherSnapshot,
};
use sunface_link::test_utils::{temperature_response, RecordingTransport, TransportCall};

// ─────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────

/// Renderer that keeps every frame it is handed
#[derive(Debug, Clone, Default)]
struct CapturingRenderer {
    frames: Arc<Mutex<Vec<RenderFrame>>>,
}

impl CapturingRenderer {
    fn frames(&self) -> Vec<RenderFrame> {
        self.frames.lock().unwrap().clone()
    }

    fn last(&self) -> Option<RenderFrame> {
        self.frames().last().cloned()
    }
}

impl Renderer for CapturingRenderer {
    fn render(&self, frame: &RenderFrame) -> Result<()> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }
}

struct Harness {
    engine: Engine,
    transport: RecordingTransport,
    renderer: CapturingRenderer,
    events: broadcast::Receiver<EngineEvent>,
}

fn epoch() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(0).unwrap()
}

fn harness() -> Harness {
    let transport = RecordingTransport::new();
    let renderer = CapturingRenderer::default();

    let owned = transport.clone();
    let engine = Engine::new(
        &Settings::default(),
        FixedOffset::east_opt(0).unwrap(),
        Box::new(renderer.clone()),
        move |_| Box::new(owned),
    )
    .with_time_source(TimeSource::starting_at(epoch()));
    let events = engine.subscribe();

    Harness {
        engine,
        transport,
        renderer,
        events,
    }
}

impl Harness {
    fn send(&mut self, msg: impl Into<Message>) {
        self.engine.process_message(msg.into());
    }

    /// Visible and connected, with request #1 in flight
    fn connected(mut self) -> Self {
        self.send(HostSignal::VisibilityChanged(true));
        self.send(PeerEvent::Connected { attempt: 1 });
        self
    }

    async fn run_for(&mut self, millis: u64) {
        let _ = tokio::time::timeout(Duration::from_millis(millis), self.engine.run()).await;
    }

    fn drain_events(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    fn faults(&mut self) -> Vec<Fault> {
        self.drain_events()
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::Fault(fault) => Some(fault),
                _ => None,
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────
// Weather ordering
// ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_response_renders_then_late_reply_is_discarded() {
    let mut h = harness().connected();
    assert_eq!(h.transport.requests(), vec![1]);

    h.send(temperature_response(1, 20.0, 10.0));

    let frame = h.renderer.last().unwrap();
    assert_eq!(frame.snapshot.high, Some(20.0));
    assert_eq!(frame.snapshot.low, Some(10.0));
    assert!(frame.snapshot.icon.is_none());
    let rendered = h.renderer.frames().len();
    h.drain_events();

    h.send(temperature_response(0, 3.0, -1.0));

    assert_eq!(
        h.engine.coordinator.snapshot(),
        &WeatherSnapshot::temperatures(20.0, 10.0)
    );
    assert_eq!(h.renderer.frames().len(), rendered);
    assert_eq!(h.faults(), vec![Fault::StaleResponseDiscarded { id: 0 }]);
}

#[tokio::test(start_paused = true)]
async fn test_newest_request_wins_regardless_of_arrival_order() {
    let mut h = harness().connected();
    h.send(Message::Resync);
    assert_eq!(h.transport.requests(), vec![1, 2]);

    h.send(temperature_response(2, 22.0, 12.0));
    h.send(temperature_response(1, 18.0, 8.0));

    assert_eq!(
        h.engine.coordinator.snapshot(),
        &WeatherSnapshot::temperatures(22.0, 12.0)
    );
    assert!(h
        .faults()
        .contains(&Fault::StaleResponseDiscarded { id: 1 }));
}

#[tokio::test(start_paused = true)]
async fn test_partial_responses_merge_per_field() {
    let mut h = harness().connected();
    h.send(Message::Resync);
    let icon = WeatherIcon::new(vec![0x89, b'P', b'N', b'G']);

    h.send(PeerEvent::Response {
        id: 2,
        outcome: FetchOutcome::Snapshot(WeatherSnapshot::icon_only(icon.clone())),
    });
    h.send(temperature_response(1, 18.0, 8.0));

    let snapshot = h.engine.coordinator.snapshot();
    assert_eq!(snapshot.high, Some(18.0));
    assert_eq!(snapshot.low, Some(8.0));
    assert_eq!(snapshot.icon, Some(icon));
}

#[tokio::test(start_paused = true)]
async fn test_push_beats_reply_to_older_request() {
    let mut h = harness().connected();

    h.send(PeerEvent::Push(WeatherSnapshot::temperatures(25.0, 15.0)));
    h.send(temperature_response(1, 18.0, 8.0));

    assert_eq!(
        h.engine.coordinator.snapshot(),
        &WeatherSnapshot::temperatures(25.0, 15.0)
    );
    assert_eq!(h.renderer.last().unwrap().snapshot.high, Some(25.0));
}

// ─────────────────────────────────────────────────────────
// Clock lifecycle
// ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_hidden_face_stops_rendering() {
    let mut h = harness();
    h.send(HostSignal::VisibilityChanged(true));

    // Wake frame, then 500 and 1000 ms
    h.run_for(1_250).await;
    assert_eq!(h.renderer.frames().len(), 3);

    h.send(HostSignal::VisibilityChanged(false));
    h.run_for(2_000).await;
    assert_eq!(h.renderer.frames().len(), 3);

    // Wake at 3250 ms, then the 3500 ms slot
    h.send(HostSignal::VisibilityChanged(true));
    h.run_for(600).await;
    assert_eq!(h.renderer.frames().len(), 5);

    // Still connecting from the first wake, so no second attempt
    assert_eq!(h.transport.calls(), vec![TransportCall::Connect(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_ambient_switches_to_minute_cadence() {
    let mut h = harness();
    h.send(HostSignal::VisibilityChanged(true));
    h.run_for(1_100).await;
    assert_eq!(h.renderer.frames().len(), 3);

    h.send(HostSignal::AmbientModeChanged(true));
    let frames = h.renderer.frames();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[3].power_mode, PowerMode::AmbientLowPower);

    // Next tick on the minute boundary only
    h.run_for(58_000).await;
    assert_eq!(h.renderer.frames().len(), 4);
    h.run_for(2_000).await;
    assert_eq!(h.renderer.frames().len(), 5);

    let last = h.renderer.last().unwrap();
    assert_eq!(last.time.timestamp_millis(), 60_000);
    assert_eq!(last.power_mode, PowerMode::AmbientLowPower);
}

#[tokio::test(start_paused = true)]
async fn test_timezone_change_renders_local_time() {
    let mut h = harness();
    h.send(HostSignal::VisibilityChanged(true));
    h.run_for(200).await;
    let india = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();

    h.send(HostSignal::TimezoneChanged(india));

    let last = h.renderer.last().unwrap();
    assert_eq!(last.time.offset(), &india);
    assert_eq!(last.time.timestamp_millis(), 200);
}

// ─────────────────────────────────────────────────────────
// Faults and shutdown
// ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_failed_link_is_retried_with_backoff() {
    let mut h = harness();
    h.send(HostSignal::VisibilityChanged(true));

    h.send(PeerEvent::ConnectionFailed {
        attempt: 1,
        reason: "refused".to_string(),
    });
    h.run_for(1_100).await;
    assert_eq!(h.transport.last_attempt(), Some(2));

    h.send(PeerEvent::ConnectionFailed {
        attempt: 2,
        reason: "refused".to_string(),
    });
    // Second failure doubles the delay
    h.run_for(1_900).await;
    assert_eq!(h.transport.last_attempt(), Some(2));
    h.run_for(200).await;
    assert_eq!(h.transport.last_attempt(), Some(3));

    assert_eq!(h.engine.coordinator.diagnostics().connection_failures, 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_disconnects_and_broadcasts() {
    let mut h = harness().connected();
    h.drain_events();

    h.engine.shutdown();

    assert!(h.engine.should_quit());
    assert!(!h.engine.coordinator.clock.is_running());
    assert_eq!(h.transport.calls().last(), Some(&TransportCall::Disconnect));
    assert_eq!(h.drain_events().last(), Some(&EngineEvent::Shutdown));
}
