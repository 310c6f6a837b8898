//! Engine - the single event loop of a watch face instance
//!
//! The Engine owns the coordinator state, the message channel, the peer
//! transport, the renderer and the timezone watcher. Every state change
//! happens inside [`Engine::process_message`], one message at a time, so
//! no component needs a lock and renders never overlap.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use sunface_core::prelude::*;
use sunface_core::{PeerEvent, SessionState, WeatherSnapshot};
use sunface_link::{LineTransport, LoopbackPeer, PeerEventSender, PeerTransport};

use crate::config::{PeerSettings, Settings};
use crate::coordinator::Coordinator;
use crate::engine_event::EngineEvent;
use crate::handler::{self, UpdateAction};
use crate::host::HostHandle;
use crate::message::{HostSignal, Message};
use crate::renderer::Renderer;

/// Capacity of the coordinator message queue
const MESSAGE_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the transport → engine event channel
const PEER_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the engine event broadcast
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How often the timezone watcher samples the local UTC offset
const TIMEZONE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Stand-in for "never" when a deadline does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

/// Maps the monotonic runtime clock onto wall-clock time.
///
/// Anchored once at construction, so deadlines handed to the coordinator
/// and the sleeps that wait for them agree exactly, including under a
/// paused test runtime.
#[derive(Debug, Clone, Copy)]
pub struct TimeSource {
    base_instant: Instant,
    base_utc: DateTime<Utc>,
}

impl TimeSource {
    pub fn system() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Pretend the current instant is `utc`
    pub fn starting_at(utc: DateTime<Utc>) -> Self {
        Self {
            base_instant: Instant::now(),
            base_utc: utc,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.base_instant.elapsed())
            .unwrap_or(chrono::Duration::zero());
        self.base_utc + elapsed
    }

    /// Runtime instant at which wall-clock time reaches `at`
    pub fn instant_at(&self, at: DateTime<Utc>) -> Instant {
        match (at - self.base_utc).to_std() {
            Ok(offset) => self
                .base_instant
                .checked_add(offset)
                .unwrap_or_else(|| Instant::now() + FAR_FUTURE),
            // Already in the past
            Err(_) => self.base_instant,
        }
    }
}

/// Lightweight snapshot of state for change detection.
///
/// Captured before message processing, compared after to detect what
/// changed and emit the matching EngineEvents.
#[derive(Debug, Clone)]
struct StateSnapshot {
    session: SessionState,
    weather: WeatherSnapshot,
}

impl StateSnapshot {
    fn capture(state: &Coordinator) -> Self {
        Self {
            session: state.session.state().clone(),
            weather: state.snapshot().clone(),
        }
    }
}

/// Build the transport the settings ask for
pub fn transport_for(settings: &PeerSettings, events: PeerEventSender) -> Box<dyn PeerTransport> {
    match &settings.address {
        Some(address) => {
            info!("Using line transport to {}", address);
            Box::new(
                LineTransport::new(address.clone(), events)
                    .with_connect_timeout(settings.connect_timeout()),
            )
        }
        None => {
            info!("No peer address configured, using loopback peer");
            Box::new(LoopbackPeer::new(settings.loopback(), events))
        }
    }
}

/// Orchestration engine for one watch face instance
pub struct Engine {
    /// Coordinator state (the Model)
    pub coordinator: Coordinator,

    /// Sender half of the message channel. Clone for input sources.
    msg_tx: mpsc::Sender<Message>,

    /// Receiver half, drained by [`Engine::run`]
    msg_rx: mpsc::Receiver<Message>,

    transport: Box<dyn PeerTransport>,
    renderer: Box<dyn Renderer>,

    /// Bridges transport completions into the message channel
    peer_forwarder: JoinHandle<()>,

    /// Present while the timezone receiver is registered
    timezone_watcher: Option<JoinHandle<()>>,

    time: TimeSource,

    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,

    /// Event broadcaster for external consumers
    event_tx: broadcast::Sender<EngineEvent>,
}

impl Engine {
    /// Create an engine.
    ///
    /// `make_transport` receives the sender the transport must report its
    /// completions on.
    pub fn new<F>(
        settings: &Settings,
        timezone: FixedOffset,
        renderer: Box<dyn Renderer>,
        make_transport: F,
    ) -> Self
    where
        F: FnOnce(PeerEventSender) -> Box<dyn PeerTransport>,
    {
        let coordinator = Coordinator::with_settings(settings, timezone);

        let (msg_tx, msg_rx) = mpsc::channel::<Message>(MESSAGE_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let (peer_tx, peer_rx) = mpsc::channel::<PeerEvent>(PEER_CHANNEL_CAPACITY);
        let transport = make_transport(peer_tx);
        let peer_forwarder = spawn_peer_forwarder(peer_rx, msg_tx.clone());

        Self {
            coordinator,
            msg_tx,
            msg_rx,
            transport,
            renderer,
            peer_forwarder,
            timezone_watcher: None,
            time: TimeSource::system(),
            shutdown_tx,
            shutdown_rx,
            event_tx,
        }
    }

    /// Replace the wall-clock mapping (tests pin it to a known instant)
    pub fn with_time_source(mut self, time: TimeSource) -> Self {
        self.time = time;
        self
    }

    /// Subscribe to engine events.
    ///
    /// If the subscriber falls behind, older events are dropped and
    /// `RecvError::Lagged` is reported.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Handle for the host environment
    pub fn host_handle(&self) -> HostHandle {
        HostHandle::new(self.msg_tx.clone())
    }

    pub fn msg_sender(&self) -> mpsc::Sender<Message> {
        self.msg_tx.clone()
    }

    pub fn should_quit(&self) -> bool {
        self.coordinator.should_quit()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    /// Drive the loop until a `Quit` message arrives.
    ///
    /// Waits for the next message or the coordinator's next deadline,
    /// whichever comes first; a reached deadline is processed as `Tick`.
    pub async fn run(&mut self) {
        while !self.should_quit() {
            let wake_at = self
                .coordinator
                .next_wakeup()
                .map(|at| self.time.instant_at(at));

            tokio::select! {
                msg = self.msg_rx.recv() => match msg {
                    Some(msg) => self.process_message(msg),
                    None => break,
                },
                _ = sleep_until(wake_at) => self.process_message(Message::Tick),
            }
        }
        debug!("Engine loop finished");
    }

    /// Process one message and everything it chains to.
    ///
    /// Follow-up messages and renderer feedback are handled in the same
    /// cycle, in order, at one logical instant.
    pub fn process_message(&mut self, msg: Message) {
        let now = self.time.now();
        let pre = StateSnapshot::capture(&self.coordinator);

        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            let result = handler::update(&mut self.coordinator, msg, now);

            if let Some(action) = result.action {
                if let Some(feedback) = self.handle_action(action) {
                    queue.push_back(feedback);
                }
            }
            if let Some(next) = result.message {
                queue.push_back(next);
            }
        }

        let post = StateSnapshot::capture(&self.coordinator);
        self.emit_events(&pre, &post);
    }

    /// Drain and process all pending messages without waiting.
    ///
    /// Returns the number of messages processed.
    pub fn drain_pending_messages(&mut self) -> usize {
        let mut count = 0;
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.process_message(msg);
            count += 1;
        }
        count
    }

    /// Stop the clock, release the timezone receiver, disconnect the peer
    /// and notify subscribers.
    pub fn shutdown(&mut self) {
        if !self.should_quit() {
            self.process_message(Message::Quit);
        }
        self.stop_timezone_watcher();
        self.coordinator.timezone_subscribed = false;

        let _ = self.shutdown_tx.send(true);
        self.peer_forwarder.abort();

        let diag = self.coordinator.diagnostics();
        info!(
            "Engine shut down: {} frames, {} connection failures, {} fetch failures, {} stale responses, {} render failures",
            diag.frames_rendered,
            diag.connection_failures,
            diag.fetch_failures,
            diag.stale_responses_discarded,
            diag.render_failures
        );
        self.emit(EngineEvent::Shutdown);
    }

    /// Execute an action; may return a feedback message for the same cycle
    fn handle_action(&mut self, action: UpdateAction) -> Option<Message> {
        match action {
            UpdateAction::ConnectPeer { attempt } => {
                self.transport.connect(attempt);
                None
            }
            UpdateAction::SendRequest { id } => {
                self.transport.send_request(id);
                None
            }
            UpdateAction::DisconnectPeer => {
                self.transport.disconnect();
                None
            }
            UpdateAction::Render(frame) => match self.renderer.render(&frame) {
                Ok(()) => {
                    self.emit(EngineEvent::FrameRendered(frame.clone()));
                    Some(Message::FrameRendered(frame))
                }
                Err(e) => {
                    warn!("Render failed: {}", e);
                    Some(Message::RenderFailed {
                        message: e.to_string(),
                    })
                }
            },
            UpdateAction::SubscribeTimezone => {
                self.start_timezone_watcher();
                None
            }
            UpdateAction::UnsubscribeTimezone => {
                self.stop_timezone_watcher();
                None
            }
        }
    }

    fn start_timezone_watcher(&mut self) {
        if self.timezone_watcher.is_some() {
            return;
        }
        debug!("Registering timezone receiver");
        self.timezone_watcher = Some(spawn_timezone_watcher(
            self.msg_tx.clone(),
            self.shutdown_rx.clone(),
        ));
    }

    fn stop_timezone_watcher(&mut self) {
        if let Some(watcher) = self.timezone_watcher.take() {
            debug!("Releasing timezone receiver");
            watcher.abort();
        }
    }

    /// Emit EngineEvents for state changes and faults of one cycle
    fn emit_events(&mut self, pre: &StateSnapshot, post: &StateSnapshot) {
        if pre.session != post.session {
            self.emit(EngineEvent::SessionStateChanged {
                old: pre.session.clone(),
                new: post.session.clone(),
            });
        }

        if pre.weather != post.weather {
            self.emit(EngineEvent::SnapshotUpdated(post.weather.clone()));
        }

        for fault in self.coordinator.take_faults() {
            self.emit(EngineEvent::Fault(fault));
        }
    }

    /// Emit a single EngineEvent to all subscribers.
    ///
    /// send() only fails when nobody is subscribed, which is fine.
    fn emit(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop_timezone_watcher();
        self.peer_forwarder.abort();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Bridge transport completions into the coordinator queue
fn spawn_peer_forwarder(
    mut peer_rx: mpsc::Receiver<PeerEvent>,
    msg_tx: mpsc::Sender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = peer_rx.recv().await {
            if msg_tx.send(Message::Peer(event)).await.is_err() {
                break;
            }
        }
    })
}

/// Current local UTC offset as reported by the OS
fn local_offset() -> FixedOffset {
    *chrono::Local::now().offset()
}

/// Post `TimezoneChanged` whenever the local offset changes
fn spawn_timezone_watcher(
    msg_tx: mpsc::Sender<Message>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = local_offset();
        let mut ticker = tokio::time::interval(TIMEZONE_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.changed() => break,
            }

            let current = local_offset();
            if current != last {
                last = current;
                let msg = Message::Host(HostSignal::TimezoneChanged(current));
                if msg_tx.send(msg).await.is_err() {
                    break;
                }
            }
        }
    })
}
