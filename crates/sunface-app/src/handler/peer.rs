//! Peer transport completion handlers

use chrono::{DateTime, Utc};
use sunface_core::prelude::*;
use sunface_core::{Fault, FetchOutcome, PeerEvent, RequestId, WeatherSnapshot};
use sunface_link::SyncOutcome;

use crate::coordinator::Coordinator;
use crate::message::Message;

use super::{UpdateAction, UpdateResult};

pub fn handle_peer_event(
    state: &mut Coordinator,
    event: PeerEvent,
    now: DateTime<Utc>,
) -> UpdateResult {
    trace!("Peer event: {}", event.event_type());
    match event {
        PeerEvent::Connected { attempt } => handle_connected(state, attempt),
        PeerEvent::ConnectionFailed { attempt, reason } => {
            handle_connection_failed(state, attempt, reason, now)
        }
        PeerEvent::ConnectionSuspended => {
            if let Err(e) = state.session.suspend(now) {
                debug!("Ignoring suspension: {}", e);
            }
            UpdateResult::none()
        }
        PeerEvent::Response { id, outcome } => handle_response(state, id, outcome, now),
        PeerEvent::Push(update) => handle_push(state, update, now),
    }
}

fn handle_connected(state: &mut Coordinator, attempt: u64) -> UpdateResult {
    match state.session.on_connected(attempt) {
        Ok(()) => UpdateResult::message(Message::Resync),
        Err(e) => {
            debug!("Ignoring stale connect completion #{}: {}", attempt, e);
            UpdateResult::none()
        }
    }
}

fn handle_connection_failed(
    state: &mut Coordinator,
    attempt: u64,
    reason: String,
    now: DateTime<Utc>,
) -> UpdateResult {
    if let Err(e) = state
        .session
        .on_connection_failed(attempt, reason.clone(), now)
    {
        debug!("Ignoring stale failure of attempt #{}: {}", attempt, e);
        return UpdateResult::none();
    }

    state.record_fault(Fault::ConnectionFailure { reason });
    if state.sync.on_session_failed() {
        state.record_fault(Fault::FetchFailure);
    }
    UpdateResult::none()
}

fn handle_response(
    state: &mut Coordinator,
    id: RequestId,
    outcome: FetchOutcome,
    now: DateTime<Utc>,
) -> UpdateResult {
    let result = state.sync.apply_response(id, outcome, now);
    apply_sync_outcome(state, result, now)
}

fn handle_push(
    state: &mut Coordinator,
    update: WeatherSnapshot,
    now: DateTime<Utc>,
) -> UpdateResult {
    let result = state.sync.apply_push(update, now);
    apply_sync_outcome(state, result, now)
}

fn apply_sync_outcome(
    state: &mut Coordinator,
    outcome: SyncOutcome,
    now: DateTime<Utc>,
) -> UpdateResult {
    match outcome {
        SyncOutcome::Updated(_) => {
            // Weather changes show up right away, but only on a live face
            if state.clock.is_running() {
                UpdateResult::action(UpdateAction::Render(state.build_frame(now)))
            } else {
                UpdateResult::none()
            }
        }
        SyncOutcome::Unchanged => UpdateResult::none(),
        SyncOutcome::StaleDiscarded { id } => {
            state.record_fault(Fault::StaleResponseDiscarded { id });
            UpdateResult::none()
        }
        SyncOutcome::FetchFailed => {
            state.record_fault(Fault::FetchFailure);
            UpdateResult::none()
        }
    }
}
