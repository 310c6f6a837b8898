//! Main update function - handles state transitions (TEA pattern)
//!
//! Handler implementations live in:
//! - `host`: host lifecycle signals and the wake sequence
//! - `peer`: peer transport completions
//! - `render`: ticks, redraws and renderer feedback

use chrono::{DateTime, Utc};
use sunface_core::prelude::*;

use crate::coordinator::Coordinator;
use crate::message::Message;

use super::{host, peer, render, UpdateAction, UpdateResult};

/// Process a message and update state.
///
/// `now` is the instant the message is processed at. Returns an optional
/// follow-up message and/or action.
pub fn update(state: &mut Coordinator, message: Message, now: DateTime<Utc>) -> UpdateResult {
    match message {
        Message::Host(signal) => host::handle_host_signal(state, signal, now),
        Message::Wake(step) => host::handle_wake_step(state, step, now),
        Message::Peer(event) => peer::handle_peer_event(state, event, now),

        Message::Tick => render::handle_tick(state, now),
        Message::Maintain => handle_maintain(state, now),
        Message::Redraw => render::handle_redraw(state, now),
        Message::FrameRendered(frame) => render::handle_frame_rendered(state, frame),
        Message::RenderFailed { message } => render::handle_render_failed(state, message, now),

        Message::Resync => match state.sync.request_snapshot(&state.session, now) {
            Some(id) => UpdateResult::action(UpdateAction::SendRequest { id }),
            None => UpdateResult::none(),
        },

        Message::Quit => {
            info!("Coordinator shutting down");
            state.request_quit();
            state.clock.stop();
            state.session.disconnect();
            UpdateResult::action(UpdateAction::DisconnectPeer)
        }
    }
}

/// Time-driven housekeeping that follows every tick
fn handle_maintain(state: &mut Coordinator, now: DateTime<Utc>) -> UpdateResult {
    let expired = state.sync.expire(now);
    if !expired.is_empty() {
        state.record_fault(sunface_core::Fault::FetchFailure);
    }

    if !state.is_visible() {
        return UpdateResult::none();
    }

    if state.session.retry_due(now) {
        return match state.session.connect() {
            Some(attempt) => {
                debug!("Reconnect backoff elapsed, attempt #{}", attempt);
                UpdateResult::action(UpdateAction::ConnectPeer { attempt })
            }
            None => UpdateResult::none(),
        };
    }

    if state.sync.resync_due(now) {
        return UpdateResult::message(Message::Resync);
    }

    UpdateResult::none()
}
