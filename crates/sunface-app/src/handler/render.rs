//! Tick, redraw and renderer feedback handlers

use chrono::{DateTime, Utc};
use sunface_core::prelude::*;
use sunface_core::{Fault, RenderFrame};

use crate::coordinator::Coordinator;
use crate::message::Message;

use super::{UpdateAction, UpdateResult};

/// A deadline elapsed: collect the clock tick, then run housekeeping
pub fn handle_tick(state: &mut Coordinator, now: DateTime<Utc>) -> UpdateResult {
    match state.clock.poll(now) {
        Some(tick) => {
            trace!("Tick ({:?}, {} ms)", tick.reason, tick.interval_millis);
            UpdateResult::action(UpdateAction::Render(state.build_frame(now)))
                .with_message(Message::Maintain)
        }
        None => UpdateResult::message(Message::Maintain),
    }
}

pub fn handle_redraw(state: &mut Coordinator, now: DateTime<Utc>) -> UpdateResult {
    if !state.clock.is_running() {
        return UpdateResult::none();
    }
    UpdateResult::action(UpdateAction::Render(state.build_frame(now)))
}

pub fn handle_frame_rendered(state: &mut Coordinator, frame: RenderFrame) -> UpdateResult {
    state.diagnostics_mut().record_frame();
    state.render_retry_pending = false;
    state.set_last_frame(frame);
    UpdateResult::none()
}

/// First failure re-renders once; a second consecutive failure is dropped
pub fn handle_render_failed(
    state: &mut Coordinator,
    message: String,
    now: DateTime<Utc>,
) -> UpdateResult {
    state.record_fault(Fault::RenderFailure { message });

    if state.render_retry_pending {
        warn!("Render failed again, waiting for the next event");
        state.render_retry_pending = false;
        return UpdateResult::none();
    }

    state.render_retry_pending = true;
    UpdateResult::action(UpdateAction::Render(state.build_frame(now)))
}
