//! Host lifecycle handlers
//!
//! Becoming visible runs the wake sequence as chained messages:
//! reconnect, then resync, then resume the clock. Becoming hidden stops the
//! clock and releases the timezone receiver.

use chrono::{DateTime, FixedOffset, Utc};
use sunface_core::prelude::*;

use crate::clock::should_be_running;
use crate::coordinator::Coordinator;
use crate::message::{HostSignal, Message, WakeStep};

use super::{UpdateAction, UpdateResult};

pub fn handle_host_signal(
    state: &mut Coordinator,
    signal: HostSignal,
    now: DateTime<Utc>,
) -> UpdateResult {
    match signal {
        HostSignal::VisibilityChanged(visible) => handle_visibility_changed(state, visible),
        HostSignal::AmbientModeChanged(in_ambient) => {
            handle_ambient_mode_changed(state, in_ambient, now)
        }
        HostSignal::TimezoneChanged(zone) => handle_timezone_changed(state, zone, now),
    }
}

fn handle_visibility_changed(state: &mut Coordinator, visible: bool) -> UpdateResult {
    if visible == state.is_visible() {
        return UpdateResult::none();
    }
    state.set_visible(visible);

    if should_be_running(visible, state.in_ambient()) {
        info!("Face visible");
        return UpdateResult::message(Message::Wake(WakeStep::Reconnect));
    }

    info!("Face hidden");
    state.clock.stop();
    release_timezone(state)
}

fn handle_ambient_mode_changed(
    state: &mut Coordinator,
    in_ambient: bool,
    now: DateTime<Utc>,
) -> UpdateResult {
    if in_ambient == state.in_ambient() {
        return UpdateResult::none();
    }
    state.set_ambient(in_ambient);

    let mode = state.power_mode();
    match state.clock.set_mode(mode, now) {
        Some(_tick) => UpdateResult::action(UpdateAction::Render(state.build_frame(now))),
        None => UpdateResult::none(),
    }
}

fn handle_timezone_changed(
    state: &mut Coordinator,
    zone: FixedOffset,
    now: DateTime<Utc>,
) -> UpdateResult {
    // Zones sharing an offset still get their tick
    info!("Timezone changed {} -> {}", state.timezone(), zone);
    state.set_timezone(zone);

    match state.clock.timezone_changed() {
        Some(_tick) => UpdateResult::action(UpdateAction::Render(state.build_frame(now))),
        None => UpdateResult::none(),
    }
}

pub fn handle_wake_step(
    state: &mut Coordinator,
    step: WakeStep,
    now: DateTime<Utc>,
) -> UpdateResult {
    if !state.is_visible() {
        // Hidden again before the sequence finished
        return UpdateResult::none();
    }

    match step {
        WakeStep::Reconnect => {
            let action = state
                .session
                .connect()
                .map(|attempt| UpdateAction::ConnectPeer { attempt });
            UpdateResult::maybe_action(action).with_message(Message::Wake(WakeStep::Resync))
        }
        WakeStep::Resync => {
            let action = state
                .sync
                .request_snapshot(&state.session, now)
                .map(|id| UpdateAction::SendRequest { id });
            UpdateResult::maybe_action(action).with_message(Message::Wake(WakeStep::ResumeClock))
        }
        WakeStep::ResumeClock => {
            state.clock.start(now);
            if state.timezone_subscribed {
                return UpdateResult::message(Message::Redraw);
            }
            state.timezone_subscribed = true;
            UpdateResult::action(UpdateAction::SubscribeTimezone).with_message(Message::Redraw)
        }
    }
}

fn release_timezone(state: &mut Coordinator) -> UpdateResult {
    if !state.timezone_subscribed {
        return UpdateResult::none();
    }
    state.timezone_subscribed = false;
    UpdateResult::action(UpdateAction::UnsubscribeTimezone)
}
