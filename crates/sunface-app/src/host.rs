//! Host-facing entry points
//!
//! The host environment pushes lifecycle signals through a [`HostListener`].
//! [`HostHandle`] implements it by posting messages onto the engine queue,
//! so the host never touches coordinator state directly.

use chrono::FixedOffset;
use tokio::sync::mpsc;

use sunface_core::prelude::*;

use crate::message::{HostSignal, Message};

/// One method per host lifecycle event
pub trait HostListener {
    fn visibility_changed(&self, visible: bool);
    fn ambient_mode_changed(&self, in_ambient: bool);
    fn timezone_changed(&self, zone: FixedOffset);
}

/// Cloneable handle that forwards host signals to an [`crate::Engine`]
#[derive(Debug, Clone)]
pub struct HostHandle {
    msg_tx: mpsc::Sender<Message>,
}

impl HostHandle {
    pub fn new(msg_tx: mpsc::Sender<Message>) -> Self {
        Self { msg_tx }
    }

    /// Ask for fresh weather data now
    pub fn request_sync(&self) -> bool {
        self.post(Message::Resync)
    }

    /// Ask the engine loop to stop
    pub fn quit(&self) -> bool {
        self.post(Message::Quit)
    }

    /// Post a message without blocking. Returns `false` if the queue is full
    /// or the engine is gone.
    pub fn post(&self, msg: Message) -> bool {
        match self.msg_tx.try_send(msg) {
            Ok(()) => true,
            Err(e) => {
                warn!("Host signal dropped: {}", e);
                false
            }
        }
    }
}

impl HostListener for HostHandle {
    fn visibility_changed(&self, visible: bool) {
        self.post(HostSignal::VisibilityChanged(visible).into());
    }

    fn ambient_mode_changed(&self, in_ambient: bool) {
        self.post(HostSignal::AmbientModeChanged(in_ambient).into());
    }

    fn timezone_changed(&self, zone: FixedOffset) {
        self.post(HostSignal::TimezoneChanged(zone).into());
    }
}
