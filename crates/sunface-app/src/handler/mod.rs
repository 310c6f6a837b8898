//! Handler module - TEA update function and event handlers
//!
//! Organized into submodules:
//! - `update`: Main update() function and message dispatch
//! - `host`: Visibility, ambient mode and timezone signals, wake sequence
//! - `peer`: Peer transport completions
//! - `render`: Ticks, redraws and renderer feedback

pub(crate) mod host;
pub(crate) mod peer;
pub(crate) mod render;
pub(crate) mod update;


use sunface_core::{RenderFrame, RequestId};

use crate::message::Message;

// Re-export main entry point
pub use update::update;

/// Actions that the engine should perform after update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// Start connect attempt `attempt` on the transport
    ConnectPeer { attempt: u64 },

    /// Send fetch request `id` to the peer
    SendRequest { id: RequestId },

    /// Tear the peer link down
    DisconnectPeer,

    /// Hand a frame to the renderer
    Render(RenderFrame),

    /// Register the host timezone-change receiver
    SubscribeTimezone,

    /// Release the host timezone-change receiver
    UnsubscribeTimezone,
}

/// Result of processing a message
#[derive(Debug, Default)]
pub struct UpdateResult {
    /// Optional follow-up message to process
    pub message: Option<Message>,
    /// Optional action for the engine to perform
    pub action: Option<UpdateAction>,
}

impl UpdateResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn message(msg: Message) -> Self {
        Self {
            message: Some(msg),
            action: None,
        }
    }

    pub fn action(action: UpdateAction) -> Self {
        Self {
            message: None,
            action: Some(action),
        }
    }

    pub fn with_message(mut self, msg: Message) -> Self {
        self.message = Some(msg);
        self
    }

    /// Action if present, otherwise nothing
    pub fn maybe_action(action: Option<UpdateAction>) -> Self {
        Self {
            message: None,
            action,
        }
    }
}
