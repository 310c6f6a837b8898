//! External renderer boundary
//!
//! Drawing is not done here. The engine hands each [`RenderFrame`] to a
//! [`Renderer`] and only cares whether it succeeded.

use sunface_core::prelude::*;
use sunface_core::RenderFrame;

/// Draws one frame of the watch face.
///
/// Called from the engine loop only, so calls never overlap. A returned
/// error is absorbed: the engine retries the frame once and then gives up
/// until the next qualifying event.
#[cfg_attr(test, mockall::automock)]
pub trait Renderer: Send {
    fn render(&self, frame: &RenderFrame) -> Result<()>;
}

/// Renderer that draws nothing, for runs where only events matter
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&self, frame: &RenderFrame) -> Result<()> {
        trace!("Discarding frame at {}", frame.time);
        Ok(())
    }
}
