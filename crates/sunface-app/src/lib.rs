//! sunface-app - Coordination and orchestration for the sunface watch face
//!
//! This crate implements the TEA (The Elm Architecture) pattern for the
//! coordinator state, the render clock, the Engine that owns the event loop,
//! the host-facing handle and configuration loading.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod engine_event;
pub mod handler;
pub mod host;
pub mod message;
pub mod renderer;

// Re-export primary types
pub use clock::RenderClock;
pub use config::{load_settings, PeerSettings, Settings};
pub use coordinator::Coordinator;
pub use engine::{transport_for, Engine, TimeSource};
pub use engine_event::EngineEvent;
pub use handler::{UpdateAction, UpdateResult};
pub use host::{HostHandle, HostListener};
pub use message::{HostSignal, Message, WakeStep};
pub use renderer::{NullRenderer, Renderer};
