//! sunface Library
//!
//! Headless host for the sunface weather watch face: feeds lifecycle
//! signals from stdin into the engine and streams frames and events to
//! stdout.

pub mod headless;

// Re-export main entry point
pub use headless::runner::run_headless;
