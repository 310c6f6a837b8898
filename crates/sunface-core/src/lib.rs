//! # sunface-core - Core Domain Types
//!
//! Foundation crate for sunface. Provides the watch face domain types, the
//! error enum, the non-fatal fault taxonomy, peer events, and logging setup.
//!
//! This crate has **zero internal dependencies**.
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`PowerMode`] - Interactive or ambient low-power display
//! - [`WeatherSnapshot`], [`WeatherIcon`] - Latest accepted weather data
//! - [`SessionState`] - Peer connectivity state
//! - [`TickSpec`], [`TickReason`] - Render invitations from the clock
//! - [`RenderFrame`] - The value handed to the external renderer
//!
//! ### Events (`events`)
//! - [`PeerEvent`] - Asynchronous completions from a peer transport
//! - [`FetchOutcome`] - Result of one fetch request
//!
//! ### Faults (`fault`)
//! - [`Fault`] - Connection, stale-response, fetch and render faults
//! - [`Diagnostics`] - Counters for observed faults
//!
//! ### Error Handling (`error`)
//! - [`Error`], [`Result`]

pub mod error;
pub mod events;
pub mod fault;
pub mod logging;
pub mod types;

/// Prelude for common imports used throughout all sunface crates
pub mod prelude {
    pub use super::error::{Error, Result};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

pub use error::{Error, Result};
pub use events::{FetchOutcome, PeerEvent};
pub use fault::{Diagnostics, Fault};
pub use types::{
    PowerMode, RenderFrame, RequestId, SessionState, TickReason, TickSpec, WeatherIcon,
    WeatherSnapshot,
};
