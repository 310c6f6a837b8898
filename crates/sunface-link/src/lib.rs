//! # sunface-link - Peer Session and Weather Sync
//!
//! Everything that talks to the paired peer: the connectivity state machine,
//! the ordering rules for weather fetches and pushes, the wire protocol, and
//! the transports that carry it.
//!
//! Depends on [`sunface_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Session
//! - [`Session`] - Connect / suspend / fail / reconnect lifecycle
//! - [`Backoff`] - Reconnect pacing after failures
//!
//! ### Weather Sync
//! - [`WeatherSync`] - Issues requests, applies responses and pushes in order
//! - [`SyncPolicy`], [`SyncOutcome`]
//!
//! ### Transports
//! - [`PeerTransport`] - Non-blocking connect / request / disconnect seam
//! - [`LineTransport`] - Newline-delimited JSON over TCP
//! - [`LoopbackPeer`] - In-process simulated peer
//!
//! ### Protocol Parsing
//! - [`parse_peer_message()`] - Parse one inbound line from the peer
//! - [`encode_request()`] - Build a fetch request line

pub mod loopback;
pub mod protocol;
pub mod session;
pub mod sync;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod transport;

pub use loopback::{sample_snapshot, LoopbackConfig, LoopbackPeer};
pub use protocol::{
    encode_push, encode_request, encode_response, parse_peer_message, parse_request,
    PeerMessage,
};
pub use session::{Backoff, Session};
pub use sync::{SyncOutcome, SyncPolicy, WeatherSync};
pub use transport::{run_link, LineTransport, PeerEventSender, PeerTransport};
