//! Configuration types for sunface
//!
//! Defines `Settings` (the `config.toml` root) and one sub-table per
//! component. Every field has a serde default, so a partial or empty file
//! is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sunface_link::{Backoff, LoopbackConfig, SyncPolicy};

use crate::clock::MIN_INTERACTIVE_INTERVAL;

/// Upper bound for `[sync] request_timeout_ms`
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Application settings (config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub clock: ClockSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub peer: PeerSettings,
}

/// Render clock cadence
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClockSettings {
    /// Tick interval while interactive, in milliseconds (minimum 100)
    #[serde(default = "default_interactive_interval_ms")]
    pub interactive_interval_ms: u64,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            interactive_interval_ms: default_interactive_interval_ms(),
        }
    }
}

impl ClockSettings {
    /// Interactive interval, clamped to the supported minimum
    pub fn interactive_interval(&self) -> Duration {
        Duration::from_millis(self.interactive_interval_ms).max(MIN_INTERACTIVE_INTERVAL)
    }
}

fn default_interactive_interval_ms() -> u64 {
    500
}

/// Reconnect pacing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionSettings {
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl SessionSettings {
    pub fn backoff(&self) -> Backoff {
        let initial = Duration::from_millis(self.initial_backoff_ms);
        Backoff {
            initial,
            max: Duration::from_millis(self.max_backoff_ms).max(initial),
        }
    }
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

/// Fetch timing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SyncSettings {
    /// In-flight requests older than this count as failed
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Minimum wait before resyncing after a failed fetch
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,

    /// Resync once data is this old
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            retry_interval_secs: default_retry_interval_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl SyncSettings {
    pub fn policy(&self) -> SyncPolicy {
        SyncPolicy {
            request_timeout: Duration::from_millis(self.request_timeout_ms)
                .min(MAX_REQUEST_TIMEOUT),
            retry_interval: Duration::from_secs(self.retry_interval_secs),
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_retry_interval_secs() -> u64 {
    30
}

fn default_refresh_interval_secs() -> u64 {
    30 * 60
}

/// Where the weather comes from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PeerSettings {
    /// `host:port` of a line-protocol peer. Unset = in-process loopback peer.
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Loopback only: upper bound of the simulated reply latency
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,

    /// Loopback only: push interval in seconds (0 = no pushes)
    #[serde(default)]
    pub push_interval_secs: u64,
}

impl Default for PeerSettings {
    fn default() -> Self {
        Self {
            address: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            max_latency_ms: default_max_latency_ms(),
            push_interval_secs: 0,
        }
    }
}

impl PeerSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn loopback(&self) -> LoopbackConfig {
        LoopbackConfig {
            max_latency: Duration::from_millis(self.max_latency_ms),
            push_interval: (self.push_interval_secs > 0)
                .then(|| Duration::from_secs(self.push_interval_secs)),
            ..LoopbackConfig::default()
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_max_latency_ms() -> u64 {
    800
}
