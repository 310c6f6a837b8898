//! Core domain types for the watch face

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Logical identifier attached to each weather fetch request.
///
/// Issued from a per-sync monotonic counter, so a larger id always means a
/// more recently issued request.
pub type RequestId = u64;

// ─────────────────────────────────────────────────────────────────────────────
// Power mode
// ─────────────────────────────────────────────────────────────────────────────

/// Display power mode, set by the host environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerMode {
    #[default]
    Interactive,
    AmbientLowPower,
}

impl PowerMode {
    /// Map the host's `in_ambient` flag to a mode
    pub fn from_ambient(in_ambient: bool) -> Self {
        if in_ambient {
            PowerMode::AmbientLowPower
        } else {
            PowerMode::Interactive
        }
    }

    pub fn is_ambient(&self) -> bool {
        matches!(self, PowerMode::AmbientLowPower)
    }
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerMode::Interactive => write!(f, "interactive"),
            PowerMode::AmbientLowPower => write!(f, "ambient"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Weather data
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque encoded weather icon image.
///
/// Cheap to clone; serialized as base64 on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct WeatherIcon(Arc<[u8]>);

impl WeatherIcon {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for WeatherIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeatherIcon({} bytes)", self.0.len())
    }
}

impl Serialize for WeatherIcon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for WeatherIcon {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map(WeatherIcon::new)
            .map_err(serde::de::Error::custom)
    }
}

/// The most recently accepted weather data.
///
/// Every field may be unset until the first successful fetch. The same shape
/// is used for partial payloads (a temperature-only or icon-only update),
/// where unset means "not carried by this update".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<WeatherIcon>,
}

impl WeatherSnapshot {
    /// Snapshot carrying only temperatures
    pub fn temperatures(high: f64, low: f64) -> Self {
        Self {
            high: Some(high),
            low: Some(low),
            icon: None,
        }
    }

    /// Snapshot carrying only an icon
    pub fn icon_only(icon: WeatherIcon) -> Self {
        Self {
            high: None,
            low: None,
            icon: Some(icon),
        }
    }

    pub fn with_icon(mut self, icon: WeatherIcon) -> Self {
        self.icon = Some(icon);
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.high.is_none() && self.low.is_none() && self.icon.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session state
// ─────────────────────────────────────────────────────────────────────────────

/// Connectivity state of the peer session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Suspended,
    Failed {
        reason: String,
    },
}

impl SessionState {
    /// Whether fetch requests may be issued
    pub fn is_usable(&self) -> bool {
        matches!(self, SessionState::Connected)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Suspended => "suspended",
            SessionState::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Failed { reason } => write!(f, "failed ({})", reason),
            other => f.write_str(other.label()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ticks and frames
// ─────────────────────────────────────────────────────────────────────────────

/// Why a tick was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickReason {
    Periodic,
    TimezoneChanged,
    ModeChanged,
}

/// A scheduled invitation to re-render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickSpec {
    /// Cadence in effect when the tick was raised
    pub interval_millis: u64,
    pub reason: TickReason,
}

/// Everything the renderer needs for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub time: DateTime<FixedOffset>,
    pub snapshot: WeatherSnapshot,
    pub power_mode: PowerMode,
}
