//! Session configuration.
//!
//! All types are `Deserialize` so a host can load them from the same JSON
//! blob it uses for the rest of its settings. Defaults match the header names
//! and polling cadence the parent server expects.

use std::time::Duration;

use serde::Deserialize;

/// Header carrying the rotating authentication token.
pub const DEFAULT_AUTH_HEADER: &str = "x-auth-token";

/// Header carrying the handshake-derived anti-forgery token.
pub const DEFAULT_ANTI_FORGERY_HEADER: &str = "x-anti-forgery-token";

/// Interval between readiness polls (one display frame at 60 Hz).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Transport header names touched by the interceptors.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HeaderNames {
    /// Authentication token header (request and response)
    pub auth: String,
    /// Anti-forgery token header (request only)
    pub anti_forgery: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            auth: DEFAULT_AUTH_HEADER.to_string(),
            anti_forgery: DEFAULT_ANTI_FORGERY_HEADER.to_string(),
        }
    }
}

/// Readiness gate configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Delay between polls when the gate drives itself
    /// ([`crate::await_primitive`])
    pub frame_interval: Duration,
    /// Give up after this long. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { frame_interval: DEFAULT_FRAME_INTERVAL, timeout: None }
    }
}

/// Configuration for one embedded session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Origin the session message must come from
    pub expected_origin: String,
    /// Header names used by both interceptors
    #[serde(default)]
    pub headers: HeaderNames,
    /// Readiness gate settings
    #[serde(default)]
    pub gate: GateConfig,
}

impl SessionConfig {
    /// Configuration accepting messages from `expected_origin` only.
    pub fn new(expected_origin: impl Into<String>) -> Self {
        Self {
            expected_origin: expected_origin.into(),
            headers: HeaderNames::default(),
            gate: GateConfig::default(),
        }
    }

    /// Derive the expected origin from the embedding page's referrer.
    ///
    /// The referrer carries a trailing `/` that an origin never has.
    pub fn from_referrer(referrer: &str) -> Self {
        Self::new(referrer.strip_suffix('/').unwrap_or(referrer))
    }

    /// Replace the gate settings.
    #[must_use]
    pub fn with_gate(mut self, gate: GateConfig) -> Self {
        self.gate = gate;
        self
    }
}
