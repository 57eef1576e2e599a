//! Client configuration
//!
//! Durations are stored as whole milliseconds so the structs round-trip cleanly
//! through TOML configuration files.

use core::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ChatResult};

/// Default chat server host
pub const DEFAULT_HOST: &str = "localhost";
/// Default chat server port
pub const DEFAULT_PORT: u16 = 8688;
/// Default delay between connection attempts
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

// ----------------------------------------------------------------------------
// Endpoint
// ----------------------------------------------------------------------------

/// Remote host and port of the chat server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ----------------------------------------------------------------------------
// Reconnect Configuration
// ----------------------------------------------------------------------------

/// Retry schedule used by the reconnect loop
///
/// The defaults give a fixed one-second delay with no attempt limit. Setting a
/// multiplier above 1.0 turns it into exponential backoff capped at `max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay after the first failed attempt
    pub initial_delay_ms: u64,
    /// Upper bound for the delay between attempts
    pub max_delay_ms: u64,
    /// Growth factor applied after each failed attempt
    pub backoff_multiplier: f32,
    /// Maximum number of failed attempts before giving up (None = unlimited)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_DELAY_MS,
            backoff_multiplier: 1.0,
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    /// Fixed delay between attempts, retrying forever
    pub fn fixed(delay: Duration) -> Self {
        let millis = delay.as_millis() as u64;
        Self {
            initial_delay_ms: millis,
            max_delay_ms: millis,
            backoff_multiplier: 1.0,
            max_attempts: None,
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> ChatResult<()> {
        if self.initial_delay_ms == 0 {
            return Err(ChatError::InvalidConfig(
                "reconnect initial_delay_ms must be positive".to_string(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ChatError::InvalidConfig(format!(
                "reconnect max_delay_ms ({}) is below initial_delay_ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ChatError::InvalidConfig(format!(
                "reconnect backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_attempts == Some(0) {
            return Err(ChatError::InvalidConfig(
                "reconnect max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Client Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for a chat session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Chat server host name or address
    pub host: String,
    /// Chat server TCP port
    pub port: u16,
    /// Optional limit on a single dial attempt; unset means wait for the OS
    pub connect_timeout_ms: Option<u64>,
    /// Retry schedule for the reconnect loop
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Configuration for a specific server, all other settings default
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> ChatResult<()> {
        if self.host.trim().is_empty() {
            return Err(ChatError::InvalidConfig("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ChatError::InvalidConfig("port must not be 0".to_string()));
        }
        if self.connect_timeout_ms == Some(0) {
            return Err(ChatError::InvalidConfig(
                "connect_timeout_ms must be positive when set".to_string(),
            ));
        }
        self.reconnect.validate()
    }
}
