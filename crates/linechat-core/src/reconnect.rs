//! Reconnect loop
//!
//! Dials the server until a connection is established, the attempt cap (if any) is
//! reached, or the caller cancels. With the default configuration the loop waits a
//! fixed second between attempts and never gives up.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ReconnectConfig};
use crate::connection::Connection;

// ----------------------------------------------------------------------------
// Reconnect Manager
// ----------------------------------------------------------------------------

/// Computes the delay before each retry
#[derive(Debug)]
pub struct ReconnectManager {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectManager {
    pub fn new(config: ReconnectConfig) -> Self {
        let current_delay = config.initial_delay();
        Self {
            config,
            current_delay,
            attempt_count: 0,
        }
    }

    /// Record a failed attempt and return how long to wait before the next one
    ///
    /// Returns `None` once `max_attempts` failures have been recorded.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt_count = self.attempt_count.saturating_add(1);

        if let Some(max_attempts) = self.config.max_attempts {
            if self.attempt_count >= max_attempts {
                return None;
            }
        }

        let delay = self.current_delay;

        let next_delay_millis =
            (self.current_delay.as_millis() as f32 * self.config.backoff_multiplier) as u64;
        self.current_delay =
            Duration::from_millis(next_delay_millis.min(self.config.max_delay_ms));

        Some(delay)
    }

    /// Number of failed attempts recorded so far
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }
}

// ----------------------------------------------------------------------------
// Reconnect Loop
// ----------------------------------------------------------------------------

/// How a run of the reconnect loop ended
#[derive(Debug)]
pub enum ReconnectOutcome {
    /// A connection was established
    Connected(Connection),
    /// The cancel signal fired (or its sender was dropped)
    Cancelled,
    /// `max_attempts` failed attempts were made
    GaveUp { attempts: u32 },
}

/// Dial `config.endpoint()` until it succeeds, is cancelled, or gives up
///
/// Cancellation interrupts both a pending dial and a pending retry wait. The loop
/// treats every dial error as transient.
pub async fn establish(config: &ClientConfig, mut cancel: watch::Receiver<bool>) -> ReconnectOutcome {
    let endpoint = config.endpoint();
    let connect_timeout = config.connect_timeout();
    let mut manager = ReconnectManager::new(config.reconnect.clone());

    loop {
        if *cancel.borrow_and_update() {
            return ReconnectOutcome::Cancelled;
        }

        let attempt = tokio::select! {
            result = Connection::dial(&endpoint, connect_timeout) => result,
            _ = cancelled(&mut cancel) => {
                debug!("Dial to {} cancelled", endpoint);
                return ReconnectOutcome::Cancelled;
            }
        };

        let error = match attempt {
            Ok(connection) => {
                info!(
                    connection = %connection.id(),
                    failed_attempts = manager.attempt_count(),
                    "Connected to {}",
                    endpoint
                );
                return ReconnectOutcome::Connected(connection);
            }
            Err(e) => e,
        };

        let Some(delay) = manager.next_delay() else {
            warn!(
                "Giving up on {} after {} failed attempts: {}",
                endpoint,
                manager.attempt_count(),
                error
            );
            return ReconnectOutcome::GaveUp {
                attempts: manager.attempt_count(),
            };
        };

        info!(
            attempt = manager.attempt_count(),
            "Connection to {} failed ({}), retrying in {}ms",
            endpoint,
            error,
            delay.as_millis()
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancelled(&mut cancel) => {
                debug!("Retry wait for {} cancelled", endpoint);
                return ReconnectOutcome::Cancelled;
            }
        }
    }
}

/// Resolves once the cancel flag is set or its sender is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}
