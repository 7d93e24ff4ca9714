use crate::errors::StreamError;
use crate::events::{EventSender, StreamEvent};
use std::time::Duration;
use tracing::{info, warn};

/// Bounded retries with exponential backoff, applied when the transport fails while a stream
/// is playing or publishing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Attempts made before giving up.  Zero disables reconnecting.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new() -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }

    pub fn disabled() -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: 0,
            ..ReconnectPolicy::new()
        }
    }

    /// Delay before the given attempt (starting at 1), or `None` once attempts are exhausted
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }

        let factor = 1_u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        let delay = self.initial_delay.saturating_mul(factor);
        Some(delay.min(self.max_delay))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::new()
    }
}

/// Decides, after each failure of a session, whether to try again
#[derive(Debug)]
pub(crate) struct Reconnector {
    policy: ReconnectPolicy,
    attempt: u32,
    streaming: bool,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Reconnector {
        Reconnector {
            policy,
            attempt: 0,
            streaming: false,
        }
    }

    /// The server accepted `play` or `publish`.  Failures from now on are retried, and the
    /// attempt count starts over.
    pub fn stream_started(&mut self) {
        self.streaming = true;
        self.attempt = 0;
    }

    pub fn is_reconnect(&self) -> bool {
        self.attempt > 0
    }

    /// Raises the events describing the failure and returns how long to wait before the next
    /// attempt, or the terminal event to end the session with.
    pub fn on_error(&mut self, error: &StreamError, events: &EventSender) -> Result<Duration, StreamEvent> {
        if error.is_timeout() {
            events.send(StreamEvent::NetworkTimeout);
        }

        if !self.streaming {
            warn!(%error, "Session failed");
            return Err(StreamEvent::Failed {
                reason: error.to_string(),
            });
        }

        if !error.is_retryable() {
            warn!(%error, "Stream aborted");
            return Err(StreamEvent::Aborted {
                reason: error.to_string(),
            });
        }

        self.attempt += 1;
        match self.policy.delay_for(self.attempt) {
            Some(delay) => {
                info!(%error, attempt = self.attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");
                events.send(StreamEvent::Reconnecting {
                    attempt: self.attempt,
                    delay,
                });

                Ok(delay)
            }

            None => {
                warn!(%error, attempts = self.attempt - 1, "Giving up on reconnecting");
                Err(StreamEvent::Disconnected {
                    reason: error.to_string(),
                })
            }
        }
    }
}
