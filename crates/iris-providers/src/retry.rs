//! Retry policy shared by command-bridge backends.
//!
//! One policy object lives on the factory and is cloned into every backend it
//! builds; no other layer in the system retries.

use std::thread;
use std::time::Duration;

use crate::capability::ProviderError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 60_000;

/// Public struct `RetryPolicy` used across Iris components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps between attempts. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    /// Runs `operation` until it succeeds or `max_attempts` is exhausted,
    /// sleeping with exponential backoff between attempts. Missing-tool
    /// errors are terminal: retrying cannot install a binary.
    pub fn run<T>(
        &self,
        mut operation: impl FnMut() -> Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        let attempts = self.max_attempts.max(1);
        let mut delay = self.initial_delay;
        let mut last_error = None;
        for attempt in 1..=attempts {
            match operation() {
                Ok(value) => return Ok(value),
                Err(error @ ProviderError::ToolMissing { .. }) => return Err(error),
                Err(error) => {
                    tracing::debug!(attempt, %error, "provider operation failed");
                    last_error = Some(error);
                }
            }
            if attempt < attempts && !delay.is_zero() {
                thread::sleep(delay);
                let next_ms = (delay.as_millis() as f64 * self.backoff_factor) as u64;
                delay = Duration::from_millis(next_ms.min(MAX_DELAY_MS));
            }
        }
        Err(last_error.unwrap_or(ProviderError::EmptyCapture))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn functional_transient_failure_is_retried_to_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let result = policy.run(|| {
            let seen = attempts.fetch_add(1, Ordering::SeqCst);
            if seen < 2 {
                Err(ProviderError::EmptyCapture)
            } else {
                Ok(seen)
            }
        });
        assert_eq!(result.expect("third attempt succeeds"), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn functional_persistent_failure_stops_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let result: Result<(), _> = policy.run(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::EmptyCapture)
        });
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn regression_missing_tool_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(5);
        let result: Result<(), _> = policy.run(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::ToolMissing { tool: "xdotool" })
        });
        assert!(matches!(result, Err(ProviderError::ToolMissing { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unit_zero_attempts_still_runs_once() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(0);
        let _: Result<(), _> = policy.run(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::EmptyCapture)
        });
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
