//! # Reconnect Backoff
//!
//! Exponential backoff between dial attempts, capped.

use std::time::Duration;

/// Delay before dial attempt `attempt` (0-based).
///
/// `min * 2^attempt`, capped at `max`.
#[must_use]
pub fn backoff_delay(attempt: u32, min: Duration, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
    min.checked_mul(factor).unwrap_or(max).min(max)
}

/// Whether another dial attempt is allowed after `attempts` failures.
///
/// `None` means unlimited retries.
#[must_use]
pub fn may_retry(attempts: u32, connect_retries: Option<u32>) -> bool {
    match connect_retries {
        None => true,
        Some(limit) => attempts <= limit,
    }
}
