//! # Domain Invariants
//!
//! Rules that must always hold for clients and generations.

use super::errors::SessionError;

/// Default number of subclients per client.
pub const DEFAULT_SUBCLIENTS: usize = 3;

/// Generations kept under one address before the oldest becomes evictable.
pub const MAX_GENERATIONS: usize = 3;

/// Minimum age (seconds) of a generation before housekeeping may evict it.
pub const STALE_GENERATION_AGE_SECS: u64 = 60 * 60;

/// Invariant: a client owns at least one subclient.
pub fn invariant_subclient_count(count: usize) -> Result<(), SessionError> {
    if count == 0 {
        return Err(SessionError::InvalidParams(
            "numSubClients must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Invariant: a send has at least one destination.
pub fn invariant_destinations(dests: &[String]) -> Result<(), SessionError> {
    if dests.is_empty() {
        return Err(SessionError::InvalidParams("dests is empty".to_string()));
    }
    Ok(())
}

/// Invariant: the oldest generation is evicted only when the address holds
/// more than `max_generations` and the oldest is at least `stale_age_secs` old.
#[must_use]
pub fn invariant_evictable(
    generation_count: usize,
    oldest_age_secs: u64,
    max_generations: usize,
    stale_age_secs: u64,
) -> bool {
    generation_count > max_generations && oldest_age_secs >= stale_age_secs
}
