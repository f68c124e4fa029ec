//! # Generation Housekeeping
//!
//! Chooses which generation (if any) the message worker evicts.

use crate::domain::{invariant_evictable, Generation};

/// The generation to evict: the oldest, and only when the address holds
/// more than `max_generations` and the oldest is at least `stale_age_secs` old.
///
/// At most one generation is chosen per check.
#[must_use]
pub fn pick_stale_generation(
    generations: &[Generation],
    now_secs: u64,
    max_generations: usize,
    stale_age_secs: u64,
) -> Option<Generation> {
    let oldest = generations.iter().min()?;
    invariant_evictable(
        generations.len(),
        oldest.age_secs(now_secs),
        max_generations,
        stale_age_secs,
    )
    .then_some(*oldest)
}
