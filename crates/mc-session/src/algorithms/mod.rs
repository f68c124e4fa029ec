//! # Algorithms Module
//!
//! Pure helpers: deduplication, backoff, housekeeping selection.

pub mod backoff;
pub mod dedup;
pub mod housekeeping;
pub mod message_dedup;

pub use backoff::{backoff_delay, may_retry};
pub use dedup::{collect_rpc_servers, dedup_destinations};
pub use housekeeping::pick_stale_generation;
pub use message_dedup::MessageDeduplicator;
