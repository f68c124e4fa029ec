//! # Inbound Message Deduplication
//!
//! Every subclient of a peer carries a copy of the same message; only the
//! first copy of a given id is delivered. The cache is bounded (LRU).

use crate::domain::MessageId;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Fallback cache size when configured as zero.
const MIN_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(16) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

/// Bounded set of recently seen message ids.
pub struct MessageDeduplicator {
    seen: Mutex<LruCache<MessageId, ()>>,
}

impl MessageDeduplicator {
    /// Create a deduplicator remembering `capacity` ids.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(MIN_CACHE_SIZE);
        Self {
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Record `id`; returns `true` the first time it is seen.
    pub fn first_seen(&self, id: MessageId) -> bool {
        self.seen.lock().put(id, ()).is_none()
    }

    /// Number of remembered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    /// Whether no id is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
