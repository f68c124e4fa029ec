//! # Event Publisher
//!
//! Defines the publishing side of the sink.

use crate::events::{ClientEvent, EventFilter};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Trait for publishing events to the sink.
///
/// Publishing never blocks: delivery is best effort.
pub trait EventPublisher: Send + Sync {
    /// Publish an event.
    ///
    /// # Returns
    ///
    /// `true` if the event was handed to an attached consumer.
    fn publish(&self, event: ClientEvent) -> bool;

    /// Get the total number of events published (delivered or not).
    fn events_published(&self) -> u64;

    /// Get the number of events dropped (no consumer, or consumer full).
    fn events_dropped(&self) -> u64;
}

/// The attached consumer.
struct Slot {
    /// Consumer id, used to avoid clearing a newer consumer.
    id: u64,
    /// Channel to the consumer.
    sender: mpsc::Sender<ClientEvent>,
}

/// Sink with room for exactly one consumer.
///
/// Attaching a new consumer replaces (and thereby closes) the previous one.
pub struct SingleSlotSink {
    /// Current consumer, if any.
    slot: RwLock<Option<Slot>>,

    /// Id handed to the next consumer.
    next_consumer_id: AtomicU64,

    /// Total events published.
    events_published: AtomicU64,

    /// Total events dropped.
    events_dropped: AtomicU64,

    /// Per-consumer buffer capacity.
    capacity: usize,
}

impl SingleSlotSink {
    /// Create a new sink with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new sink with the specified per-consumer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slot: RwLock::new(None),
            next_consumer_id: AtomicU64::new(1),
            events_published: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Attach a consumer, replacing any existing one.
    #[must_use]
    pub fn attach(&self, filter: EventFilter) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = self.next_consumer_id.fetch_add(1, Ordering::Relaxed);

        let previous = self.slot.write().replace(Slot { id, sender });
        if let Some(previous) = previous {
            debug!(
                previous = previous.id,
                consumer = id,
                "Replacing attached consumer"
            );
        } else {
            debug!(consumer = id, "Consumer attached");
        }

        Subscription::new(id, receiver, filter)
    }

    /// Attach a consumer and wrap it as a stream.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.attach(filter))
    }

    /// Detach the current consumer, if any.
    pub fn detach(&self) {
        if let Some(slot) = self.slot.write().take() {
            debug!(consumer = slot.id, "Consumer detached");
        }
    }

    /// Whether a consumer is currently attached.
    #[must_use]
    pub fn has_consumer(&self) -> bool {
        self.slot
            .read()
            .as_ref()
            .is_some_and(|slot| !slot.sender.is_closed())
    }

    /// Get the per-consumer capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear the slot if it still holds consumer `id`.
    fn clear_if_current(&self, id: u64) {
        let mut slot = self.slot.write();
        if slot.as_ref().is_some_and(|s| s.id == id) {
            *slot = None;
            debug!(consumer = id, "Consumer went away, slot cleared");
        }
    }
}

impl Default for SingleSlotSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for SingleSlotSink {
    fn publish(&self, event: ClientEvent) -> bool {
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let target = self
            .slot
            .read()
            .as_ref()
            .map(|slot| (slot.id, slot.sender.clone()));

        let Some((id, sender)) = target else {
            self.events_dropped.fetch_add(1, Ordering::Relaxed);
            debug!(
                kind = ?event.kind(),
                address = %event.address(),
                "Event dropped (no consumer)"
            );
            return false;
        };

        match sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.events_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    kind = ?event.kind(),
                    address = %event.address(),
                    consumer = id,
                    "Event dropped (consumer full)"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.events_dropped.fetch_add(1, Ordering::Relaxed);
                self.clear_if_current(id);
                debug!(
                    kind = ?event.kind(),
                    address = %event.address(),
                    "Event dropped (consumer closed)"
                );
                false
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }
}
