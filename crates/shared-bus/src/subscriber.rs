//! # Event Subscriber
//!
//! Defines the consumer side of the sink.

use crate::events::{ClientEvent, EventFilter};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The consumer was detached or replaced.
    #[error("Consumer detached from sink")]
    Closed,
}

/// A consumer handle for receiving events.
///
/// Ends (returns `None`) once the sink replaces or detaches it and the
/// buffered events are drained.
pub struct Subscription {
    /// Consumer id assigned by the sink.
    id: u64,

    /// The receiving half of the consumer channel.
    receiver: mpsc::Receiver<ClientEvent>,

    /// Filter for this subscription.
    filter: EventFilter,
}

impl Subscription {
    /// Create a new subscription.
    pub(crate) fn new(id: u64, receiver: mpsc::Receiver<ClientEvent>, filter: EventFilter) -> Self {
        Self {
            id,
            receiver,
            filter,
        }
    }

    /// Receive the next event that matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next matching event
    /// - `None` - The consumer was detached or replaced
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }

    /// Try to receive the next event without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(event))` - An event was available and matched
    /// - `Ok(None)` - No event available (would block)
    /// - `Err(SubscriptionError::Closed)` - The consumer was detached
    pub fn try_recv(&mut self) -> Result<Option<ClientEvent>, SubscriptionError> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(mpsc::error::TryRecvError::Empty) => return Ok(None),
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    return Err(SubscriptionError::Closed)
                }
            };

            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
    }

    /// Get the consumer id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(consumer = self.id, "Subscription dropped");
    }
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct EventStream {
    subscription: Subscription,
}

impl EventStream {
    /// Create a new event stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    /// Get the filter for this stream.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        self.subscription.filter()
    }
}

impl Stream for EventStream {
    type Item = ClientEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match self.subscription.receiver.poll_recv(cx) {
                Poll::Ready(Some(event)) => {
                    if self.subscription.filter.matches(&event) {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
