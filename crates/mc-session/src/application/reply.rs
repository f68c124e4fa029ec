//! Pending reply store.
//!
//! Maps the id of a sent message to the caller waiting for its reply.
//!
//! Flow:
//! 1. `send` registers the outgoing message id and gets a [`ReplyWaiter`]
//! 2. The message is transmitted
//! 3. A subclient reader sees an inbound message whose `reply_to` matches
//!    and calls `complete()`
//! 4. The caller awaits the waiter or times out (the entry is discarded)

use crate::domain::{InboundMessage, MessageId, SessionError};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Statistics for the pending reply store
#[derive(Debug, Default)]
pub struct ReplyStats {
    /// Total waiters registered
    pub total_registered: AtomicU64,
    /// Total replies routed to a waiter
    pub total_completed: AtomicU64,
    /// Total waiters that gave up
    pub total_timeouts: AtomicU64,
}

/// Pending reply store.
pub struct PendingReplies {
    pending: DashMap<MessageId, oneshot::Sender<InboundMessage>>,
    stats: ReplyStats,
}

impl PendingReplies {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: ReplyStats::default(),
        }
    }

    /// Register a waiter for replies to `message_id`.
    pub fn register(self: &Arc<Self>, message_id: MessageId) -> ReplyWaiter {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(message_id, tx);
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        debug!(message_id = %message_id, "Registered pending reply");

        ReplyWaiter {
            message_id,
            receiver: rx,
            store: Arc::clone(self),
        }
    }

    /// Route `message` to the waiter for `reply_to`.
    ///
    /// Returns the message back when nobody waits for it.
    pub fn complete(
        &self,
        reply_to: MessageId,
        message: InboundMessage,
    ) -> Result<(), InboundMessage> {
        let Some((_, sender)) = self.pending.remove(&reply_to) else {
            return Err(message);
        };
        match sender.send(message) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(reply_to = %reply_to, "Routed reply to waiter");
                Ok(())
            }
            Err(message) => Err(message),
        }
    }

    /// Drop a waiter without completing it.
    pub fn remove(&self, message_id: &MessageId) -> bool {
        self.pending.remove(message_id).is_some()
    }

    /// Fail every waiter (their receivers see a closed channel).
    pub fn clear(&self) {
        let count = self.pending.len();
        self.pending.clear();
        if count > 0 {
            debug!(count, "Dropped pending reply waiters");
        }
    }

    /// Number of waiters.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Get statistics
    pub fn stats(&self) -> &ReplyStats {
        &self.stats
    }
}

impl Default for PendingReplies {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle awaiting the reply to one sent message.
pub struct ReplyWaiter {
    message_id: MessageId,
    receiver: oneshot::Receiver<InboundMessage>,
    store: Arc<PendingReplies>,
}

impl fmt::Debug for ReplyWaiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyWaiter")
            .field("message_id", &self.message_id)
            .finish_non_exhaustive()
    }
}

impl ReplyWaiter {
    /// Id of the sent message.
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// Wait up to `timeout` for the reply.
    ///
    /// `Timeout("wait reply timeout")` on expiry, `StreamTerminated` when the
    /// client closed first.
    pub async fn wait(self, timeout: Duration) -> Result<InboundMessage, SessionError> {
        let Self {
            message_id,
            receiver,
            store,
        } = self;

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(SessionError::StreamTerminated),
            Err(_) => {
                store.remove(&message_id);
                store.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                debug!(message_id = %message_id, "Reply wait timed out");
                Err(SessionError::Timeout("wait reply timeout".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageType;

    fn reply(reply_to: MessageId) -> InboundMessage {
        InboundMessage {
            src: "peer".to_string(),
            data: b"pong".to_vec(),
            message_type: MessageType::Text,
            encrypted: true,
            message_id: MessageId::random(),
            reply_to: Some(reply_to),
            no_reply: true,
        }
    }

    #[tokio::test]
    async fn test_register_and_complete() {
        let store = Arc::new(PendingReplies::new());
        let id = MessageId::random();
        let waiter = store.register(id);

        assert_eq!(store.pending_count(), 1);
        assert!(store.complete(id, reply(id)).is_ok());

        let msg = waiter.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(msg.data, b"pong");
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_complete_unknown_returns_message() {
        let store = PendingReplies::new();
        let id = MessageId::random();
        assert!(store.complete(id, reply(id)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_discards_entry() {
        let store = Arc::new(PendingReplies::new());
        let waiter = store.register(MessageId::random());

        let err = waiter.wait(Duration::from_millis(100)).await.unwrap_err();
        assert_eq!(err, SessionError::Timeout("wait reply timeout".to_string()));
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.stats().total_timeouts.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_clear_fails_waiters() {
        let store = Arc::new(PendingReplies::new());
        let waiter = store.register(MessageId::random());
        store.clear();

        let err = waiter.wait(Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err, SessionError::StreamTerminated);
    }

    #[test]
    fn test_waiter_debug_names_message_id() {
        let store = Arc::new(PendingReplies::new());
        let id = MessageId::from([1, 2, 3, 4, 5, 6, 7, 8]);
        let waiter = store.register(id);

        let rendered = format!("{:?}", Ok::<_, SessionError>(Some(waiter)));
        assert!(rendered.contains("ReplyWaiter"));
        assert!(rendered.contains("message_id"));
    }
}
