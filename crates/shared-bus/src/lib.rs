//! # Shared Bus - Client Event Sink
//!
//! Carries asynchronous client events (connect, message, error) from the
//! session core to exactly one external consumer.
//!
//! ## Delivery Model
//!
//! ```text
//!  generation A pump ──┐
//!                      │ publish()
//!  generation B pump ──┼──────────→ ┌────────────────┐   recv()   ┌──────────┐
//!                      │            │ SingleSlotSink │ ─────────→ │ consumer │
//!  generation C pump ──┘            └────────────────┘            └──────────┘
//! ```
//!
//! - **Single slot:** at most one consumer is attached; attaching replaces
//!   the previous consumer.
//! - **Drop on no consumer:** events published while nothing is attached are
//!   discarded and counted, never buffered or replayed.
//! - **Best effort:** a consumer that falls `capacity` events behind loses
//!   the overflow.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{
    ClientEvent, ClientInfo, ConnectEvent, ErrorEvent, EventFilter, EventKind, EventName,
    MessageData, MessageEvent, NodeInfo,
};
pub use publisher::{EventPublisher, SingleSlotSink};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events buffered for the attached consumer before overflow drops.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
