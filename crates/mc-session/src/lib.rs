//! # MC Session
//!
//! Multi-subclient session core: one logical identity fanned out over
//! several node connections, with deduplicated inbound traffic, reply
//! routing, background recovery and a single push-event sink.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Multiplex sends over every connected subclient
//! - Merge and deduplicate inbound messages by message id
//! - Keep generations of a client per address and evict stale ones
//! - Turn connect and message activity into events for one consumer
//!
//! ## Event Flow
//!
//! ```text
//! SessionApi ──→ SessionService ──→ SessionRegistry ──→ MultiClient ──→ Subclient(s)
//!                      │                                      │
//!                      └── EventPump (per generation) ←───────┘
//!                                │
//!                                └──→ SingleSlotSink (shared-bus)
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! mc-session/
//! ├── domain/          # Identity, generations, message types, errors
//! ├── algorithms/      # Dedup, backoff, housekeeping selection
//! ├── ports/           # SessionApi (inbound) + network/chain/account (outbound)
//! ├── application/     # MultiClient, registry, event pump, SessionService
//! ├── adapters/        # In-memory network and chain, ed25519 accounts
//! └── config.rs        # ClientConfig, SessionServiceConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{
    Ed25519Account, Ed25519AccountFactory, InMemoryBackend, MemoryChain, MemoryNetwork,
    StaticResolverFactory,
};
pub use algorithms::{
    backoff_delay, collect_rpc_servers, dedup_destinations, may_retry, pick_stale_generation,
    MessageDeduplicator,
};
pub use application::{
    EventPump, MultiClient, PendingReplies, ReplyWaiter, SessionRegistry, SessionService,
    Subclient,
};
pub use config::{
    ClientConfig, MessageConfig, PublishConfig, ResolverConfig, SessionServiceConfig,
    TransactionConfig, DEFAULT_SEED_RPC_SERVER,
};
pub use domain::{
    add_identifier, make_address, remove_identifier, unix_now, Generation, Identity,
    InboundMessage, MessageId, MessageType, NodeDescriptor, SessionError, Subscribers,
    SubscribersQuery, SubscriptionInfo, DEFAULT_SUBCLIENTS, MAX_GENERATIONS,
    ORIGINAL_CLIENT_INDEX, STALE_GENERATION_AGE_SECS,
};
pub use ports::{
    Account, AccountFactory, ChainClient, NodeConnection, NodeConnector, Resolver,
    ResolverFactory, SessionApi, SessionPorts,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
