//! # Adapters Module
//!
//! In-process implementations of the outbound ports, used by the bridge
//! binary and the test suites.

pub mod account;
pub mod memory_chain;
pub mod memory_network;
pub mod resolver;

pub use account::{Ed25519Account, Ed25519AccountFactory, SEED_LENGTH};
pub use memory_chain::MemoryChain;
pub use memory_network::MemoryNetwork;
pub use resolver::{StaticResolver, StaticResolverFactory};

use crate::ports::SessionPorts;
use std::sync::Arc;
use std::time::Duration;

/// In-memory network plus chain, wired as [`SessionPorts`].
#[derive(Clone)]
pub struct InMemoryBackend {
    /// Node network.
    pub network: MemoryNetwork,
    /// Chain RPC.
    pub chain: Arc<MemoryChain>,
}

impl InMemoryBackend {
    /// Backend with `node_count` nodes and the given chain propagation delay.
    pub fn new(node_count: usize, propagation_delay: Duration) -> Self {
        Self {
            network: MemoryNetwork::new(node_count),
            chain: Arc::new(MemoryChain::new(propagation_delay)),
        }
    }

    /// Ports backed by this network and chain.
    pub fn ports(&self) -> SessionPorts {
        SessionPorts {
            connector: Arc::new(self.network.clone()),
            accounts: Arc::new(Ed25519AccountFactory),
            chain: self.chain.clone(),
            resolvers: Arc::new(StaticResolverFactory),
        }
    }
}
