//! # Outbound Ports
//!
//! Traits for external collaborators: node connections, accounts, the chain
//! RPC, and resolvers.

use crate::config::{ResolverConfig, TransactionConfig};
use crate::domain::{
    InboundMessage, NodeDescriptor, OutboundPacket, SessionError, Subscribers, SubscribersQuery,
    SubscriptionInfo,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Dials one node on behalf of one subclient - outbound port.
#[async_trait]
pub trait NodeConnector: Send + Sync {
    /// Connect `client_address` to a node discovered via `seed_rpc_servers`.
    async fn connect(
        &self,
        seed_rpc_servers: &[String],
        client_address: &str,
        public_key: &[u8],
    ) -> Result<Arc<dyn NodeConnection>, SessionError>;
}

/// An open connection between one subclient and one node - outbound port.
#[async_trait]
pub trait NodeConnection: Send + Sync {
    /// Node this connection is attached to.
    fn node(&self) -> NodeDescriptor;

    /// Transmit a packet.
    async fn send(&self, packet: OutboundPacket) -> Result<(), SessionError>;

    /// Next inbound message.
    ///
    /// Returns `Ok(None)` when the connection ended or `cancel` fired.
    async fn next_message(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<InboundMessage>, SessionError>;

    /// Close the connection. Idempotent.
    async fn close(&self);

    /// Whether the connection is still usable.
    fn is_open(&self) -> bool;
}

/// A keypair - outbound port.
pub trait Account: Send + Sync {
    /// Public key bytes.
    fn public_key(&self) -> Vec<u8>;

    /// Seed the keypair was derived from.
    fn seed(&self) -> Vec<u8>;

    /// Wallet address used for chain nonces.
    fn wallet_address(&self) -> String;

    /// Sign a message.
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

/// Builds accounts from seeds - outbound port.
pub trait AccountFactory: Send + Sync {
    /// Account for `seed`; `AccountCreateFailed` when the seed is unusable.
    fn from_seed(&self, seed: &[u8]) -> Result<Arc<dyn Account>, SessionError>;
}

/// Chain RPC capability - outbound port.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current block height.
    async fn height(&self) -> Result<u64, SessionError>;

    /// Next nonce of `address`, counting pending transactions when `tx_pool`.
    async fn nonce(&self, address: &str, tx_pool: bool) -> Result<u64, SessionError>;

    /// Submit a subscribe transaction; returns the transaction hash.
    async fn subscribe(
        &self,
        account: &dyn Account,
        identifier: &str,
        topic: &str,
        duration: u64,
        meta: &str,
        tx: &TransactionConfig,
    ) -> Result<String, SessionError>;

    /// Submit an unsubscribe transaction; returns the transaction hash.
    async fn unsubscribe(
        &self,
        account: &dyn Account,
        identifier: &str,
        topic: &str,
        tx: &TransactionConfig,
    ) -> Result<String, SessionError>;

    /// Subscribers of a topic.
    async fn subscribers(&self, query: &SubscribersQuery) -> Result<Subscribers, SessionError>;

    /// Number of subscribers of a topic.
    async fn subscribers_count(
        &self,
        topic: &str,
        subscriber_hash_prefix: &[u8],
    ) -> Result<u64, SessionError>;

    /// One subscription record.
    async fn subscription(
        &self,
        topic: &str,
        subscriber: &str,
    ) -> Result<SubscriptionInfo, SessionError>;
}

/// Contributes extra seed RPC endpoints - outbound port.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolver name (for logging).
    fn name(&self) -> &str;

    /// Seed endpoints known to this resolver.
    async fn resolve_seeds(&self) -> Result<Vec<String>, SessionError>;
}

/// Builds resolvers from config entries - outbound port.
pub trait ResolverFactory: Send + Sync {
    /// Resolver for `config`; `None` when the entry is unusable.
    fn build(&self, config: &ResolverConfig) -> Option<Arc<dyn Resolver>>;
}

/// The collaborators a client needs, bundled.
#[derive(Clone)]
pub struct SessionPorts {
    /// Node dialer.
    pub connector: Arc<dyn NodeConnector>,
    /// Account factory.
    pub accounts: Arc<dyn AccountFactory>,
    /// Chain RPC.
    pub chain: Arc<dyn ChainClient>,
    /// Resolver factory.
    pub resolvers: Arc<dyn ResolverFactory>,
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Connector that never reaches a node.
#[derive(Clone, Debug, Default)]
pub struct RefusingConnector;

#[async_trait]
impl NodeConnector for RefusingConnector {
    async fn connect(
        &self,
        _seed_rpc_servers: &[String],
        client_address: &str,
        _public_key: &[u8],
    ) -> Result<Arc<dyn NodeConnection>, SessionError> {
        Err(SessionError::TransientNetwork(format!(
            "no node reachable for {client_address}"
        )))
    }
}

/// Resolver returning a fixed list.
#[derive(Clone, Debug)]
pub struct MockResolver {
    /// Resolver name.
    pub name: String,
    /// Seeds returned.
    pub seeds: Vec<String>,
    /// Should return errors?
    pub should_fail: bool,
}

#[async_trait]
impl Resolver for MockResolver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve_seeds(&self) -> Result<Vec<String>, SessionError> {
        if self.should_fail {
            return Err(SessionError::TransientNetwork("Mock failure".to_string()));
        }
        Ok(self.seeds.clone())
    }
}
