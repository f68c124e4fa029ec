//! # Session Configuration
//!
//! Per-client configuration (dialing, retries, resolvers), per-call message
//! options, and service-wide pump and concurrency settings.

use crate::domain::{MessageId, MessageType, MAX_GENERATIONS, STALE_GENERATION_AGE_SECS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Seed endpoint used when a request does not name any.
pub const DEFAULT_SEED_RPC_SERVER: &str = "http://seed.meshlink.local:30003";

/// Resolver entry. Resolvers only contribute extra seed RPC endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResolverConfig {
    /// Ethereum contract based resolver.
    Eth {
        /// Address prefix handled by this resolver.
        prefix: String,
        /// Ethereum RPC endpoint.
        rpc_server: String,
        /// Resolver contract address.
        contract_address: String,
    },
    /// DNS based resolver.
    Dns {
        /// DNS server address.
        dns_server: String,
    },
}

impl ResolverConfig {
    /// Parse Ethereum resolver entries, skipping malformed ones.
    pub fn parse_eth(entries: &[serde_json::Value]) -> Vec<Self> {
        entries
            .iter()
            .filter_map(|entry| {
                let Some(obj) = entry.as_object() else {
                    warn!(entry = %entry, "Skipping malformed eth resolver entry");
                    return None;
                };
                let field = |name: &str| {
                    obj.get(name)
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                let rpc_server = field("rpcServer");
                if rpc_server.is_empty() {
                    warn!(entry = %entry, "Skipping eth resolver entry without rpcServer");
                    return None;
                }
                Some(Self::Eth {
                    prefix: field("prefix"),
                    rpc_server,
                    contract_address: field("contractAddress"),
                })
            })
            .collect()
    }

    /// Parse DNS resolver entries, skipping malformed ones.
    pub fn parse_dns(entries: &[serde_json::Value]) -> Vec<Self> {
        entries
            .iter()
            .filter_map(|entry| {
                let dns_server = entry
                    .get("dnsServer")
                    .and_then(serde_json::Value::as_str)
                    .filter(|s| !s.is_empty());
                match dns_server {
                    Some(server) => Some(Self::Dns {
                        dns_server: server.to_string(),
                    }),
                    None => {
                        warn!(entry = %entry, "Skipping malformed dns resolver entry");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Configuration of one multi-subclient client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Seed RPC endpoints used to find nodes.
    pub seed_rpc_servers: Vec<String>,

    /// Dial retries per subclient; `None` retries forever in the background.
    pub connect_retries: Option<u32>,

    /// First backoff step between dials.
    pub min_reconnect_interval_ms: u64,

    /// Backoff cap between dials.
    pub max_reconnect_interval_ms: u64,

    /// Resolvers contributing extra seed endpoints.
    pub resolvers: Vec<ResolverConfig>,

    /// Also run the unprefixed original subclient.
    pub original_client: bool,

    /// Message ids remembered for duplicate suppression.
    pub dedup_cache_size: usize,

    /// Merged inbound queue depth.
    pub message_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            seed_rpc_servers: vec![DEFAULT_SEED_RPC_SERVER.to_string()],
            connect_retries: None,
            min_reconnect_interval_ms: 1_000,
            max_reconnect_interval_ms: 5_000,
            resolvers: Vec::new(),
            original_client: true,
            dedup_cache_size: 1_024,
            message_channel_capacity: 1_024,
        }
    }
}

impl ClientConfig {
    /// Create a config for testing (fast backoff, bounded retries).
    pub fn for_testing() -> Self {
        Self {
            connect_retries: Some(2),
            min_reconnect_interval_ms: 10,
            max_reconnect_interval_ms: 50,
            dedup_cache_size: 64,
            message_channel_capacity: 64,
            ..Self::default()
        }
    }

    /// Map the wire retry count: negative means unlimited.
    #[must_use]
    pub fn retries_from_wire(connect_retries: i64) -> Option<u32> {
        u32::try_from(connect_retries).ok()
    }

    /// First backoff step.
    #[must_use]
    pub fn min_reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.min_reconnect_interval_ms)
    }

    /// Backoff cap.
    #[must_use]
    pub fn max_reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_interval_ms)
    }
}

/// Options for one send.
#[derive(Clone, Debug)]
pub struct MessageConfig {
    /// Network holding time for offline receivers.
    pub max_holding_seconds: u32,
    /// Do not wait for a reply.
    pub no_reply: bool,
    /// Id of the outgoing message.
    pub message_id: MessageId,
    /// Encrypt end to end.
    pub encrypted: bool,
    /// Payload type.
    pub message_type: MessageType,
}

impl MessageConfig {
    /// Text message with a fresh id.
    #[must_use]
    pub fn text(no_reply: bool) -> Self {
        Self {
            max_holding_seconds: 0,
            no_reply,
            message_id: MessageId::random(),
            encrypted: true,
            message_type: MessageType::Text,
        }
    }

    /// Clamp a wire holding time; negative becomes zero.
    #[must_use]
    pub fn holding_from_wire(max_holding_seconds: i64) -> u32 {
        u32::try_from(max_holding_seconds.max(0)).unwrap_or(u32::MAX)
    }
}

/// Options for one topic publish.
#[derive(Clone, Debug)]
pub struct PublishConfig {
    /// Network holding time for offline receivers.
    pub max_holding_seconds: u32,
    /// Include pending subscribers.
    pub tx_pool: bool,
    /// Subscribers to skip.
    pub offset: usize,
    /// Maximum subscribers to reach.
    pub limit: usize,
    /// Id of the outgoing message.
    pub message_id: MessageId,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_holding_seconds: 0,
            tx_pool: false,
            offset: 0,
            limit: 1_000,
            message_id: MessageId::random(),
        }
    }
}

/// Transaction options for subscribe and unsubscribe.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Fee as a decimal string.
    pub fee: String,
    /// Fixed nonce; the next free nonce is used when absent.
    pub nonce: Option<u64>,
}

/// Service-wide settings for the façade and the event pump.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionServiceConfig {
    /// Concurrent request operations.
    pub max_concurrent_requests: usize,

    /// Wait used by the message worker for each receive.
    pub message_poll_interval_ms: u64,

    /// Interval between housekeeping checks.
    pub housekeeping_interval_ms: u64,

    /// Generations kept under one address before eviction applies.
    pub max_generations: usize,

    /// Minimum generation age before eviction, in seconds.
    pub stale_generation_age_secs: u64,

    /// Per-generation event queue depth.
    pub event_channel_capacity: usize,

    /// Reply wait used when a send names no timeout.
    pub default_send_timeout_ms: u64,

    /// Baseline client config.
    pub client: ClientConfig,
}

impl Default for SessionServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 64,
            message_poll_interval_ms: 5_000,
            housekeeping_interval_ms: 5_000,
            max_generations: MAX_GENERATIONS,
            stale_generation_age_secs: STALE_GENERATION_AGE_SECS,
            event_channel_capacity: 256,
            default_send_timeout_ms: 10_000,
            client: ClientConfig::default(),
        }
    }
}

impl SessionServiceConfig {
    /// Create a config for testing (small queues, fast dialing).
    pub fn for_testing() -> Self {
        Self {
            max_concurrent_requests: 8,
            event_channel_capacity: 32,
            client: ClientConfig::for_testing(),
            ..Self::default()
        }
    }

    /// Message worker receive wait.
    #[must_use]
    pub fn message_poll_interval(&self) -> Duration {
        Duration::from_millis(self.message_poll_interval_ms)
    }

    /// Housekeeping interval.
    #[must_use]
    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_millis(self.housekeeping_interval_ms)
    }

    /// Default reply wait.
    #[must_use]
    pub fn default_send_timeout(&self) -> Duration {
        Duration::from_millis(self.default_send_timeout_ms)
    }
}
