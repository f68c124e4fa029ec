//! # Domain Entities
//!
//! Nodes, messages and chain records handled by the session core.

use super::value_objects::{MessageId, MessageType};
use serde::{Deserialize, Serialize};
use shared_bus::{MessageData, NodeInfo};
use std::collections::BTreeMap;

/// A node a subclient is attached to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Node routing address (`host:port`).
    pub address: String,
    /// Node public key, hex encoded.
    pub public_key: String,
    /// Node RPC endpoint (`host:port`), may be empty.
    pub rpc_address: String,
}

impl NodeDescriptor {
    /// Node half of a connect event.
    #[must_use]
    pub fn to_info(&self) -> NodeInfo {
        NodeInfo {
            address: self.address.clone(),
            public_key: self.public_key.clone(),
        }
    }
}

/// A subclient transitioned to connected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectNotice {
    /// Node it connected through.
    pub node: NodeDescriptor,
    /// Subclient index (`-1` for the original client).
    pub subclient_index: i32,
}

/// A message received by a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender address. Subclient prefixes are stripped before delivery.
    pub src: String,
    /// Payload.
    pub data: Vec<u8>,
    /// Payload type.
    pub message_type: MessageType,
    /// Whether the payload was end-to-end encrypted.
    pub encrypted: bool,
    /// Message id.
    pub message_id: MessageId,
    /// Id of the message this one answers.
    pub reply_to: Option<MessageId>,
    /// Whether the sender expects no reply.
    pub no_reply: bool,
}

impl InboundMessage {
    /// Payload of a message event.
    #[must_use]
    pub fn to_event_data(&self) -> MessageData {
        MessageData {
            src: self.src.clone(),
            data: String::from_utf8_lossy(&self.data).into_owned(),
            message_type: self.message_type.as_u8(),
            encrypted: self.encrypted,
            message_id: Some(self.message_id.to_vec()),
            no_reply: self.no_reply,
        }
    }
}

/// A message handed to one node connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundPacket {
    /// Destination addresses, already prefixed for the sending subclient.
    pub dests: Vec<String>,
    /// Payload.
    pub data: Vec<u8>,
    /// Payload type.
    pub message_type: MessageType,
    /// Whether to encrypt end to end.
    pub encrypted: bool,
    /// Message id.
    pub message_id: MessageId,
    /// Id of the message being answered.
    pub reply_to: Option<MessageId>,
    /// Whether the receiver should not reply.
    pub no_reply: bool,
    /// How long the network holds the message for an offline receiver.
    pub max_holding_seconds: u32,
}

/// One subscription record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    /// Subscriber metadata.
    pub meta: String,
    /// Block height at which the subscription expires.
    #[serde(rename = "expiresAt")]
    pub expires_at: u64,
}

/// Subscribers of a topic, split by confirmation state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscribers {
    /// Confirmed subscribers, address to meta.
    pub subscribers: BTreeMap<String, String>,
    /// Subscribers still in the transaction pool.
    pub subscribers_in_tx_pool: BTreeMap<String, String>,
}

impl Subscribers {
    /// Merged view; pool entries are included when `tx_pool` is set.
    #[must_use]
    pub fn merged(&self, tx_pool: bool) -> BTreeMap<String, String> {
        let mut all = self.subscribers.clone();
        if tx_pool {
            for (address, meta) in &self.subscribers_in_tx_pool {
                all.entry(address.clone()).or_insert_with(|| meta.clone());
            }
        }
        all
    }

    /// All subscriber addresses in sorted order.
    #[must_use]
    pub fn addresses(&self, tx_pool: bool) -> Vec<String> {
        self.merged(tx_pool).into_keys().collect()
    }
}

/// Query for a topic's subscribers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscribersQuery {
    /// Topic.
    pub topic: String,
    /// Number of entries to skip.
    pub offset: usize,
    /// Maximum number of entries; `0` means unlimited.
    pub limit: usize,
    /// Whether to return metadata.
    pub meta: bool,
    /// Whether to include pending subscriptions.
    pub tx_pool: bool,
    /// Only subscribers whose address hash starts with these bytes.
    pub subscriber_hash_prefix: Vec<u8>,
}
