//! # Inbound Ports
//!
//! The request façade: what a bridge can ask the session core to do.
//! Request types deserialize from the bridge's JSON arguments.

use crate::domain::{SessionError, SubscriptionInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_bus::MessageData;
use std::collections::BTreeMap;

fn default_subclients() -> usize {
    crate::domain::DEFAULT_SUBCLIENTS
}

fn default_connect_retries() -> i64 {
    -1
}

fn default_max_reconnect_interval() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_send_timeout() -> u64 {
    10_000
}

fn default_publish_limit() -> usize {
    1_000
}

fn default_fee() -> String {
    "0".to_string()
}

/// Arguments of `create` and `recreate`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    /// Registry address to register under (`recreate` only).
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Hex-encoded account seed.
    #[serde(default)]
    pub seed: Option<String>,
    /// Base identifier.
    #[serde(default)]
    pub identifier: String,
    /// Subclient count.
    #[serde(default = "default_subclients")]
    pub num_sub_clients: usize,
    /// Seed RPC endpoints; the service default when absent.
    #[serde(default)]
    pub seed_rpc: Option<Vec<String>>,
    /// Dial retries; negative means unlimited.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: i64,
    /// Backoff cap in milliseconds.
    #[serde(default = "default_max_reconnect_interval")]
    pub max_reconnect_interval: u64,
    /// Raw Ethereum resolver entries.
    #[serde(default)]
    pub eth_resolver_config_array: Vec<serde_json::Value>,
    /// Raw DNS resolver entries.
    #[serde(default)]
    pub dns_resolver_config_array: Vec<serde_json::Value>,
}

impl CreateRequest {
    /// Request with defaults for `seed`.
    #[must_use]
    pub fn with_seed(seed: &[u8]) -> Self {
        Self {
            id: String::new(),
            seed: Some(hex::encode(seed)),
            identifier: String::new(),
            num_sub_clients: default_subclients(),
            seed_rpc: None,
            connect_retries: default_connect_retries(),
            max_reconnect_interval: default_max_reconnect_interval(),
            eth_resolver_config_array: Vec::new(),
            dns_resolver_config_array: Vec::new(),
        }
    }
}

/// Result of `create` and `recreate`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    /// Client address.
    pub address: String,
    /// Hex public key.
    pub public_key: String,
    /// Hex seed.
    pub seed: String,
}

/// Arguments naming only the registry address.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AddressRequest {
    /// Registry address.
    #[serde(rename = "_id", default)]
    pub id: String,
}

/// Arguments of `replyText`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyTextRequest {
    /// Registry address.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Id of the message being answered.
    #[serde(default)]
    pub message_id: Option<Vec<u8>>,
    /// Destination.
    #[serde(default)]
    pub dest: String,
    /// Text payload.
    #[serde(default)]
    pub data: String,
    /// Encrypt end to end.
    #[serde(default = "default_true")]
    pub encrypted: bool,
    /// Network holding time.
    #[serde(default)]
    pub max_holding_seconds: i64,
}

/// Arguments of `sendText`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextRequest {
    /// Registry address.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Destinations.
    #[serde(default)]
    pub dests: Vec<String>,
    /// Text payload.
    #[serde(default)]
    pub data: String,
    /// Network holding time; negative becomes zero.
    #[serde(default)]
    pub max_holding_seconds: i64,
    /// Do not wait for a reply.
    #[serde(default = "default_true")]
    pub no_reply: bool,
    /// Reply wait in milliseconds.
    #[serde(default = "default_send_timeout")]
    pub timeout: u64,
}

/// Result of `sendText`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SendTextResult {
    /// The peer's reply.
    Reply(MessageData),
    /// Fire-and-forget send.
    Sent(MessageIdResponse),
}

/// A generated message id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageIdResponse {
    /// Message id bytes.
    pub message_id: Vec<u8>,
}

/// Arguments of `publishText`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishTextRequest {
    /// Registry address.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Topic.
    #[serde(default)]
    pub topic: String,
    /// Text payload.
    #[serde(default)]
    pub data: String,
    /// Network holding time; negative becomes zero.
    #[serde(default)]
    pub max_holding_seconds: i64,
    /// Include pending subscribers.
    #[serde(default)]
    pub tx_pool: bool,
    /// Subscribers to skip.
    #[serde(default)]
    pub offset: usize,
    /// Maximum subscribers.
    #[serde(default = "default_publish_limit")]
    pub limit: usize,
}

/// Arguments of `subscribe`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    /// Registry address.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Subscriber identifier.
    #[serde(default)]
    pub identifier: String,
    /// Topic.
    #[serde(default)]
    pub topic: String,
    /// Duration in blocks.
    #[serde(default)]
    pub duration: u64,
    /// Subscriber metadata.
    #[serde(default)]
    pub meta: String,
    /// Fee.
    #[serde(default = "default_fee")]
    pub fee: String,
    /// Fixed nonce.
    #[serde(default)]
    pub nonce: Option<u64>,
}

/// Arguments of `unsubscribe`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeRequest {
    /// Registry address.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Subscriber identifier.
    #[serde(default)]
    pub identifier: String,
    /// Topic.
    #[serde(default)]
    pub topic: String,
    /// Fee.
    #[serde(default = "default_fee")]
    pub fee: String,
    /// Fixed nonce.
    #[serde(default)]
    pub nonce: Option<u64>,
}

/// Arguments of `getSubscribers`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSubscribersRequest {
    /// Registry address.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Topic.
    #[serde(default)]
    pub topic: String,
    /// Entries to skip.
    #[serde(default)]
    pub offset: usize,
    /// Maximum entries; zero means unlimited.
    #[serde(default)]
    pub limit: usize,
    /// Return metadata.
    #[serde(default = "default_true")]
    pub meta: bool,
    /// Include pending subscribers.
    #[serde(default = "default_true")]
    pub tx_pool: bool,
    /// Hex prefix of subscriber hashes.
    #[serde(default)]
    pub subscriber_hash_prefix: Option<String>,
}

/// Arguments of `getSubscribersCount`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSubscribersCountRequest {
    /// Registry address.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Topic.
    #[serde(default)]
    pub topic: String,
    /// Hex prefix of subscriber hashes.
    #[serde(default)]
    pub subscriber_hash_prefix: Option<String>,
}

/// Arguments of `getSubscription`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetSubscriptionRequest {
    /// Registry address.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Topic.
    #[serde(default)]
    pub topic: String,
    /// Subscriber address.
    #[serde(default)]
    pub subscriber: String,
}

/// Arguments of `getNonce`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetNonceRequest {
    /// Registry address.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Wallet address; the client's own when absent or empty.
    #[serde(default)]
    pub address: Option<String>,
    /// Count pending transactions.
    #[serde(default = "default_true")]
    pub tx_pool: bool,
}

/// Session API - inbound port.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Create a client, closing older generations of the same address.
    async fn create(&self, request: CreateRequest) -> Result<CreateResponse, SessionError>;

    /// Create a client under `request.id` without closing older generations.
    async fn recreate(&self, request: CreateRequest) -> Result<CreateResponse, SessionError>;

    /// Re-dial disconnected subclients of the latest usable client.
    async fn reconnect(&self, id: &str) -> Result<(), SessionError>;

    /// Close every generation under the address.
    async fn close(&self, id: &str) -> Result<(), SessionError>;

    /// Answer a received message.
    async fn reply_text(&self, request: ReplyTextRequest) -> Result<(), SessionError>;

    /// Send text, optionally waiting for the reply.
    async fn send_text(&self, request: SendTextRequest) -> Result<SendTextResult, SessionError>;

    /// Publish text to a topic's subscribers.
    async fn publish_text(
        &self,
        request: PublishTextRequest,
    ) -> Result<MessageIdResponse, SessionError>;

    /// Subscribe to a topic.
    async fn subscribe(&self, request: SubscribeRequest) -> Result<String, SessionError>;

    /// Unsubscribe from a topic.
    async fn unsubscribe(&self, request: UnsubscribeRequest) -> Result<String, SessionError>;

    /// Subscribers of a topic, address to meta.
    async fn get_subscribers(
        &self,
        request: GetSubscribersRequest,
    ) -> Result<BTreeMap<String, String>, SessionError>;

    /// Number of subscribers of a topic.
    async fn get_subscribers_count(
        &self,
        request: GetSubscribersCountRequest,
    ) -> Result<u64, SessionError>;

    /// One subscription record.
    async fn get_subscription(
        &self,
        request: GetSubscriptionRequest,
    ) -> Result<SubscriptionInfo, SessionError>;

    /// Current block height.
    async fn get_height(&self, id: &str) -> Result<u64, SessionError>;

    /// Nonce of a wallet address.
    async fn get_nonce(&self, request: GetNonceRequest) -> Result<u64, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateRequest = serde_json::from_value(json!({"seed": "00"})).unwrap();
        assert_eq!(req.num_sub_clients, 3);
        assert_eq!(req.connect_retries, -1);
        assert_eq!(req.max_reconnect_interval, 5_000);
        assert!(req.seed_rpc.is_none());
    }

    #[test]
    fn test_send_text_defaults() {
        let req: SendTextRequest =
            serde_json::from_value(json!({"_id": "abc", "dests": ["x"], "data": "hi"})).unwrap();
        assert!(req.no_reply);
        assert_eq!(req.timeout, 10_000);
        assert_eq!(req.id, "abc");
    }

    #[test]
    fn test_get_subscribers_defaults() {
        let req: GetSubscribersRequest =
            serde_json::from_value(json!({"_id": "abc", "topic": "t"})).unwrap();
        assert!(req.meta);
        assert!(req.tx_pool);
        assert_eq!(req.limit, 0);
    }

    #[test]
    fn test_sent_result_shape() {
        let result = SendTextResult::Sent(MessageIdResponse {
            message_id: vec![1; 8],
        });
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["messageId"].as_array().map(Vec::len), Some(8));
    }
}
