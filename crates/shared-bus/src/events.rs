//! # Client Events
//!
//! Defines all event types that flow through the sink. The serialized form
//! is the wire shape pushed to the external consumer.

use serde::{Deserialize, Serialize};

/// All events that can be published to the sink.
///
/// Every variant is tagged with the address of the logical client that
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientEvent {
    /// A subclient connected (only the first per generation is reported).
    Connect(ConnectEvent),

    /// An inbound message was delivered.
    Message(MessageEvent),

    /// A worker hit an unrecoverable stream failure.
    Error(ErrorEvent),
}

/// Event name carried in the `event` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventName {
    /// Connect notification.
    #[serde(rename = "onConnect")]
    OnConnect,
    /// Message notification.
    #[serde(rename = "onMessage")]
    OnMessage,
}

/// Node a client connected through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node routing address.
    pub address: String,
    /// Node public key, hex encoded.
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

/// Client half of a connect event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Logical client address.
    pub address: String,
}

/// Connect notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectEvent {
    /// Originating registry address.
    #[serde(rename = "_id")]
    pub address: String,
    /// Always [`EventName::OnConnect`].
    pub event: EventName,
    /// Node the first subclient connected through.
    pub node: NodeInfo,
    /// The logical client.
    pub client: ClientInfo,
    /// Deduplicated `http://host:port` RPC endpoints of all subclient nodes.
    #[serde(rename = "rpcServers")]
    pub rpc_servers: Vec<String>,
}

impl ConnectEvent {
    /// Create a connect event.
    pub fn new(
        address: impl Into<String>,
        node: NodeInfo,
        client_address: impl Into<String>,
        rpc_servers: Vec<String>,
    ) -> Self {
        Self {
            address: address.into(),
            event: EventName::OnConnect,
            node,
            client: ClientInfo {
                address: client_address.into(),
            },
            rpc_servers,
        }
    }
}

/// Payload of a message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageData {
    /// Sender address.
    pub src: String,
    /// Payload decoded as UTF-8 (lossy).
    pub data: String,
    /// Payload type code.
    #[serde(rename = "type")]
    pub message_type: u8,
    /// Whether the payload was end-to-end encrypted.
    pub encrypted: bool,
    /// Message id, if the sender set one.
    #[serde(rename = "messageId")]
    pub message_id: Option<Vec<u8>>,
    /// Whether the sender asked for no reply.
    #[serde(rename = "noReply")]
    pub no_reply: bool,
}

/// Message notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Originating registry address.
    #[serde(rename = "_id")]
    pub address: String,
    /// Always [`EventName::OnMessage`].
    pub event: EventName,
    /// The delivered message.
    pub data: MessageData,
}

impl MessageEvent {
    /// Create a message event.
    pub fn new(address: impl Into<String>, data: MessageData) -> Self {
        Self {
            address: address.into(),
            event: EventName::OnMessage,
            data,
        }
    }
}

/// Error notification emitted in place of a connect or message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Originating registry address.
    #[serde(rename = "_id")]
    pub address: String,
    /// Machine-readable error code.
    #[serde(rename = "errorCode")]
    pub error_code: String,
    /// Human-readable description.
    pub message: String,
}

impl ErrorEvent {
    /// Create an error event.
    pub fn new(
        address: impl Into<String>,
        error_code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

impl ClientEvent {
    /// Get the kind of this event (for filtering).
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connect(_) => EventKind::Connect,
            Self::Message(_) => EventKind::Message,
            Self::Error(_) => EventKind::Error,
        }
    }

    /// Get the originating registry address.
    #[must_use]
    pub fn address(&self) -> &str {
        match self {
            Self::Connect(event) => &event.address,
            Self::Message(event) => &event.address,
            Self::Error(event) => &event.address,
        }
    }

    /// Serialize to the JSON value pushed to consumers.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Event kinds for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Connect events.
    Connect,
    /// Message events.
    Message,
    /// Error events.
    Error,
}

/// Filter applied on the consumer side of a subscription.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Kinds to include. Empty means all kinds.
    pub kinds: Vec<EventKind>,
    /// Addresses to include. Empty means all addresses.
    pub addresses: Vec<String>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific kinds.
    #[must_use]
    pub fn kinds(kinds: Vec<EventKind>) -> Self {
        Self {
            kinds,
            addresses: Vec::new(),
        }
    }

    /// Create a filter for events from one client address.
    #[must_use]
    pub fn address(address: impl Into<String>) -> Self {
        Self {
            kinds: Vec::new(),
            addresses: vec![address.into()],
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &ClientEvent) -> bool {
        let kind_match = self.kinds.is_empty() || self.kinds.contains(&event.kind());

        let address_match =
            self.addresses.is_empty() || self.addresses.iter().any(|a| a == event.address());

        kind_match && address_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_event(address: &str) -> ClientEvent {
        ClientEvent::Message(MessageEvent::new(
            address,
            MessageData {
                src: "peer".to_string(),
                data: "hello".to_string(),
                message_type: 1,
                encrypted: true,
                message_id: Some(vec![1, 2, 3, 4, 5, 6, 7, 8]),
                no_reply: false,
            },
        ))
    }

    #[test]
    fn test_connect_event_wire_shape() {
        let event = ClientEvent::Connect(ConnectEvent::new(
            "abc",
            NodeInfo {
                address: "10.0.0.1:30001".to_string(),
                public_key: "ff".to_string(),
            },
            "abc",
            vec!["http://10.0.0.1:30003".to_string()],
        ));

        let json = event.to_json();
        assert_eq!(json["_id"], "abc");
        assert_eq!(json["event"], "onConnect");
        assert_eq!(json["node"]["publicKey"], "ff");
        assert_eq!(json["client"]["address"], "abc");
        assert_eq!(json["rpcServers"][0], "http://10.0.0.1:30003");
    }

    #[test]
    fn test_message_event_wire_shape() {
        let json = message_event("abc").to_json();
        assert_eq!(json["event"], "onMessage");
        assert_eq!(json["data"]["src"], "peer");
        assert_eq!(json["data"]["type"], 1);
        assert_eq!(json["data"]["noReply"], false);
        assert_eq!(json["data"]["messageId"].as_array().map(Vec::len), Some(8));
    }

    #[test]
    fn test_error_event_wire_shape() {
        let json = ClientEvent::Error(ErrorEvent::new("abc", "STREAM_TERMINATED", "gone")).to_json();
        assert_eq!(json["_id"], "abc");
        assert_eq!(json["errorCode"], "STREAM_TERMINATED");
        assert!(json.get("event").is_none());
    }

    #[test]
    fn test_untagged_roundtrip_keeps_variant() {
        let event = message_event("abc");
        let text = serde_json::to_string(&event).unwrap();
        let back: ClientEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back.kind(), EventKind::Message);
    }

    #[test]
    fn test_filter_all() {
        assert!(EventFilter::all().matches(&message_event("abc")));
    }

    #[test]
    fn test_filter_by_kind() {
        let filter = EventFilter::kinds(vec![EventKind::Connect]);
        assert!(!filter.matches(&message_event("abc")));
    }

    #[test]
    fn test_filter_by_address() {
        let filter = EventFilter::address("abc");
        assert!(filter.matches(&message_event("abc")));
        assert!(!filter.matches(&message_event("xyz")));
    }
}
