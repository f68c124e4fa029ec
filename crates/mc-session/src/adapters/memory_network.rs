//! # In-Memory Network
//!
//! A node network living in process memory. Nodes are assigned to dialing
//! subclients round-robin; packets are routed by destination address to
//! every open connection registered under it. Packets for an address with
//! no open connection are held for `max_holding_seconds` and flushed when a
//! connection for that address appears.

use crate::domain::{InboundMessage, NodeDescriptor, OutboundPacket, SessionError};
use crate::ports::{NodeConnection, NodeConnector};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// One registered connection endpoint.
struct Mailbox {
    conn_id: u64,
    sender: mpsc::UnboundedSender<InboundMessage>,
    closed: CancellationToken,
}

/// A packet waiting for its receiver.
struct HeldMessage {
    dest: String,
    message: InboundMessage,
    expires_at: Instant,
}

struct NetworkInner {
    nodes: Vec<NodeDescriptor>,
    next_node: AtomicUsize,
    next_conn_id: AtomicU64,
    reachable: AtomicBool,
    mailboxes: DashMap<String, Vec<Mailbox>>,
    held: Mutex<Vec<HeldMessage>>,
    delivered: AtomicU64,
}

impl NetworkInner {
    /// Deliver to every open connection of `dest`; `true` if any took it.
    fn deliver(&self, dest: &str, message: &InboundMessage) -> bool {
        let Some(mut boxes) = self.mailboxes.get_mut(dest) else {
            return false;
        };
        boxes.retain(|b| !b.closed.is_cancelled() && !b.sender.is_closed());
        let mut any = false;
        for mailbox in boxes.iter() {
            if mailbox.sender.send(message.clone()).is_ok() {
                any = true;
            }
        }
        if any {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }
        any
    }

    fn hold(&self, dest: &str, message: InboundMessage, holding: u32) {
        let expires_at = Instant::now() + Duration::from_secs(u64::from(holding));
        trace!(dest, holding, "Holding message for offline receiver");
        self.held.lock().push(HeldMessage {
            dest: dest.to_string(),
            message,
            expires_at,
        });
    }

    /// Deliver held messages for `address` that have not expired.
    fn flush_held(&self, address: &str) {
        let now = Instant::now();
        let ready: Vec<InboundMessage> = {
            let mut held = self.held.lock();
            held.retain(|h| h.expires_at > now);
            let (ready, keep): (Vec<_>, Vec<_>) = held.drain(..).partition(|h| h.dest == address);
            *held = keep;
            ready.into_iter().map(|h| h.message).collect()
        };
        for message in ready {
            self.deliver(address, &message);
        }
    }

    fn remove_mailbox(&self, address: &str, conn_id: u64) {
        if let Some(mut boxes) = self.mailboxes.get_mut(address) {
            boxes.retain(|b| b.conn_id != conn_id);
        }
        self.mailboxes.remove_if(address, |_, boxes| boxes.is_empty());
    }
}

/// In-memory node network.
#[derive(Clone)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

impl MemoryNetwork {
    /// Network with `node_count` generated nodes.
    pub fn new(node_count: usize) -> Self {
        let nodes = (0..node_count).map(generated_node).collect();
        Self::with_nodes(nodes)
    }

    /// Network with explicit nodes.
    pub fn with_nodes(nodes: Vec<NodeDescriptor>) -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                nodes,
                next_node: AtomicUsize::new(0),
                next_conn_id: AtomicU64::new(1),
                reachable: AtomicBool::new(true),
                mailboxes: DashMap::new(),
                held: Mutex::new(Vec::new()),
                delivered: AtomicU64::new(0),
            }),
        }
    }

    /// Nodes of the network.
    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.inner.nodes
    }

    /// Make every dial and send fail (or succeed again).
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
        debug!(reachable, "Network reachability changed");
    }

    /// Sever every connection registered under `address`.
    pub fn drop_connections(&self, address: &str) -> usize {
        let Some((_, boxes)) = self.inner.mailboxes.remove(address) else {
            return 0;
        };
        for mailbox in &boxes {
            mailbox.closed.cancel();
        }
        debug!(address, count = boxes.len(), "Dropped connections");
        boxes.len()
    }

    /// Open connections registered under `address`.
    pub fn connection_count(&self, address: &str) -> usize {
        self.inner.mailboxes.get(address).map_or(0, |boxes| {
            boxes.iter().filter(|b| !b.closed.is_cancelled()).count()
        })
    }

    /// Messages waiting for offline receivers.
    pub fn held_count(&self) -> usize {
        self.inner.held.lock().len()
    }

    /// Messages delivered to at least one connection.
    pub fn delivered_count(&self) -> u64 {
        self.inner.delivered.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl NodeConnector for MemoryNetwork {
    async fn connect(
        &self,
        seed_rpc_servers: &[String],
        client_address: &str,
        _public_key: &[u8],
    ) -> Result<Arc<dyn NodeConnection>, SessionError> {
        if seed_rpc_servers.is_empty() {
            return Err(SessionError::TransientNetwork(
                "no seed rpc server".to_string(),
            ));
        }
        if !self.inner.reachable.load(Ordering::SeqCst) {
            return Err(SessionError::TransientNetwork(
                "network unreachable".to_string(),
            ));
        }
        if self.inner.nodes.is_empty() {
            return Err(SessionError::TransientNetwork("no node available".to_string()));
        }

        let slot = self.inner.next_node.fetch_add(1, Ordering::Relaxed) % self.inner.nodes.len();
        let node = self.inner.nodes[slot].clone();
        let conn_id = self.inner.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        self.inner
            .mailboxes
            .entry(client_address.to_string())
            .or_default()
            .push(Mailbox {
                conn_id,
                sender,
                closed: closed.clone(),
            });
        self.inner.flush_held(client_address);

        trace!(address = client_address, node = %node.address, conn_id, "Connection opened");
        Ok(Arc::new(MemoryConnection {
            conn_id,
            address: client_address.to_string(),
            node,
            network: Arc::clone(&self.inner),
            inbox: tokio::sync::Mutex::new(receiver),
            closed,
        }))
    }
}

/// One connection into the in-memory network.
struct MemoryConnection {
    conn_id: u64,
    address: String,
    node: NodeDescriptor,
    network: Arc<NetworkInner>,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
    closed: CancellationToken,
}

#[async_trait]
impl NodeConnection for MemoryConnection {
    fn node(&self) -> NodeDescriptor {
        self.node.clone()
    }

    async fn send(&self, packet: OutboundPacket) -> Result<(), SessionError> {
        if self.closed.is_cancelled() {
            return Err(SessionError::TransientNetwork("connection closed".to_string()));
        }
        if !self.network.reachable.load(Ordering::SeqCst) {
            return Err(SessionError::TransientNetwork(
                "network unreachable".to_string(),
            ));
        }

        for dest in &packet.dests {
            let message = InboundMessage {
                src: self.address.clone(),
                data: packet.data.clone(),
                message_type: packet.message_type,
                encrypted: packet.encrypted,
                message_id: packet.message_id,
                reply_to: packet.reply_to,
                no_reply: packet.no_reply,
            };
            if !self.network.deliver(dest, &message) && packet.max_holding_seconds > 0 {
                self.network.hold(dest, message, packet.max_holding_seconds);
            }
        }
        Ok(())
    }

    async fn next_message(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<InboundMessage>, SessionError> {
        let mut inbox = self.inbox.lock().await;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(None),
            _ = self.closed.cancelled() => Ok(None),
            message = inbox.recv() => Ok(message),
        }
    }

    async fn close(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();
        self.network.remove_mailbox(&self.address, self.conn_id);
        trace!(address = %self.address, conn_id = self.conn_id, "Connection closed");
    }

    fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }
}

/// Deterministic descriptor of generated node `i`.
fn generated_node(i: usize) -> NodeDescriptor {
    let port = 30_001 + i * 10;
    NodeDescriptor {
        address: format!("127.0.0.1:{port}"),
        public_key: hex::encode(Sha256::digest(format!("node-{i}").as_bytes())),
        rpc_address: format!("127.0.0.1:{}", port + 2),
    }
}
