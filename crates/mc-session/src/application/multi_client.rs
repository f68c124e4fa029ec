//! # Multi-Subclient Client
//!
//! One logical identity fanned out over several subclients. Sends go out
//! through every connected subclient; inbound copies are merged, deduplicated
//! by message id, and replies are routed to their waiting sender.
//!
//! ```text
//!   send ──┬─→ subclient __0__ ─→ node A ─┐
//!          ├─→ subclient __1__ ─→ node B ─┼─→ readers ─→ dedup ─→ reply? ─→ waiter
//!          └─→ subclient  (-1) ─→ node C ─┘                         └──→ message stream
//! ```

use crate::algorithms::{
    backoff_delay, collect_rpc_servers, dedup_destinations, may_retry, MessageDeduplicator,
};
use crate::application::reply::{PendingReplies, ReplyWaiter};
use crate::application::subclient::Subclient;
use crate::config::{ClientConfig, MessageConfig, PublishConfig, TransactionConfig};
use crate::domain::{
    add_identifier, invariant_destinations, invariant_subclient_count, remove_identifier,
    ConnectNotice, Identity, InboundMessage, MessageId, MessageType, NodeDescriptor,
    OutboundPacket, SessionError, Subscribers, SubscribersQuery, SubscriptionInfo,
    ORIGINAL_CLIENT_INDEX,
};
use crate::ports::{Account, NodeConnection, SessionPorts};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// A multi-subclient client.
pub struct MultiClient {
    identity: Identity,
    account: Arc<dyn Account>,
    config: ClientConfig,
    ports: SessionPorts,
    /// Seed endpoints after resolver expansion.
    seeds: Vec<String>,
    subclients: BTreeMap<i32, Arc<Subclient>>,
    closed: AtomicBool,
    cancel: CancellationToken,
    pending: Arc<PendingReplies>,
    dedup: MessageDeduplicator,
    message_tx: mpsc::Sender<InboundMessage>,
    message_rx: Mutex<mpsc::Receiver<InboundMessage>>,
    /// Holds at most one notice per subclient; overflow is dropped.
    connect_tx: mpsc::Sender<ConnectNotice>,
    connect_rx: Mutex<mpsc::Receiver<ConnectNotice>>,
}

impl MultiClient {
    /// Create a client and dial its subclients.
    ///
    /// Succeeds once at least one subclient is connected; the others keep
    /// dialing in the background.
    pub async fn create(
        account: Arc<dyn Account>,
        base_identifier: &str,
        subclient_count: usize,
        config: ClientConfig,
        ports: SessionPorts,
    ) -> Result<Arc<Self>, SessionError> {
        invariant_subclient_count(subclient_count)?;
        let count = i32::try_from(subclient_count)
            .map_err(|_| SessionError::InvalidParams("numSubClients too large".to_string()))?;

        let identity = Identity::derive(&account.public_key(), base_identifier);
        let seeds = resolve_seeds(&config, &ports).await;
        if seeds.is_empty() {
            return Err(SessionError::ClientCreateFailed(
                "no seed rpc server".to_string(),
            ));
        }

        let mut subclients = BTreeMap::new();
        if config.original_client {
            subclients.insert(
                ORIGINAL_CLIENT_INDEX,
                Arc::new(Subclient::new(
                    ORIGINAL_CLIENT_INDEX,
                    identity.subclient(ORIGINAL_CLIENT_INDEX),
                )),
            );
        }
        for index in 0..count {
            subclients.insert(
                index,
                Arc::new(Subclient::new(index, identity.subclient(index))),
            );
        }

        let (message_tx, message_rx) = mpsc::channel(config.message_channel_capacity.max(1));
        let (connect_tx, connect_rx) = mpsc::channel(subclients.len().max(1));

        let client = Arc::new(Self {
            identity,
            account,
            dedup: MessageDeduplicator::new(config.dedup_cache_size),
            config,
            ports,
            seeds,
            subclients,
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            pending: Arc::new(PendingReplies::new()),
            message_tx,
            message_rx: Mutex::new(message_rx),
            connect_tx,
            connect_rx: Mutex::new(connect_rx),
        });

        // Initial dials run concurrently; unlimited retries are left to recovery.
        let initial_retries = Some(client.config.connect_retries.unwrap_or(0));
        let mut dials = JoinSet::new();
        for sub in client.subclients.values() {
            let client = Arc::clone(&client);
            let sub = Arc::clone(sub);
            dials.spawn(async move {
                let connected = client.dial_with_retries(&sub, initial_retries).await;
                (sub.index(), connected)
            });
        }

        let mut connected = 0usize;
        let mut failed = Vec::new();
        while let Some(joined) = dials.join_next().await {
            match joined {
                Ok((_, true)) => connected += 1,
                Ok((index, false)) => failed.push(index),
                Err(err) => warn!(error = %err, "Initial dial task failed"),
            }
        }

        if connected == 0 {
            client.close().await;
            return Err(SessionError::ClientCreateFailed(format!(
                "no subclient of {} could connect",
                client.address()
            )));
        }

        for index in failed {
            if let Some(sub) = client.subclients.get(&index) {
                client.spawn_recovery(Arc::clone(sub));
            }
        }

        info!(
            address = %client.address(),
            connected,
            subclients = client.subclients.len(),
            "Client created"
        );
        Ok(client)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Client identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Client address.
    pub fn address(&self) -> &str {
        self.identity.address()
    }

    /// Hex public key.
    pub fn public_key_hex(&self) -> String {
        self.identity.public_key_hex()
    }

    /// Account seed.
    pub fn seed(&self) -> Vec<u8> {
        self.account.seed()
    }

    /// Whether the client was closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Subclient at `index`.
    pub fn subclient(&self, index: i32) -> Option<&Arc<Subclient>> {
        self.subclients.get(&index)
    }

    /// All subclients in index order.
    pub fn subclients(&self) -> impl Iterator<Item = &Arc<Subclient>> {
        self.subclients.values()
    }

    /// Number of subclients with an open connection.
    pub fn connected_count(&self) -> usize {
        self.subclients.values().filter(|s| s.is_connected()).count()
    }

    /// Nodes of the connected subclients, in index order.
    pub fn nodes(&self) -> Vec<NodeDescriptor> {
        self.subclients.values().filter_map(|s| s.node()).collect()
    }

    /// `http://` RPC endpoints of the connected subclients' nodes, deduplicated.
    pub fn rpc_servers(&self) -> Vec<String> {
        let nodes = self.nodes();
        collect_rpc_servers(nodes.iter().map(|n| n.rpc_address.as_str()))
    }

    /// Waiters for replies.
    pub fn pending_replies(&self) -> &PendingReplies {
        &self.pending
    }

    // =========================================================================
    // Dialing
    // =========================================================================

    /// Dial `sub` until it connects, retries run out, or the client closes.
    async fn dial_with_retries(self: &Arc<Self>, sub: &Arc<Subclient>, retries: Option<u32>) -> bool {
        let mut failures = 0u32;
        loop {
            if self.is_closed() || sub.is_closed() {
                return false;
            }
            match self.dial_once(sub).await {
                Ok(()) => return true,
                Err(err) => {
                    failures = failures.saturating_add(1);
                    if !may_retry(failures, retries) {
                        warn!(
                            address = %sub.address(),
                            attempts = failures,
                            error = %err,
                            "Giving up dialing subclient"
                        );
                        return false;
                    }
                    let delay = backoff_delay(
                        failures - 1,
                        self.config.min_reconnect_interval(),
                        self.config.max_reconnect_interval(),
                    );
                    debug!(
                        address = %sub.address(),
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Dial failed, backing off"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return false,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// One dial attempt. A no-op when `sub` is already connected.
    async fn dial_once(self: &Arc<Self>, sub: &Arc<Subclient>) -> Result<(), SessionError> {
        let _guard = sub.dial_lock.lock().await;
        if sub.is_connected() {
            return Ok(());
        }
        if self.is_closed() || sub.is_closed() {
            return Err(SessionError::client_closed());
        }

        let conn = self
            .ports
            .connector
            .connect(&self.seeds, sub.address(), self.identity.public_key())
            .await?;

        if self.is_closed() || !sub.attach(Arc::clone(&conn)) {
            conn.close().await;
            return Err(SessionError::client_closed());
        }

        let node = conn.node();
        debug!(
            address = %sub.address(),
            subclient = sub.index(),
            node = %node.address,
            "Subclient connected"
        );
        let notice = ConnectNotice {
            node,
            subclient_index: sub.index(),
        };
        if self.connect_tx.try_send(notice).is_err() {
            trace!(address = %sub.address(), "Connect notice queue full, notice dropped");
        }

        let reader = tokio::spawn(Arc::clone(self).read_loop(Arc::clone(sub), conn));
        sub.set_reader(reader);
        Ok(())
    }

    /// Keep re-dialing `sub` in the background.
    fn spawn_recovery(self: &Arc<Self>, sub: Arc<Subclient>) {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            let retries = client.config.connect_retries;
            if client.dial_with_retries(&sub, retries).await {
                info!(address = %sub.address(), "Subclient recovered");
            }
        });
    }

    /// Re-dial every disconnected subclient once.
    ///
    /// Partial recovery counts as success.
    pub async fn reconnect(self: &Arc<Self>) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::client_closed());
        }

        let down: Vec<Arc<Subclient>> = self
            .subclients
            .values()
            .filter(|s| !s.is_connected())
            .cloned()
            .collect();
        if down.is_empty() {
            return Ok(());
        }

        let mut restored = 0usize;
        let mut last_error = None;
        for sub in &down {
            match self.dial_once(sub).await {
                Ok(()) => restored += 1,
                Err(err) => last_error = Some(err),
            }
        }

        if restored == 0 {
            let reason = last_error.map_or_else(|| "unknown".to_string(), |e| e.to_string());
            return Err(SessionError::ReconnectFailed(reason));
        }
        info!(address = %self.address(), restored, down = down.len(), "Client reconnected");
        Ok(())
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    async fn read_loop(self: Arc<Self>, sub: Arc<Subclient>, conn: Arc<dyn NodeConnection>) {
        loop {
            match conn.next_message(&self.cancel).await {
                Ok(Some(message)) => {
                    if !self.accept(message).await {
                        return;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    debug!(address = %sub.address(), error = %err, "Subclient read failed");
                    break;
                }
            }
        }

        if self.is_closed() || sub.is_closed() {
            return;
        }
        if sub.detach(&conn) {
            conn.close().await;
            warn!(address = %sub.address(), subclient = sub.index(), "Subclient connection lost");
            self.spawn_recovery(sub);
        }
    }

    /// Deduplicate, route replies, and queue the rest.
    ///
    /// Returns `false` once the client is closing.
    async fn accept(&self, mut message: InboundMessage) -> bool {
        let (src, _) = remove_identifier(&message.src);
        message.src = src;

        if !self.dedup.first_seen(message.message_id) {
            trace!(message_id = %message.message_id, "Duplicate message dropped");
            return true;
        }

        if let Some(reply_to) = message.reply_to {
            match self.pending.complete(reply_to, message) {
                Ok(()) => return true,
                Err(unclaimed) => message = unclaimed,
            }
        }

        tokio::select! {
            _ = self.cancel.cancelled() => false,
            queued = self.message_tx.send(message) => queued.is_ok(),
        }
    }

    /// Connect notices queued and not yet read.
    pub fn queued_connect_notices(&self) -> usize {
        self.connect_tx.max_capacity() - self.connect_tx.capacity()
    }

    /// Next connect notification; `None` once closed.
    pub async fn next_connect(&self) -> Option<ConnectNotice> {
        if self.is_closed() {
            return None;
        }
        let mut rx = self.connect_rx.lock().await;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            notice = rx.recv() => notice,
        }
    }

    /// Next merged inbound message.
    ///
    /// `Ok(None)` when `wait` expires, `Err(StreamTerminated)` once closed.
    pub async fn next_message(
        &self,
        wait: Option<Duration>,
    ) -> Result<Option<InboundMessage>, SessionError> {
        if self.is_closed() {
            return Err(SessionError::StreamTerminated);
        }

        let receive = async {
            let mut rx = self.message_rx.lock().await;
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(SessionError::StreamTerminated),
                message = rx.recv() => message.map(Some).ok_or(SessionError::StreamTerminated),
            }
        };

        match wait {
            Some(wait) => match tokio::time::timeout(wait, receive).await {
                Ok(result) => result,
                Err(_) => Ok(None),
            },
            None => receive.await,
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Send through every connected subclient.
    ///
    /// Returns a reply waiter unless `config.no_reply`.
    pub async fn send(
        &self,
        dests: &[String],
        payload: Vec<u8>,
        config: &MessageConfig,
    ) -> Result<Option<ReplyWaiter>, SessionError> {
        let dests = dedup_destinations(dests);
        invariant_destinations(&dests)?;
        if self.is_closed() {
            return Err(SessionError::client_closed());
        }

        // Registered before transmitting so a fast reply finds its waiter.
        let waiter = (!config.no_reply).then(|| self.pending.register(config.message_id));

        match self.transmit(&dests, payload, config, None).await {
            Ok(delivered) => {
                debug!(
                    address = %self.address(),
                    message_id = %config.message_id,
                    dests = dests.len(),
                    delivered,
                    "Message sent"
                );
                Ok(waiter)
            }
            Err(err) => {
                if waiter.is_some() {
                    self.pending.remove(&config.message_id);
                }
                Err(err)
            }
        }
    }

    /// Answer message `reply_to` received from `dest`.
    pub async fn reply(
        &self,
        dest: &str,
        reply_to: MessageId,
        payload: Vec<u8>,
        encrypted: bool,
        max_holding_seconds: u32,
    ) -> Result<MessageId, SessionError> {
        if self.is_closed() {
            return Err(SessionError::client_closed());
        }
        let config = MessageConfig {
            max_holding_seconds,
            no_reply: true,
            message_id: MessageId::random(),
            encrypted,
            message_type: MessageType::Text,
        };
        let dests = dedup_destinations(&[dest.to_string()]);
        invariant_destinations(&dests)?;
        self.transmit(&dests, payload, &config, Some(reply_to)).await?;
        Ok(config.message_id)
    }

    /// Send to every subscriber of `topic`. No acknowledgement is awaited.
    pub async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        config: &PublishConfig,
    ) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::client_closed());
        }

        let query = SubscribersQuery {
            topic: topic.to_string(),
            offset: config.offset,
            limit: config.limit,
            meta: false,
            tx_pool: config.tx_pool,
            subscriber_hash_prefix: Vec::new(),
        };
        let subscribers = self
            .ports
            .chain
            .subscribers(&query)
            .await
            .map_err(|e| SessionError::PublishFailed(e.to_string()))?;

        let dests = subscribers.addresses(config.tx_pool);
        if dests.is_empty() {
            debug!(topic, "Publish with no subscribers");
            return Ok(());
        }

        let message = MessageConfig {
            max_holding_seconds: config.max_holding_seconds,
            no_reply: true,
            message_id: config.message_id,
            encrypted: true,
            message_type: MessageType::Text,
        };
        self.transmit(&dests, payload, &message, None)
            .await
            .map(|_| ())
            .map_err(|e| SessionError::PublishFailed(e.to_string()))
    }

    /// Hand one packet per connected subclient to its node.
    async fn transmit(
        &self,
        dests: &[String],
        payload: Vec<u8>,
        config: &MessageConfig,
        reply_to: Option<MessageId>,
    ) -> Result<usize, SessionError> {
        let mut attempted = 0usize;
        let mut delivered = 0usize;
        let mut last_error = None;

        for sub in self.subclients.values() {
            let Some(conn) = sub.connection() else {
                continue;
            };
            attempted += 1;

            let packet = OutboundPacket {
                dests: dests.iter().map(|d| add_identifier(d, sub.index())).collect(),
                data: payload.clone(),
                message_type: config.message_type,
                encrypted: config.encrypted,
                message_id: config.message_id,
                reply_to,
                no_reply: config.no_reply,
                max_holding_seconds: config.max_holding_seconds,
            };
            match conn.send(packet).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    debug!(address = %sub.address(), error = %err, "Subclient send failed");
                    last_error = Some(err);
                }
            }
        }

        if attempted == 0 {
            return Err(SessionError::SendFailed("no connected subclient".to_string()));
        }
        if delivered == 0 {
            let reason = last_error.map_or_else(|| "unknown".to_string(), |e| e.to_string());
            return Err(SessionError::SendFailed(reason));
        }
        Ok(delivered)
    }

    // =========================================================================
    // Chain pass-throughs
    // =========================================================================

    /// Subscribe `identifier` of this account to `topic`.
    pub async fn subscribe(
        &self,
        identifier: &str,
        topic: &str,
        duration: u64,
        meta: &str,
        tx: &TransactionConfig,
    ) -> Result<String, SessionError> {
        self.ports
            .chain
            .subscribe(self.account.as_ref(), identifier, topic, duration, meta, tx)
            .await
    }

    /// Unsubscribe `identifier` of this account from `topic`.
    pub async fn unsubscribe(
        &self,
        identifier: &str,
        topic: &str,
        tx: &TransactionConfig,
    ) -> Result<String, SessionError> {
        self.ports
            .chain
            .unsubscribe(self.account.as_ref(), identifier, topic, tx)
            .await
    }

    /// Subscribers of a topic.
    pub async fn subscribers(&self, query: &SubscribersQuery) -> Result<Subscribers, SessionError> {
        self.ports.chain.subscribers(query).await
    }

    /// Number of subscribers of a topic.
    pub async fn subscribers_count(
        &self,
        topic: &str,
        subscriber_hash_prefix: &[u8],
    ) -> Result<u64, SessionError> {
        self.ports
            .chain
            .subscribers_count(topic, subscriber_hash_prefix)
            .await
    }

    /// One subscription record.
    pub async fn subscription(
        &self,
        topic: &str,
        subscriber: &str,
    ) -> Result<SubscriptionInfo, SessionError> {
        self.ports.chain.subscription(topic, subscriber).await
    }

    /// Current block height.
    pub async fn height(&self) -> Result<u64, SessionError> {
        self.ports.chain.height().await
    }

    /// Nonce of `address`, or of this account's wallet when absent or empty.
    pub async fn nonce(&self, address: Option<&str>, tx_pool: bool) -> Result<u64, SessionError> {
        let own;
        let address = match address.filter(|a| !a.is_empty()) {
            Some(address) => address,
            None => {
                own = self.account.wallet_address();
                own.as_str()
            }
        };
        self.ports.chain.nonce(address, tx_pool).await
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Close the client. Idempotent.
    ///
    /// Unblocks every pending receive and fails every reply waiter.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        for sub in self.subclients.values() {
            sub.close().await;
        }
        self.pending.clear();
        info!(address = %self.address(), "Client closed");
    }
}

/// Configured seeds plus resolver-provided seeds, deduplicated.
async fn resolve_seeds(config: &ClientConfig, ports: &SessionPorts) -> Vec<String> {
    let mut seeds = config.seed_rpc_servers.clone();
    for entry in &config.resolvers {
        let Some(resolver) = ports.resolvers.build(entry) else {
            warn!(?entry, "Skipping unusable resolver entry");
            continue;
        };
        match resolver.resolve_seeds().await {
            Ok(extra) => seeds.extend(extra),
            Err(err) => warn!(resolver = resolver.name(), error = %err, "Resolver failed"),
        }
    }
    dedup_destinations(&seeds)
}
