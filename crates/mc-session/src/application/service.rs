//! # Session Service
//!
//! Application service implementing the [`SessionApi`] façade.
//!
//! Control operations (create, recreate, reconnect, close) serialize on one
//! async lock. Request operations share a bounded pool of permits and always
//! resolve the latest usable generation of their address.

use async_trait::async_trait;
use dashmap::DashMap;
use shared_bus::SingleSlotSink;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tracing::{debug, info};

use crate::algorithms::dedup_destinations;
use crate::application::event_pump::{EventPump, GenerationPump, PumpSettings};
use crate::application::multi_client::MultiClient;
use crate::application::registry::SessionRegistry;
use crate::config::{
    ClientConfig, MessageConfig, PublishConfig, ResolverConfig, SessionServiceConfig,
    TransactionConfig,
};
use crate::domain::{
    invariant_destinations, Generation, Identity, MessageId, SessionError, SubscribersQuery,
    SubscriptionInfo,
};
use crate::ports::{
    CreateRequest, CreateResponse, GetNonceRequest, GetSubscribersCountRequest,
    GetSubscribersRequest, GetSubscriptionRequest, MessageIdResponse, PublishTextRequest,
    ReplyTextRequest, SendTextRequest, SendTextResult, SessionApi, SessionPorts,
    SubscribeRequest, UnsubscribeRequest,
};

/// Lower bound of both reconnect backoff intervals.
const RECONNECT_INTERVAL_FLOOR_MS: u64 = 10;

/// Session Service - owns the registry, the event pump and the sink.
pub struct SessionService {
    /// Configuration.
    config: SessionServiceConfig,
    /// Outbound ports handed to every client.
    ports: SessionPorts,
    /// Live generations.
    registry: Arc<SessionRegistry>,
    /// Event sink shared by every generation.
    sink: Arc<SingleSlotSink>,
    /// Spawns per-generation workers.
    pump: EventPump,
    /// Running pumps by address and generation.
    pumps: DashMap<(String, Generation), GenerationPump>,
    /// Serializes control operations.
    control: Mutex<()>,
    /// Bounds concurrent request operations.
    requests: Semaphore,
}

impl SessionService {
    /// Create a service over `ports`.
    pub fn new(config: SessionServiceConfig, ports: SessionPorts) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let sink = Arc::new(SingleSlotSink::new());
        let pump = EventPump::new(
            Arc::clone(&registry),
            Arc::clone(&sink),
            PumpSettings::from(&config),
        );
        let requests = Semaphore::new(config.max_concurrent_requests.max(1));

        Self {
            config,
            ports,
            registry,
            sink,
            pump,
            pumps: DashMap::new(),
            control: Mutex::new(()),
            requests,
        }
    }

    /// The event sink consumers attach to.
    pub fn sink(&self) -> &Arc<SingleSlotSink> {
        &self.sink
    }

    /// The session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The event pump.
    pub fn pump(&self) -> &EventPump {
        &self.pump
    }

    /// Service configuration.
    pub fn config(&self) -> &SessionServiceConfig {
        &self.config
    }

    /// Whether the message worker of a generation is still running.
    pub fn pump_alive(&self, address: &str, generation: Generation) -> bool {
        self.pumps
            .get(&(address.to_string(), generation))
            .is_some_and(|pump| pump.is_running())
    }

    /// Close every client and stop every worker. Further requests fail.
    pub async fn shutdown(&self) {
        let _control = self.control.lock().await;
        self.requests.close();

        for address in self.registry.addresses() {
            for client in self.registry.remove_all(&address) {
                client.close().await;
            }
        }
        for pump in self.pumps.iter() {
            pump.abort();
        }
        self.pumps.clear();
        info!("Session service shut down");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn permit(&self) -> Result<SemaphorePermit<'_>, SessionError> {
        self.requests
            .acquire()
            .await
            .map_err(|_| SessionError::NotFound("service is shut down".to_string()))
    }

    fn usable(&self, id: &str) -> Result<Arc<MultiClient>, SessionError> {
        self.registry
            .get_latest_usable(id)
            .ok_or_else(SessionError::client_closed)
    }

    /// Per-client config from the baseline plus the request's overrides.
    fn client_config(&self, request: &CreateRequest) -> ClientConfig {
        let mut config = self.config.client.clone();
        if let Some(seeds) = request.seed_rpc.as_ref().filter(|s| !s.is_empty()) {
            config.seed_rpc_servers = seeds.clone();
        }
        config.connect_retries = ClientConfig::retries_from_wire(request.connect_retries);
        config.max_reconnect_interval_ms = request
            .max_reconnect_interval
            .max(RECONNECT_INTERVAL_FLOOR_MS);
        config.min_reconnect_interval_ms = config
            .min_reconnect_interval_ms
            .clamp(RECONNECT_INTERVAL_FLOOR_MS, config.max_reconnect_interval_ms);

        let mut resolvers = ResolverConfig::parse_eth(&request.eth_resolver_config_array);
        resolvers.extend(ResolverConfig::parse_dns(&request.dns_resolver_config_array));
        config.resolvers = resolvers;
        config
    }

    /// Build a client from `request` and register it.
    ///
    /// `register_as` names the registry address; the client's own address is
    /// used when absent, after closing the generations already under it.
    async fn open_generation(
        &self,
        request: CreateRequest,
        register_as: Option<&str>,
    ) -> Result<CreateResponse, SessionError> {
        let seed = request
            .seed
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(SessionError::params)?;
        let seed = hex::decode(seed)
            .map_err(|e| SessionError::InvalidParams(format!("invalid seed: {e}")))?;
        let account = self.ports.accounts.from_seed(&seed)?;

        if register_as.is_none() {
            let address = Identity::derive(&account.public_key(), &request.identifier)
                .address()
                .to_string();
            let previous = self.registry.remove_all(&address);
            if !previous.is_empty() {
                debug!(address = %address, count = previous.len(), "Closing previous generations");
            }
            for client in previous {
                client.close().await;
            }
        }

        let config = self.client_config(&request);
        let client = MultiClient::create(
            account,
            &request.identifier,
            request.num_sub_clients,
            config,
            self.ports.clone(),
        )
        .await?;

        let key = register_as.unwrap_or(client.address()).to_string();
        let generation = Generation::now();
        self.registry.put(&key, generation, Arc::clone(&client));
        self.spawn_pump(&key, generation);

        info!(
            address = %key,
            %generation,
            generations = self.registry.generation_count(&key),
            "Generation registered"
        );
        Ok(CreateResponse {
            address: client.address().to_string(),
            public_key: client.public_key_hex(),
            seed: hex::encode(client.seed()),
        })
    }

    fn spawn_pump(&self, address: &str, generation: Generation) {
        self.pumps.retain(|_, pump| pump.is_running());
        let pump = self.pump.spawn(address, generation);
        self.pumps.insert((address.to_string(), generation), pump);
    }
}

/// Decode a hex subscriber hash prefix; absent or empty means no filter.
fn hash_prefix(prefix: Option<&str>) -> Result<Vec<u8>, SessionError> {
    match prefix.filter(|p| !p.is_empty()) {
        Some(prefix) => hex::decode(prefix).map_err(|e| {
            SessionError::InvalidParams(format!("invalid subscriberHashPrefix: {e}"))
        }),
        None => Ok(Vec::new()),
    }
}

#[async_trait]
impl SessionApi for SessionService {
    async fn create(&self, request: CreateRequest) -> Result<CreateResponse, SessionError> {
        let _control = self.control.lock().await;
        self.open_generation(request, None).await
    }

    async fn recreate(&self, request: CreateRequest) -> Result<CreateResponse, SessionError> {
        if request.id.is_empty() {
            return Err(SessionError::params());
        }
        let _control = self.control.lock().await;
        let id = request.id.clone();
        self.open_generation(request, Some(&id)).await
    }

    async fn reconnect(&self, id: &str) -> Result<(), SessionError> {
        let _control = self.control.lock().await;
        self.usable(id)?.reconnect().await
    }

    async fn close(&self, id: &str) -> Result<(), SessionError> {
        let _control = self.control.lock().await;
        self.usable(id)?;
        let clients = self.registry.remove_all(id);
        for client in &clients {
            client.close().await;
        }
        info!(address = id, generations = clients.len(), "Address closed");
        Ok(())
    }

    async fn reply_text(&self, request: ReplyTextRequest) -> Result<(), SessionError> {
        if request.dest.is_empty() || request.data.is_empty() {
            return Err(SessionError::params());
        }
        let reply_to = request
            .message_id
            .as_deref()
            .and_then(MessageId::from_slice)
            .ok_or_else(|| SessionError::InvalidParams("invalid messageId".to_string()))?;

        let _permit = self.permit().await?;
        let client = self.usable(&request.id)?;
        client
            .reply(
                &request.dest,
                reply_to,
                request.data.into_bytes(),
                request.encrypted,
                MessageConfig::holding_from_wire(request.max_holding_seconds),
            )
            .await?;
        Ok(())
    }

    async fn send_text(&self, request: SendTextRequest) -> Result<SendTextResult, SessionError> {
        if request.data.is_empty() {
            return Err(SessionError::params());
        }
        let dests = dedup_destinations(&request.dests);
        invariant_destinations(&dests)?;

        let _permit = self.permit().await?;
        let client = self.usable(&request.id)?;

        let config = MessageConfig {
            max_holding_seconds: MessageConfig::holding_from_wire(request.max_holding_seconds),
            ..MessageConfig::text(request.no_reply)
        };
        let message_id = config.message_id;

        match client.send(&dests, request.data.into_bytes(), &config).await? {
            Some(waiter) => {
                let timeout = match request.timeout {
                    0 => self.config.default_send_timeout(),
                    ms => Duration::from_millis(ms),
                };
                let reply = waiter.wait(timeout).await?;
                Ok(SendTextResult::Reply(reply.to_event_data()))
            }
            None => Ok(SendTextResult::Sent(MessageIdResponse {
                message_id: message_id.to_vec(),
            })),
        }
    }

    async fn publish_text(
        &self,
        request: PublishTextRequest,
    ) -> Result<MessageIdResponse, SessionError> {
        if request.topic.is_empty() || request.data.is_empty() {
            return Err(SessionError::params());
        }
        let _permit = self.permit().await?;
        let client = self.usable(&request.id)?;

        let config = PublishConfig {
            max_holding_seconds: MessageConfig::holding_from_wire(request.max_holding_seconds),
            tx_pool: request.tx_pool,
            offset: request.offset,
            limit: request.limit,
            message_id: MessageId::random(),
        };
        client
            .publish(&request.topic, request.data.into_bytes(), &config)
            .await?;
        Ok(MessageIdResponse {
            message_id: config.message_id.to_vec(),
        })
    }

    async fn subscribe(&self, request: SubscribeRequest) -> Result<String, SessionError> {
        if request.topic.is_empty() {
            return Err(SessionError::params());
        }
        let _permit = self.permit().await?;
        let client = self.usable(&request.id)?;

        let tx = TransactionConfig {
            fee: request.fee,
            nonce: request.nonce,
        };
        client
            .subscribe(
                &request.identifier,
                &request.topic,
                request.duration,
                &request.meta,
                &tx,
            )
            .await
    }

    async fn unsubscribe(&self, request: UnsubscribeRequest) -> Result<String, SessionError> {
        if request.topic.is_empty() {
            return Err(SessionError::params());
        }
        let _permit = self.permit().await?;
        let client = self.usable(&request.id)?;

        let tx = TransactionConfig {
            fee: request.fee,
            nonce: request.nonce,
        };
        client
            .unsubscribe(&request.identifier, &request.topic, &tx)
            .await
    }

    async fn get_subscribers(
        &self,
        request: GetSubscribersRequest,
    ) -> Result<BTreeMap<String, String>, SessionError> {
        if request.topic.is_empty() {
            return Err(SessionError::params());
        }
        let prefix = hash_prefix(request.subscriber_hash_prefix.as_deref())?;
        let _permit = self.permit().await?;
        let client = self.usable(&request.id)?;

        let query = SubscribersQuery {
            topic: request.topic,
            offset: request.offset,
            limit: request.limit,
            meta: request.meta,
            tx_pool: request.tx_pool,
            subscriber_hash_prefix: prefix,
        };
        let subscribers = client.subscribers(&query).await?;
        Ok(subscribers.merged(query.tx_pool))
    }

    async fn get_subscribers_count(
        &self,
        request: GetSubscribersCountRequest,
    ) -> Result<u64, SessionError> {
        if request.topic.is_empty() {
            return Err(SessionError::params());
        }
        let prefix = hash_prefix(request.subscriber_hash_prefix.as_deref())?;
        let _permit = self.permit().await?;
        let client = self.usable(&request.id)?;
        client.subscribers_count(&request.topic, &prefix).await
    }

    async fn get_subscription(
        &self,
        request: GetSubscriptionRequest,
    ) -> Result<SubscriptionInfo, SessionError> {
        if request.topic.is_empty() || request.subscriber.is_empty() {
            return Err(SessionError::params());
        }
        let _permit = self.permit().await?;
        let client = self.usable(&request.id)?;
        client.subscription(&request.topic, &request.subscriber).await
    }

    async fn get_height(&self, id: &str) -> Result<u64, SessionError> {
        let _permit = self.permit().await?;
        self.usable(id)?.height().await
    }

    async fn get_nonce(&self, request: GetNonceRequest) -> Result<u64, SessionError> {
        let _permit = self.permit().await?;
        let client = self.usable(&request.id)?;
        client
            .nonce(request.address.as_deref(), request.tx_pool)
            .await
    }
}
