//! # Event Pump
//!
//! Per-generation workers turning client activity into sink events.
//!
//! ```text
//!  connect worker ──┐  bounded   ┌───────────┐
//!                   ├──────────→ │ forwarder │ ──→ SingleSlotSink
//!  message worker ──┘  channel   └───────────┘
//!        │
//!        └─ housekeeping (own interval): evict the oldest stale generation
//! ```
//!
//! Workers look their client up in the registry by address and generation,
//! so a generation removed from the registry stops its worker.

use crate::algorithms::pick_stale_generation;
use crate::application::multi_client::MultiClient;
use crate::application::registry::SessionRegistry;
use crate::config::SessionServiceConfig;
use crate::domain::{unix_now, ConnectNotice, Generation, SessionError};
use shared_bus::{ClientEvent, ConnectEvent, ErrorEvent, EventPublisher, MessageEvent, SingleSlotSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Timing and limits used by the workers.
#[derive(Clone, Debug)]
pub struct PumpSettings {
    /// Receive wait of the message worker.
    pub message_poll_interval: Duration,
    /// Interval between housekeeping checks.
    pub housekeeping_interval: Duration,
    /// Generations kept before eviction applies.
    pub max_generations: usize,
    /// Minimum age of an evictable generation, in seconds.
    pub stale_generation_age_secs: u64,
    /// Per-generation event queue depth.
    pub event_channel_capacity: usize,
}

impl From<&SessionServiceConfig> for PumpSettings {
    fn from(config: &SessionServiceConfig) -> Self {
        Self {
            message_poll_interval: config.message_poll_interval(),
            housekeeping_interval: config.housekeeping_interval(),
            max_generations: config.max_generations,
            stale_generation_age_secs: config.stale_generation_age_secs,
            event_channel_capacity: config.event_channel_capacity.max(1),
        }
    }
}

/// Task handles of one generation's pump.
pub struct GenerationPump {
    connect: JoinHandle<()>,
    message: JoinHandle<()>,
    forwarder: JoinHandle<()>,
}

impl GenerationPump {
    /// Whether the message worker is still running.
    pub fn is_running(&self) -> bool {
        !self.message.is_finished()
    }

    /// Whether the connect worker has finished.
    pub fn connect_done(&self) -> bool {
        self.connect.is_finished()
    }

    /// Stop every task.
    pub fn abort(&self) {
        self.connect.abort();
        self.message.abort();
        self.forwarder.abort();
    }
}

/// Spawns generation pumps feeding one sink.
pub struct EventPump {
    registry: Arc<SessionRegistry>,
    sink: Arc<SingleSlotSink>,
    settings: PumpSettings,
}

impl EventPump {
    /// Create a pump over `registry` publishing to `sink`.
    pub fn new(
        registry: Arc<SessionRegistry>,
        sink: Arc<SingleSlotSink>,
        settings: PumpSettings,
    ) -> Self {
        Self {
            registry,
            sink,
            settings,
        }
    }

    /// Pump settings.
    pub fn settings(&self) -> &PumpSettings {
        &self.settings
    }

    /// Start the connect worker, message worker and forwarder of a generation.
    pub fn spawn(&self, address: &str, generation: Generation) -> GenerationPump {
        let (tx, mut rx) = mpsc::channel::<ClientEvent>(self.settings.event_channel_capacity);

        let sink = Arc::clone(&self.sink);
        let forwarder = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                sink.publish(event);
            }
        });

        let connect = tokio::spawn(connect_worker(
            Arc::clone(&self.registry),
            address.to_string(),
            generation,
            tx.clone(),
        ));

        let message = tokio::spawn(message_worker(
            Arc::clone(&self.registry),
            address.to_string(),
            generation,
            tx,
            self.settings.clone(),
        ));

        debug!(address, %generation, "Event pump started");
        GenerationPump {
            connect,
            message,
            forwarder,
        }
    }

    /// Run one housekeeping check for `address`.
    pub async fn housekeep(&self, address: &str) -> Option<Generation> {
        housekeep(&self.registry, address, &self.settings).await
    }
}

/// Close and remove the oldest generation of `address` if it is stale.
async fn housekeep(
    registry: &SessionRegistry,
    address: &str,
    settings: &PumpSettings,
) -> Option<Generation> {
    let generations = registry.generations(address);
    let victim = pick_stale_generation(
        &generations,
        unix_now(),
        settings.max_generations,
        settings.stale_generation_age_secs,
    )?;
    let client = registry.remove_one(address, victim)?;
    info!(
        address,
        generation = %victim,
        remaining = generations.len() - 1,
        "Evicting stale generation"
    );
    client.close().await;
    Some(victim)
}

/// Connect and message events carry the client's own address; errors carry
/// the registry address.
fn connect_event(client: &MultiClient, notice: &ConnectNotice) -> ClientEvent {
    ClientEvent::Connect(ConnectEvent::new(
        client.address(),
        notice.node.to_info(),
        client.address(),
        client.rpc_servers(),
    ))
}

fn error_event(address: &str, err: &SessionError) -> ClientEvent {
    ClientEvent::Error(ErrorEvent::new(address, err.code(), err.to_string()))
}

/// Report the first connect of a generation, then exit.
async fn connect_worker(
    registry: Arc<SessionRegistry>,
    address: String,
    generation: Generation,
    events: mpsc::Sender<ClientEvent>,
) {
    let Some(client) = registry.get(&address, generation) else {
        return;
    };
    if client.is_closed() {
        return;
    }

    match client.next_connect().await {
        Some(notice) => {
            let event = connect_event(&client, &notice);
            let _ = events.send(event).await;
        }
        None if client.is_closed() => {}
        None => {
            let _ = events
                .send(error_event(&address, &SessionError::StreamTerminated))
                .await;
        }
    }
}

/// Forward messages of a generation until it is closed or removed.
async fn message_worker(
    registry: Arc<SessionRegistry>,
    address: String,
    generation: Generation,
    events: mpsc::Sender<ClientEvent>,
    settings: PumpSettings,
) {
    let mut housekeeping = tokio::time::interval(settings.housekeeping_interval);
    housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let Some(client) = registry.get(&address, generation) else {
            debug!(address = %address, %generation, "Generation gone, message worker exiting");
            return;
        };
        if client.is_closed() {
            registry.remove_one(&address, generation);
            debug!(address = %address, %generation, "Generation closed, message worker exiting");
            return;
        }

        tokio::select! {
            _ = housekeeping.tick() => {
                housekeep(&registry, &address, &settings).await;
            }
            received = client.next_message(Some(settings.message_poll_interval)) => match received {
                Ok(Some(message)) => {
                    let event = ClientEvent::Message(MessageEvent::new(
                        client.address(),
                        message.to_event_data(),
                    ));
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(_) if client.is_closed() => {
                    registry.remove_one(&address, generation);
                    return;
                }
                Err(err) => {
                    warn!(address = %address, %generation, error = %err, "Message worker failed");
                    let _ = events.send(error_event(&address, &err)).await;
                    return;
                }
            }
        }
    }
}
