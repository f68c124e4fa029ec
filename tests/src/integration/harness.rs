//! # Test Harness
//!
//! A service wired to a fresh in-memory backend, plus polling helpers.

use mc_session::ports::{CreateRequest, CreateResponse};
use mc_session::{InMemoryBackend, MultiClient, SessionApi, SessionService, SessionServiceConfig};
use std::sync::Arc;
use std::time::Duration;

/// Default wait for asynchronous outcomes.
pub const WAIT: Duration = Duration::from_secs(5);

/// Service plus the backend behind its ports.
pub struct Harness {
    /// In-memory network and chain.
    pub backend: InMemoryBackend,
    /// Service under test.
    pub service: Arc<SessionService>,
}

impl Harness {
    /// Harness with `nodes` nodes and instant chain confirmation.
    pub fn new(nodes: usize) -> Self {
        Self::with_chain_delay(nodes, Duration::ZERO)
    }

    /// Harness whose chain confirms transactions after `delay`.
    pub fn with_chain_delay(nodes: usize, delay: Duration) -> Self {
        let backend = InMemoryBackend::new(nodes, delay);
        let service = Arc::new(SessionService::new(
            SessionServiceConfig::for_testing(),
            backend.ports(),
        ));
        Self { backend, service }
    }

    /// Create a client for seed byte `seed`.
    pub async fn create(&self, seed: u8) -> CreateResponse {
        self.service
            .create(create_request(seed))
            .await
            .expect("create should succeed")
    }

    /// Latest usable client under `address`.
    pub fn client(&self, address: &str) -> Arc<MultiClient> {
        self.service
            .registry()
            .get_latest_usable(address)
            .expect("client should be usable")
    }
}

/// Create request for a 32-byte seed filled with `seed`, fast backoff.
pub fn create_request(seed: u8) -> CreateRequest {
    CreateRequest {
        max_reconnect_interval: 50,
        ..CreateRequest::with_seed(&[seed; 32])
    }
}

/// Poll `condition` every 10 ms until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Deserialize a request from its wire arguments.
pub fn request<T: serde::de::DeserializeOwned>(args: serde_json::Value) -> T {
    serde_json::from_value(args).expect("request args should deserialize")
}
