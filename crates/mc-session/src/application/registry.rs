//! # Session Registry
//!
//! Address → generation → client. Backed by a sharded map so operations on
//! one address lock only that address's shard; readers always see a fully
//! formed per-address map.
//!
//! The registry never closes clients: `remove_all` detaches and hands the
//! clients back so teardown I/O happens outside any lock.

use crate::application::multi_client::MultiClient;
use crate::domain::Generation;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of live client generations.
#[derive(Default)]
pub struct SessionRegistry {
    clients: DashMap<String, BTreeMap<Generation, Arc<MultiClient>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `client` under `address` / `generation`. Last writer wins.
    pub fn put(&self, address: &str, generation: Generation, client: Arc<MultiClient>) {
        let previous = self
            .clients
            .entry(address.to_string())
            .or_default()
            .insert(generation, client);
        if previous.is_some() {
            debug!(address, %generation, "Overwrote registered generation");
        }
    }

    /// Client at `address` / `generation`.
    pub fn get(&self, address: &str, generation: Generation) -> Option<Arc<MultiClient>> {
        self.clients
            .get(address)
            .and_then(|gens| gens.get(&generation).cloned())
    }

    /// Snapshot of every generation under `address`.
    pub fn get_all(&self, address: &str) -> BTreeMap<Generation, Arc<MultiClient>> {
        self.clients
            .get(address)
            .map(|gens| gens.clone())
            .unwrap_or_default()
    }

    /// The newest generation under `address`, if it is still open.
    ///
    /// Older generations are never used as a fallback.
    pub fn get_latest_usable(&self, address: &str) -> Option<Arc<MultiClient>> {
        let gens = self.clients.get(address)?;
        let (_, latest) = gens.last_key_value()?;
        (!latest.is_closed()).then(|| Arc::clone(latest))
    }

    /// Detach every generation under `address` and return them.
    pub fn remove_all(&self, address: &str) -> Vec<Arc<MultiClient>> {
        self.clients
            .remove(address)
            .map(|(_, gens)| gens.into_values().collect())
            .unwrap_or_default()
    }

    /// Detach one generation.
    pub fn remove_one(&self, address: &str, generation: Generation) -> Option<Arc<MultiClient>> {
        let removed = {
            let mut gens = self.clients.get_mut(address)?;
            gens.remove(&generation)
        };
        self.clients.remove_if(address, |_, gens| gens.is_empty());
        removed
    }

    /// Number of generations under `address`.
    pub fn generation_count(&self, address: &str) -> usize {
        self.clients.get(address).map_or(0, |gens| gens.len())
    }

    /// Generation keys under `address`, oldest first.
    pub fn generations(&self, address: &str) -> Vec<Generation> {
        self.clients
            .get(address)
            .map(|gens| gens.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Every registered address.
    pub fn addresses(&self) -> Vec<String> {
        self.clients.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of registered addresses.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
