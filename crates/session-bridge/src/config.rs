//! # Bridge Configuration
//!
//! Runtime settings with `MC_*` environment overrides.

use mc_session::SessionServiceConfig;
use std::time::Duration;
use tracing::warn;

/// Log filter used when `MC_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// In-memory nodes started when `MC_NODES` is unset.
pub const DEFAULT_NODES: usize = 4;

/// Time a chain transaction spends in the pool.
pub const DEFAULT_CHAIN_PROPAGATION: Duration = Duration::from_secs(1);

/// Complete bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// `tracing` filter directive.
    pub log_filter: String,
    /// Nodes in the in-memory network.
    pub nodes: usize,
    /// Chain transaction propagation delay.
    pub chain_propagation: Duration,
    /// Session core settings.
    pub service: SessionServiceConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            nodes: DEFAULT_NODES,
            chain_propagation: DEFAULT_CHAIN_PROPAGATION,
            service: SessionServiceConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(filter) = var("MC_LOG").filter(|f| !f.is_empty()) {
            config.log_filter = filter;
        }
        if let Some(nodes) = var("MC_NODES") {
            match nodes.parse::<usize>() {
                Ok(n) if n > 0 => config.nodes = n,
                _ => warn!(value = %nodes, "MC_NODES must be a positive integer"),
            }
        }
        if let Some(limit) = var("MC_MAX_CONCURRENT_REQUESTS") {
            match limit.parse::<usize>() {
                Ok(n) if n > 0 => config.service.max_concurrent_requests = n,
                _ => warn!(value = %limit, "MC_MAX_CONCURRENT_REQUESTS must be a positive integer"),
            }
        }
        config
    }
}
