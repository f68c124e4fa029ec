//! # Static Resolver Adapter
//!
//! Resolvers that contribute the endpoint named in their own config entry.

use crate::config::ResolverConfig;
use crate::domain::SessionError;
use crate::ports::{Resolver, ResolverFactory};
use async_trait::async_trait;
use std::sync::Arc;

/// Resolver returning a fixed seed list.
pub struct StaticResolver {
    name: String,
    seeds: Vec<String>,
}

#[async_trait]
impl Resolver for StaticResolver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve_seeds(&self) -> Result<Vec<String>, SessionError> {
        Ok(self.seeds.clone())
    }
}

/// Builds [`StaticResolver`]s from config entries.
#[derive(Clone, Debug, Default)]
pub struct StaticResolverFactory;

impl ResolverFactory for StaticResolverFactory {
    fn build(&self, config: &ResolverConfig) -> Option<Arc<dyn Resolver>> {
        let (name, endpoint) = match config {
            ResolverConfig::Eth { rpc_server, .. } => ("eth".to_string(), rpc_server.clone()),
            ResolverConfig::Dns { dns_server } => ("dns".to_string(), dns_server.clone()),
        };
        if endpoint.is_empty() {
            return None;
        }
        let seed = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint
        } else {
            format!("http://{endpoint}")
        };
        Some(Arc::new(StaticResolver {
            name,
            seeds: vec![seed],
        }))
    }
}
