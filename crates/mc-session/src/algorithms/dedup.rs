//! # Destination and Endpoint Deduplication
//!
//! Order-preserving deduplication for send destinations and connect-event
//! RPC endpoint lists.

use std::collections::HashSet;

/// Deduplicate destinations, keeping first-seen order. Empty entries are dropped.
#[must_use]
pub fn dedup_destinations(dests: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(dests.len());
    dests
        .iter()
        .filter(|d| !d.is_empty())
        .filter(|d| seen.insert(d.as_str()))
        .cloned()
        .collect()
}

/// Build the `http://`-prefixed RPC endpoint list of a client's nodes.
///
/// Empty addresses are skipped; duplicates keep their first position.
#[must_use]
pub fn collect_rpc_servers<'a, I>(rpc_addresses: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut servers: Vec<String> = Vec::new();
    for addr in rpc_addresses {
        if addr.is_empty() {
            continue;
        }
        let server = format!("http://{addr}");
        if !servers.contains(&server) {
            servers.push(server);
        }
    }
    servers
}
