//! # In-Memory Chain
//!
//! Chain RPC double with a transaction pool. Submitted transactions stay in
//! the pool for `propagation_delay`, then each is confirmed in its own block.

use crate::config::TransactionConfig;
use crate::domain::{make_address, SessionError, Subscribers, SubscribersQuery, SubscriptionInfo};
use crate::ports::{Account, ChainClient};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Clone, Debug)]
enum TxOp {
    Subscribe {
        topic: String,
        subscriber: String,
        meta: String,
        duration: u64,
    },
    Unsubscribe {
        topic: String,
        subscriber: String,
    },
}

#[derive(Clone, Debug)]
struct PendingTx {
    sender: String,
    nonce: u64,
    submitted_at: Instant,
    op: TxOp,
}

#[derive(Default)]
struct ChainState {
    height: u64,
    /// Next confirmed nonce per wallet.
    nonces: HashMap<String, u64>,
    pool: Vec<PendingTx>,
    topics: HashMap<String, BTreeMap<String, SubscriptionInfo>>,
}

impl ChainState {
    /// Confirm every pool transaction older than `delay`.
    fn settle(&mut self, now: Instant, delay: Duration) {
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pool)
            .into_iter()
            .partition(|tx| now.duration_since(tx.submitted_at) >= delay);
        self.pool = waiting;

        for tx in ready {
            self.height += 1;
            let next = self.nonces.entry(tx.sender.clone()).or_default();
            *next = (*next).max(tx.nonce + 1);

            match tx.op {
                TxOp::Subscribe {
                    topic,
                    subscriber,
                    meta,
                    duration,
                } => {
                    let expires_at = self.height + duration;
                    self.topics
                        .entry(topic)
                        .or_default()
                        .insert(subscriber, SubscriptionInfo { meta, expires_at });
                }
                TxOp::Unsubscribe { topic, subscriber } => {
                    if let Some(subs) = self.topics.get_mut(&topic) {
                        subs.remove(&subscriber);
                    }
                }
            }
        }
    }

    fn next_nonce(&self, address: &str, tx_pool: bool) -> u64 {
        let confirmed = self.nonces.get(address).copied().unwrap_or(0);
        if !tx_pool {
            return confirmed;
        }
        self.pool
            .iter()
            .filter(|tx| tx.sender == address)
            .map(|tx| tx.nonce + 1)
            .fold(confirmed, u64::max)
    }

    /// Drop expired subscriptions.
    fn expire(&mut self) {
        let height = self.height;
        for subs in self.topics.values_mut() {
            subs.retain(|_, info| info.expires_at == 0 || info.expires_at > height);
        }
    }
}

/// In-memory chain client.
pub struct MemoryChain {
    state: Mutex<ChainState>,
    propagation_delay: Duration,
}

impl MemoryChain {
    /// Chain whose transactions confirm after `propagation_delay`.
    pub fn new(propagation_delay: Duration) -> Self {
        Self {
            state: Mutex::new(ChainState::default()),
            propagation_delay,
        }
    }

    /// Chain whose transactions confirm on the next read.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Transactions still in the pool.
    pub fn pool_size(&self) -> usize {
        self.state.lock().pool.len()
    }

    fn with_settled<T>(&self, f: impl FnOnce(&mut ChainState) -> T) -> T {
        let mut state = self.state.lock();
        state.settle(Instant::now(), self.propagation_delay);
        state.expire();
        f(&mut state)
    }

    fn submit(
        &self,
        account: &dyn Account,
        kind: &str,
        op: TxOp,
        tx: &TransactionConfig,
    ) -> Result<String, SessionError> {
        let sender = account.wallet_address();
        let public_key = account.public_key();

        self.with_settled(|state| {
            let confirmed = state.nonces.get(&sender).copied().unwrap_or(0);
            let nonce = match tx.nonce {
                Some(nonce) if nonce < confirmed => {
                    return Err(SessionError::ChainError(format!(
                        "nonce {nonce} is too low, expected at least {confirmed}"
                    )));
                }
                Some(nonce) => nonce,
                None => state.next_nonce(&sender, true),
            };

            let payload = format!("{kind}:{sender}:{nonce}:{}:{op:?}", tx.fee);
            let signature = account.sign(payload.as_bytes());
            let mut hasher = Sha256::new();
            hasher.update(&public_key);
            hasher.update(&signature);
            let hash = hex::encode(hasher.finalize());

            debug!(kind, sender = %sender, nonce, tx = %hash, "Transaction submitted");
            state.pool.push(PendingTx {
                sender: sender.clone(),
                nonce,
                submitted_at: Instant::now(),
                op,
            });
            Ok(hash)
        })
    }
}

/// Whether `subscriber` matches a subscriber hash prefix.
fn matches_prefix(subscriber: &str, prefix: &[u8]) -> bool {
    prefix.is_empty() || Sha256::digest(subscriber.as_bytes()).starts_with(prefix)
}

#[async_trait]
impl ChainClient for MemoryChain {
    async fn height(&self) -> Result<u64, SessionError> {
        Ok(self.with_settled(|state| state.height))
    }

    async fn nonce(&self, address: &str, tx_pool: bool) -> Result<u64, SessionError> {
        Ok(self.with_settled(|state| state.next_nonce(address, tx_pool)))
    }

    async fn subscribe(
        &self,
        account: &dyn Account,
        identifier: &str,
        topic: &str,
        duration: u64,
        meta: &str,
        tx: &TransactionConfig,
    ) -> Result<String, SessionError> {
        let subscriber = make_address(identifier, &hex::encode(account.public_key()));
        let op = TxOp::Subscribe {
            topic: topic.to_string(),
            subscriber,
            meta: meta.to_string(),
            duration,
        };
        self.submit(account, "subscribe", op, tx)
    }

    async fn unsubscribe(
        &self,
        account: &dyn Account,
        identifier: &str,
        topic: &str,
        tx: &TransactionConfig,
    ) -> Result<String, SessionError> {
        let subscriber = make_address(identifier, &hex::encode(account.public_key()));
        let op = TxOp::Unsubscribe {
            topic: topic.to_string(),
            subscriber,
        };
        self.submit(account, "unsubscribe", op, tx)
    }

    async fn subscribers(&self, query: &SubscribersQuery) -> Result<Subscribers, SessionError> {
        Ok(self.with_settled(|state| {
            let limit = if query.limit == 0 { usize::MAX } else { query.limit };
            let meta_of = |meta: &str| {
                if query.meta {
                    meta.to_string()
                } else {
                    String::new()
                }
            };

            let subscribers = state
                .topics
                .get(&query.topic)
                .map(|subs| {
                    subs.iter()
                        .filter(|(addr, _)| matches_prefix(addr, &query.subscriber_hash_prefix))
                        .skip(query.offset)
                        .take(limit)
                        .map(|(addr, info)| (addr.clone(), meta_of(&info.meta)))
                        .collect()
                })
                .unwrap_or_default();

            let subscribers_in_tx_pool = if query.tx_pool {
                state
                    .pool
                    .iter()
                    .filter_map(|tx| match &tx.op {
                        TxOp::Subscribe {
                            topic,
                            subscriber,
                            meta,
                            ..
                        } if *topic == query.topic
                            && matches_prefix(subscriber, &query.subscriber_hash_prefix) =>
                        {
                            Some((subscriber.clone(), meta_of(meta)))
                        }
                        _ => None,
                    })
                    .collect()
            } else {
                BTreeMap::new()
            };

            Subscribers {
                subscribers,
                subscribers_in_tx_pool,
            }
        }))
    }

    async fn subscribers_count(
        &self,
        topic: &str,
        subscriber_hash_prefix: &[u8],
    ) -> Result<u64, SessionError> {
        Ok(self.with_settled(|state| {
            state.topics.get(topic).map_or(0, |subs| {
                subs.keys()
                    .filter(|addr| matches_prefix(addr, subscriber_hash_prefix))
                    .count() as u64
            })
        }))
    }

    async fn subscription(
        &self,
        topic: &str,
        subscriber: &str,
    ) -> Result<SubscriptionInfo, SessionError> {
        Ok(self.with_settled(|state| {
            state
                .topics
                .get(topic)
                .and_then(|subs| subs.get(subscriber).cloned())
                .unwrap_or(SubscriptionInfo {
                    meta: String::new(),
                    expires_at: 0,
                })
        }))
    }
}
