//! A pool that recycles clients per configuration key.
//!
//! 按配置键回收客户端的连接池。

use super::ClientPool;
use crate::client::{ClientHandle, DataValue, EndpointMetadata, NodeId, Session};
use crate::config::ClientConfiguration;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// Creates new clients when the pool has no idle one for a key.
/// 当池中没有某个键的空闲客户端时创建新客户端。
pub trait ClientFactory: Send + Sync + 'static {
    type Client: ClientHandle;

    fn create(&self, configuration: &ClientConfiguration) -> Result<Self::Client>;
}

/// A client checked out of a [`KeyedClientPool`]. It remembers the key it
/// belongs to so that it can be returned without extra bookkeeping.
///
/// 从 [`KeyedClientPool`] 借出的客户端。它记住所属的键，以便归还时无需额外记录。
#[derive(Debug)]
pub struct PooledClient<C> {
    id: u64,
    key: String,
    inner: C,
}

impl<C> PooledClient<C> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: ClientHandle> ClientHandle for PooledClient<C> {
    async fn connect(&self) -> Result<Session> {
        self.inner.connect().await
    }

    async fn disconnect(&self) -> Result<()> {
        self.inner.disconnect().await
    }

    async fn read_value(&self, node: &NodeId) -> Result<Option<DataValue>> {
        self.inner.read_value(node).await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn is_session_usable(&self) -> bool {
        self.inner.is_session_usable()
    }

    fn metadata(&self) -> EndpointMetadata {
        self.inner.metadata()
    }
}

/// Idle and checked-out counts for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub checked_out: usize,
}

/// A [`ClientPool`] that keeps idle clients per configuration key and bounds
/// the number of simultaneous checkouts per key.
///
/// 按配置键保存空闲客户端并限制每个键同时借出数量的 [`ClientPool`]。
pub struct KeyedClientPool<F: ClientFactory> {
    factory: F,
    max_per_key: usize,
    idle: DashMap<String, Vec<Arc<PooledClient<F::Client>>>>,
    checked_out: DashMap<String, usize>,
    /// Client id -> key, for every client currently checked out.
    outstanding: DashMap<u64, String>,
    next_id: AtomicU64,
}

impl<F: ClientFactory> KeyedClientPool<F> {
    pub fn new(factory: F, max_per_key: usize) -> Self {
        Self {
            factory,
            max_per_key,
            idle: DashMap::new(),
            checked_out: DashMap::new(),
            outstanding: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn stats(&self, key: &str) -> PoolStats {
        PoolStats {
            idle: self.idle.get(key).map(|v| v.len()).unwrap_or(0),
            checked_out: self.checked_out.get(key).map(|v| *v).unwrap_or(0),
        }
    }
}

impl<F: ClientFactory> ClientPool for KeyedClientPool<F> {
    type Client = PooledClient<F::Client>;

    fn acquire(&self, configuration: &ClientConfiguration) -> Option<Arc<Self::Client>> {
        let key = configuration.key();
        // The entry guard serializes acquisitions for this key.
        let mut count = self.checked_out.entry(key.to_string()).or_insert(0);
        if *count >= self.max_per_key {
            warn!(key, max = self.max_per_key, "Pool exhausted");
            return None;
        }

        let recycled = self.idle.get_mut(key).and_then(|mut idle| idle.pop());
        let client = match recycled {
            Some(client) => {
                trace!(key, id = client.id, "Reusing idle client");
                client
            }
            None => match self.factory.create(configuration) {
                Ok(inner) => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    debug!(key, id, "Created new pooled client");
                    Arc::new(PooledClient {
                        id,
                        key: key.to_string(),
                        inner,
                    })
                }
                Err(e) => {
                    warn!(key, error = %e, "Client factory failed");
                    return None;
                }
            },
        };

        *count += 1;
        self.outstanding.insert(client.id, key.to_string());
        Some(client)
    }

    fn release(&self, client: Arc<Self::Client>) {
        if self.outstanding.remove(&client.id).is_none() {
            warn!(id = client.id, key = %client.key, "Ignoring release of a client that is not checked out");
            return;
        }

        if let Some(mut count) = self.checked_out.get_mut(&client.key) {
            *count = count.saturating_sub(1);
        }

        if !client.is_session_usable() {
            debug!(id = client.id, key = %client.key, "Discarding client with unusable session");
            return;
        }

        trace!(id = client.id, key = %client.key, "Client returned to pool");
        self.idle.entry(client.key.clone()).or_default().push(client);
    }
}
