//! Client pooling.
//!
//! The manager never creates clients itself. It borrows one from a
//! [`ClientPool`] per connection and hands it back on every cleanup path.
//!
//! 客户端池。管理器从不自己创建客户端，而是每次连接从 [`ClientPool`] 借用一个，
//! 并在每个清理路径上归还。

mod keyed;

pub use keyed::{ClientFactory, KeyedClientPool, PoolStats, PooledClient};

use crate::client::ClientHandle;
use crate::config::ClientConfiguration;
use std::sync::Arc;

/// Allocates and recycles client handles keyed by a loaded configuration.
///
/// 按已加载配置分配和回收客户端句柄。
pub trait ClientPool: Send + Sync + 'static {
    type Client: ClientHandle;

    /// Checks a client out. `None` means the pool is exhausted for this
    /// configuration.
    ///
    /// 借出一个客户端。`None` 表示该配置下的池已耗尽。
    fn acquire(&self, configuration: &ClientConfiguration) -> Option<Arc<Self::Client>>;

    /// Returns a client previously obtained from [`ClientPool::acquire`].
    /// 归还先前通过 [`ClientPool::acquire`] 获得的客户端。
    fn release(&self, client: Arc<Self::Client>);
}

impl<P: ClientPool> ClientPool for Arc<P> {
    type Client = P::Client;

    fn acquire(&self, configuration: &ClientConfiguration) -> Option<Arc<Self::Client>> {
        (**self).acquire(configuration)
    }

    fn release(&self, client: Arc<Self::Client>) {
        (**self).release(client)
    }
}
