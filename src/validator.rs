//! Pre-connect checks on an acquired client and its target endpoint.
//!
//! 对已获取客户端及其目标端点的连接前检查。

use crate::client::ClientHandle;
use crate::endpoint::EndpointUrl;
use async_trait::async_trait;
use tracing::debug;

/// Checks run between acquiring a client and opening its session.
///
/// 在获取客户端与打开其会话之间运行的检查。
#[async_trait]
pub trait ConnectionValidator: Send + Sync + 'static {
    /// Whether the client's session machinery can still be used.
    fn active_session(&self, client: &dyn ClientHandle) -> bool;

    /// Whether `url` resolves to an address this host may connect to.
    /// `url` 是否解析为本主机可以连接的地址。
    async fn reachable_from_local_host(&self, url: &EndpointUrl) -> bool;
}

/// Which resolved addresses count as reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReachabilityPolicy {
    /// Only loopback addresses.
    #[default]
    LoopbackOnly,
    /// Any address the host name resolves to.
    AnyResolvable,
}

/// Resolves the host through the system resolver and applies a
/// [`ReachabilityPolicy`].
///
/// 通过系统解析器解析主机并应用 [`ReachabilityPolicy`]。
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator {
    policy: ReachabilityPolicy,
}

impl DefaultValidator {
    pub fn new(policy: ReachabilityPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl ConnectionValidator for DefaultValidator {
    fn active_session(&self, client: &dyn ClientHandle) -> bool {
        client.is_session_usable()
    }

    async fn reachable_from_local_host(&self, url: &EndpointUrl) -> bool {
        let Some(port) = url.port() else {
            debug!(%url, "No port known for endpoint");
            return false;
        };
        let host = url.host().trim_start_matches('[').trim_end_matches(']');

        match tokio::net::lookup_host((host, port)).await {
            Ok(mut addrs) => match self.policy {
                ReachabilityPolicy::LoopbackOnly => addrs.any(|addr| addr.ip().is_loopback()),
                ReachabilityPolicy::AnyResolvable => addrs.next().is_some(),
            },
            Err(e) => {
                debug!(%url, error = %e, "Endpoint host did not resolve");
                false
            }
        }
    }
}
