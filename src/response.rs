//! The immutable outcome snapshot returned by every manager operation.
//!
//! 每个管理器操作返回的不可变结果快照。

use crate::client::{EndpointMetadata, Session};
use crate::status::ConnectionStatus;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

/// Outcome of a connect, disconnect, reconnect or ping.
///
/// Built once per outcome and never mutated afterwards. The endpoint fields
/// are empty when no client was held at build time.
///
/// 连接、断开、重连或 ping 的结果。每个结果构建一次，之后不再修改。
/// 构建时若未持有客户端，端点字段为空。
pub struct ConnectionResponse<C> {
    metadata: EndpointMetadata,
    status: ConnectionStatus,
    last_activity: Instant,
    session: Option<Session>,
    client: Option<Arc<C>>,
}

impl<C> ConnectionResponse<C> {
    pub fn builder(status: ConnectionStatus, last_activity: Instant) -> ConnectionResponseBuilder<C> {
        ConnectionResponseBuilder {
            metadata: EndpointMetadata::default(),
            status,
            last_activity,
            session: None,
            client: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn endpoint_url(&self) -> &str {
        &self.metadata.endpoint_url
    }

    pub fn application_name(&self) -> &str {
        &self.metadata.application_name
    }

    pub fn application_uri(&self) -> &str {
        &self.metadata.application_uri
    }

    pub fn product_uri(&self) -> &str {
        &self.metadata.product_uri
    }

    /// The session opened by a successful connect.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The live client, present only on a successful connect.
    /// 活动客户端，仅在连接成功时存在。
    pub fn client(&self) -> Option<&Arc<C>> {
        self.client.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }
}

impl<C> Clone for ConnectionResponse<C> {
    fn clone(&self) -> Self {
        Self {
            metadata: self.metadata.clone(),
            status: self.status,
            last_activity: self.last_activity,
            session: self.session.clone(),
            client: self.client.clone(),
        }
    }
}

impl<C> fmt::Debug for ConnectionResponse<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionResponse")
            .field("endpoint_url", &self.metadata.endpoint_url)
            .field("application_name", &self.metadata.application_name)
            .field("status", &self.status)
            .field("last_activity", &self.last_activity)
            .field("session", &self.session)
            .field("has_client", &self.client.is_some())
            .finish()
    }
}

/// Builder for [`ConnectionResponse`].
pub struct ConnectionResponseBuilder<C> {
    metadata: EndpointMetadata,
    status: ConnectionStatus,
    last_activity: Instant,
    session: Option<Session>,
    client: Option<Arc<C>>,
}

impl<C> ConnectionResponseBuilder<C> {
    pub fn metadata(mut self, metadata: EndpointMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn session(mut self, session: Option<Session>) -> Self {
        self.session = session;
        self
    }

    pub fn client(mut self, client: Option<Arc<C>>) -> Self {
        self.client = client;
        self
    }

    pub fn build(self) -> ConnectionResponse<C> {
        ConnectionResponse {
            metadata: self.metadata,
            status: self.status,
            last_activity: self.last_activity,
            session: self.session,
            client: self.client,
        }
    }
}
