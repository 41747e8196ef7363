//! The narrow interface the manager consumes from a protocol client.
//!
//! 管理器从协议客户端使用的窄接口。

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// A protocol client handed out by a [`ClientPool`](crate::pool::ClientPool).
///
/// Implementations perform session negotiation and the secure-channel
/// handshake; the manager only sequences these calls.
///
/// 由连接池分发的协议客户端。实现负责会话协商和安全通道握手，管理器只负责调用顺序。
#[async_trait]
pub trait ClientHandle: Send + Sync + 'static {
    /// Opens a session with the endpoint the client was configured for.
    async fn connect(&self) -> Result<Session>;

    /// Closes the session.
    async fn disconnect(&self) -> Result<()>;

    /// Reads the current value of `node`. `Ok(None)` means the endpoint
    /// answered without a value.
    ///
    /// 读取 `node` 的当前值。`Ok(None)` 表示端点应答但没有值。
    async fn read_value(&self, node: &NodeId) -> Result<Option<DataValue>>;

    fn is_connected(&self) -> bool;

    /// Returns false once the client's session has been torn down and cannot
    /// be reused.
    fn is_session_usable(&self) -> bool {
        true
    }

    /// Static metadata describing the endpoint and application identity.
    fn metadata(&self) -> EndpointMetadata;
}

/// A session returned by [`ClientHandle::connect`].
/// [`ClientHandle::connect`] 返回的会话。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
}

/// Endpoint and application identity reported by a client.
/// 客户端报告的端点和应用标识。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointMetadata {
    pub endpoint_url: String,
    pub application_name: String,
    pub application_uri: String,
    pub product_uri: String,
}

/// A numeric node identifier, printed as `ns=<namespace>;i=<id>`.
///
/// 数字节点标识符，格式为 `ns=<namespace>;i=<id>`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: u32,
}

impl NodeId {
    /// `Server_ServerStatus_State`, present on every server.
    pub const SERVER_STATUS_STATE: NodeId = NodeId::numeric(0, 2259);

    pub const fn numeric(namespace: u16, identifier: u32) -> Self {
        Self {
            namespace,
            identifier,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={};i={}", self.namespace, self.identifier)
    }
}

impl FromStr for NodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidArgument(format!("malformed node id '{s}'"));
        let (ns, id) = s.trim().split_once(';').ok_or_else(invalid)?;
        let namespace = ns
            .strip_prefix("ns=")
            .and_then(|v| v.parse().ok())
            .ok_or_else(invalid)?;
        let identifier = id
            .strip_prefix("i=")
            .and_then(|v| v.parse().ok())
            .ok_or_else(invalid)?;
        Ok(Self::numeric(namespace, identifier))
    }
}

/// A value read from the address space.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Boolean(bool),
    Int32(i32),
    UInt32(u32),
    Double(f64),
    String(String),
}

/// The result of a read: an optional value.
/// 读取结果：一个可选的值。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    pub value: Option<Variant>,
}

impl DataValue {
    pub fn new(value: Variant) -> Self {
        Self { value: Some(value) }
    }

    /// A value counts as valid when present and not an empty string.
    /// 当值存在且不是空字符串时视为有效。
    pub fn is_valid(&self) -> bool {
        match &self.value {
            Some(Variant::String(s)) => !s.is_empty(),
            Some(_) => true,
            None => false,
        }
    }
}
