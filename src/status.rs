//! Defines the connection status vocabulary shared by the manager and its responses.
//!
//! 定义管理器及其响应共享的连接状态。

use std::fmt;
use tokio::time::Instant;

/// The status of a managed connection.
/// 受管连接的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    /// Nothing has been attempted yet.
    /// 尚未进行任何尝试。
    #[default]
    Unknown,
    /// A connect call is in progress.
    /// 连接调用正在进行中。
    Connecting,
    /// The client holds a live session.
    /// 客户端持有活动会话。
    Connected,
    /// No client is held.
    /// 未持有任何客户端。
    Disconnected,
    /// A reconnection sequence used up all of its attempts.
    /// 重连序列已用尽所有尝试次数。
    ReconnectionFailed,
    /// The connect deadline expired.
    /// 连接截止时间已到。
    Failed,
    /// The last network operation failed.
    /// 最近一次网络操作失败。
    Error,
    /// The endpoint answered a health check with an empty value.
    /// 端点对健康检查返回了空值。
    NoResponse,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        self == ConnectionStatus::Connected
    }

    /// Returns the name used in logs.
    /// 返回日志中使用的名称。
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Unknown => "Unknown",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::ReconnectionFailed => "ReconnectionFailed",
            ConnectionStatus::Failed => "Failed",
            ConnectionStatus::Error => "Error",
            ConnectionStatus::NoResponse => "NoResponse",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status paired with the instant it was last refreshed.
///
/// Both fields always change together, so a snapshot never pairs a new status
/// with a stale timestamp.
///
/// 与其最近刷新时刻配对的状态。两个字段总是一起变化。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub status: ConnectionStatus,
    pub last_activity: Instant,
}
