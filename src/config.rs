//! 定义了连接管理器的可配置参数。
//! Defines configurable parameters for the connection manager.

mod loader;

pub use loader::{ClientConfiguration, ConfigurationLoader, StaticConfigurationLoader};

use crate::client::NodeId;
use std::time::Duration;

/// A structure containing all tunable parameters of a connection manager.
///
/// 包含连接管理器所有可调参数的结构体。
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Reconnection-related parameters.
    /// 重连相关参数。
    pub reconnect: ReconnectConfig,

    /// Connection and health-check parameters.
    /// 连接和健康检查参数。
    pub connection: ConnectionConfig,
}

/// Reconnection-related parameters.
///
/// 重连相关参数。
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// The maximum number of connect attempts in one reconnection sequence.
    /// 一次重连序列中的最大连接尝试次数。
    pub max_attempts: u32,
    /// The wait before the first backoff attempt.
    /// 第一次退避尝试前的等待时间。
    pub initial_wait: Duration,
    /// The factor the backoff wait is multiplied by after every failed attempt.
    /// 每次尝试失败后退避等待时间的乘数。
    pub backoff_factor: f64,
    /// The constant wait between linear attempts.
    /// 线性重连尝试之间的固定等待时间。
    pub linear_interval: Duration,
}

/// Connection and health-check parameters.
///
/// 连接和健康检查参数。
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// The deadline for the validation and network phase of a connect call.
    /// If it expires the status becomes `Failed`.
    ///
    /// 连接调用中验证和网络阶段的截止时间。超时后状态变为 `Failed`。
    pub connect_timeout: Duration,
    /// The deadline for the liveness read issued by `ping`.
    /// `ping` 发出的存活读取的截止时间。
    pub ping_timeout: Duration,
    /// The node read by `ping`.
    /// `ping` 读取的节点。
    pub ping_node: NodeId,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_wait: Duration::from_millis(1000),
            backoff_factor: 2.0,
            linear_interval: Duration::from_millis(5000),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            ping_timeout: Duration::from_secs(5),
            ping_node: NodeId::SERVER_STATUS_STATE,
        }
    }
}
