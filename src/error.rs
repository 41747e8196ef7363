//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The primary error type for the connection manager.
/// 连接管理器的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// The supplied endpoint locator is empty or malformed.
    /// 提供的端点地址为空或格式错误。
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not allowed in the current state, e.g. there is no
    /// remembered URL or no live connection.
    ///
    /// 当前状态下不允许该操作，例如没有记录的URL或没有活动连接。
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The pool could not hand out a client.
    /// 连接池无法提供客户端。
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The acquired client failed the session or reachability checks.
    /// 获取的客户端未通过会话或可达性检查。
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// A failure reported by the protocol client itself.
    /// 协议客户端本身报告的失败。
    #[error("client error: {0}")]
    Client(String),

    /// A network operation exceeded its deadline.
    /// 网络操作超出了截止时间。
    #[error("operation timed out")]
    Timeout,

    /// The client configuration could not be loaded.
    /// 无法加载客户端配置。
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Establishing the connection failed. The original cause is kept as the source.
    /// 建立连接失败。原始原因保存在 source 中。
    #[error("{message}: {source}")]
    Connection {
        message: String,
        #[source]
        source: Box<Error>,
    },

    /// Disconnecting failed. Cleanup has already run when this is reported.
    /// 断开连接失败。报告此错误时清理已经完成。
    #[error("{message}: {source}")]
    Disconnection {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps `source` into a connection error with the given context.
    pub fn connection(message: impl Into<String>, source: Error) -> Self {
        Error::Connection {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Wraps `source` into a disconnection error with the given context.
    pub fn disconnection(message: impl Into<String>, source: Error) -> Self {
        Error::Disconnection {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Returns the innermost error of a wrapped chain.
    /// 返回包装链中最内层的错误。
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Connection { source, .. } | Error::Disconnection { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::InvalidArgument(msg) => std::io::Error::new(ErrorKind::InvalidInput, msg),
            Error::InvalidState(msg) => std::io::Error::new(ErrorKind::NotConnected, msg),
            Error::ResourceUnavailable(msg) => std::io::Error::new(ErrorKind::WouldBlock, msg),
            Error::ValidationFailed(msg) => {
                std::io::Error::new(ErrorKind::ConnectionRefused, msg)
            }
            Error::Client(msg) => std::io::Error::other(msg),
            Error::Timeout => ErrorKind::TimedOut.into(),
            Error::Configuration(msg) => std::io::Error::new(ErrorKind::InvalidData, msg),
            err @ Error::Connection { .. } => {
                std::io::Error::new(ErrorKind::ConnectionAborted, err.to_string())
            }
            err @ Error::Disconnection { .. } => {
                std::io::Error::new(ErrorKind::ConnectionReset, err.to_string())
            }
        }
    }
}
