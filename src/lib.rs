#![deny(clippy::expect_used, clippy::unwrap_used)]

//! Lifecycle management for a single connection to an OPC UA style endpoint:
//! connect, disconnect, health-check and bounded reconnection over a pooled client.
//! 面向 OPC UA 类端点的单连接生命周期管理：基于池化客户端的连接、断开、健康检查和有界重连。

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod manager;
pub mod pool;
pub mod reconnect;
pub mod response;
pub mod status;
pub mod validator;

#[cfg(test)]
mod test_utils;

pub use client::{ClientHandle, DataValue, EndpointMetadata, NodeId, Session, Variant};
pub use config::{ClientConfiguration, Config, ConfigurationLoader, StaticConfigurationLoader};
pub use endpoint::EndpointUrl;
pub use error::{Error, Result};
pub use manager::{ConnectionManager, Response};
pub use pool::{ClientPool, KeyedClientPool};
pub use reconnect::{RetryPolicy, RetryStrategy};
pub use response::ConnectionResponse;
pub use status::{ConnectionStatus, StatusSnapshot};
pub use validator::{ConnectionValidator, DefaultValidator, ReachabilityPolicy};
