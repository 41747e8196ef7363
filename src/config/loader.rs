//! 客户端配置及其加载器。
//! Client configuration and its loader.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// The configuration a pooled client is created from.
///
/// The pool keys its clients by [`ClientConfiguration::key`], so two managers
/// loading the same configuration share the same set of clients.
///
/// 创建池化客户端所用的配置。连接池按 [`ClientConfiguration::key`] 对客户端分组。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfiguration {
    /// Unique name of this configuration.
    /// 该配置的唯一名称。
    pub name: String,
    pub application_name: String,
    pub application_uri: String,
    pub product_uri: String,
    /// The request timeout the client should apply to service calls.
    /// 客户端服务调用应使用的请求超时。
    pub request_timeout: Duration,
}

impl ClientConfiguration {
    /// Creates a configuration with the given name and default metadata.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            application_uri: format!("urn:opcua-link:{name}"),
            application_name: name.clone(),
            product_uri: "urn:opcua-link".to_string(),
            request_timeout: Duration::from_secs(60),
            name,
        }
    }

    /// The key the pool groups clients by.
    pub fn key(&self) -> &str {
        &self.name
    }
}

/// Loads a [`ClientConfiguration`] from a named, already existing source.
///
/// The manager calls this exactly once, at construction.
///
/// 从一个已存在的命名来源加载 [`ClientConfiguration`]。管理器仅在构造时调用一次。
pub trait ConfigurationLoader {
    fn load(&self, existing_filename: &str) -> Result<ClientConfiguration>;
}

/// A loader serving configurations registered in memory under a file name.
///
/// 一个提供以文件名注册在内存中的配置的加载器。
#[derive(Debug, Clone, Default)]
pub struct StaticConfigurationLoader {
    entries: HashMap<String, ClientConfiguration>,
}

impl StaticConfigurationLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `configuration` under `filename`, replacing any previous entry.
    pub fn with(mut self, filename: impl Into<String>, configuration: ClientConfiguration) -> Self {
        self.entries.insert(filename.into(), configuration);
        self
    }
}

impl ConfigurationLoader for StaticConfigurationLoader {
    fn load(&self, existing_filename: &str) -> Result<ClientConfiguration> {
        let filename = existing_filename.trim();
        if filename.is_empty() {
            return Err(Error::Configuration("configuration file name is empty".into()));
        }
        let configuration = self.entries.get(filename).cloned().ok_or_else(|| {
            Error::Configuration(format!("no configuration named '{filename}'"))
        })?;
        debug!(filename, name = %configuration.name, "Loaded client configuration");
        Ok(configuration)
    }
}
