//! Validated endpoint locators.
//!
//! 经过验证的端点地址。

use crate::error::{Error, Result};
use std::fmt;
use url::Url;

/// The default port of the `opc.tcp` transport.
pub const OPCUA_DEFAULT_PORT: u16 = 4840;

/// An endpoint on the local host, on the default port.
pub const OPCUA_LOCAL: &str = "opc.tcp://localhost:4840";

/// A parsed endpoint locator such as `opc.tcp://localhost:4840`.
///
/// A value of this type can only be obtained through [`EndpointUrl::parse`], so
/// holding one means the locator is non-empty and well formed.
///
/// 已解析的端点地址。只能通过 [`EndpointUrl::parse`] 获得，因此持有该值即表示地址非空且格式正确。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUrl {
    raw: String,
    parsed: Url,
}

impl EndpointUrl {
    /// Parses and validates a locator. Surrounding whitespace is ignored.
    ///
    /// 解析并验证地址。忽略首尾空白。
    pub fn parse(candidate: &str) -> Result<Self> {
        let raw = candidate.trim();
        if raw.is_empty() {
            return Err(Error::InvalidArgument("URL cannot be empty".into()));
        }

        let parsed = Url::parse(raw)
            .map_err(|e| Error::InvalidArgument(format!("malformed URL '{raw}': {e}")))?;

        match parsed.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => {
                return Err(Error::InvalidArgument(format!("URL '{raw}' has no host")));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            parsed,
        })
    }

    /// Returns true if `candidate` would be accepted by [`EndpointUrl::parse`].
    pub fn is_valid(candidate: &str) -> bool {
        Self::parse(candidate).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The protocol part, e.g. `opc.tcp`.
    pub fn scheme(&self) -> &str {
        self.parsed.scheme()
    }

    pub fn host(&self) -> &str {
        self.parsed.host_str().unwrap_or_default()
    }

    /// The explicit port, or the well-known default of the scheme.
    ///
    /// 显式端口，或该协议的默认端口。
    pub fn port(&self) -> Option<u16> {
        match self.parsed.port_or_known_default() {
            Some(port) => Some(port),
            None if self.scheme() == "opc.tcp" => Some(OPCUA_DEFAULT_PORT),
            None => None,
        }
    }
}

impl fmt::Display for EndpointUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for EndpointUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
