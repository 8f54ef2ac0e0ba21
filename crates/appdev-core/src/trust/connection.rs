//! Connection configuration persisted per host.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SocksVersion {
    V4,
    V5,
}

impl TryFrom<u8> for SocksVersion {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            4 => Ok(SocksVersion::V4),
            5 => Ok(SocksVersion::V5),
            other => Err(format!("unsupported SOCKS protocol version {other}")),
        }
    }
}

impl From<SocksVersion> for u8 {
    fn from(version: SocksVersion) -> Self {
        match version {
            SocksVersion::V4 => 4,
            SocksVersion::V5 => 5,
        }
    }
}

/// How to reach a host: optional SOCKS proxy, remote login user and the
/// server's canonical hostname. Unset fields are never serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socks_proxy_protocol_version: Option<SocksVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socks_proxy_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socks_proxy_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_user_id: Option<String>,
}

pub fn encode(config: &ConnectionConfig) -> Result<String> {
    serde_json::to_string_pretty(config)
        .map_err(|e| Error::ServerConfig(format!("Unable to serialize server configuration: {e}")))
}

pub fn decode(content: &str) -> Result<ConnectionConfig> {
    serde_json::from_str(content)
        .map_err(|e| Error::ServerConfig(format!("Unable to load server configuration: {e}")))
}

/// `(version, host, port)` when a proxy host is configured.
///
/// Version defaults to SOCKS5 and port to 1080 when only the host was stored.
pub fn socks_proxy(config: &ConnectionConfig) -> Option<(SocksVersion, &str, u16)> {
    let host = config.socks_proxy_host.as_deref()?;
    Some((
        config
            .socks_proxy_protocol_version
            .unwrap_or(SocksVersion::V5),
        host,
        config.socks_proxy_port.unwrap_or(1080),
    ))
}

/// Proxy URL usable by the HTTP client, e.g. `socks5://localhost:1080`.
pub fn socks_proxy_url(config: &ConnectionConfig) -> Option<String> {
    socks_proxy(config).map(|(version, host, port)| {
        format!("socks{}://{}:{}", u8::from(version), host, port)
    })
}
