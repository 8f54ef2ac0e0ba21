//! Default server and user for all remote commands.
//!
//! Stored defaults are merged with command-line overrides by [`resolve_server`],
//! which never touches disk. Callers persist the result with
//! [`ServerDefaultsStore::save`] only when an override was supplied.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MSG_SERVER_AND_USER_MISSING: &str =
    "Use the -q and -u options to identify a server and user";
pub const MSG_SERVER_MISSING: &str = "Use the -q option to identify a server";
pub const MSG_USER_MISSING: &str = "Use the -u option to identify a user";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefaults {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedServer {
    pub host: String,
    pub user: String,
    /// True when either value came from an override and should be saved.
    pub overridden: bool,
}

impl ResolvedServer {
    pub fn as_defaults(&self) -> ServerDefaults {
        ServerDefaults {
            ip: self.host.clone(),
            user: self.user.clone(),
        }
    }
}

/// Merge stored defaults with optional overrides.
pub fn resolve_server(
    stored: &ServerDefaults,
    host_override: Option<&str>,
    user_override: Option<&str>,
) -> Result<ResolvedServer> {
    let host_override = host_override.filter(|h| !h.is_empty());
    let user_override = user_override.filter(|u| !u.is_empty());

    let host = host_override.unwrap_or(&stored.ip).to_string();
    let user = user_override.unwrap_or(&stored.user).to_string();

    match (host.is_empty(), user.is_empty()) {
        (true, true) => Err(Error::ServerConfig(MSG_SERVER_AND_USER_MISSING.to_string())),
        (true, false) => Err(Error::ServerConfig(MSG_SERVER_MISSING.to_string())),
        (false, true) => Err(Error::ServerConfig(MSG_USER_MISSING.to_string())),
        (false, false) => Ok(ResolvedServer {
            host,
            user,
            overridden: host_override.is_some() || user_override.is_some(),
        }),
    }
}

#[derive(Debug, Clone)]
pub struct ServerDefaultsStore {
    path: PathBuf,
}

impl ServerDefaultsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read stored defaults; anything unreadable yields empty defaults.
    pub fn load(&self) -> ServerDefaults {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, defaults: &ServerDefaults) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ServerConfig(format!("Unable to save server details: {e}"))
            })?;
        }
        let content = serde_json::to_string(defaults)
            .map_err(|e| Error::ServerConfig(format!("Unable to save server details: {e}")))?;
        std::fs::write(&self.path, content)
            .map_err(|e| Error::ServerConfig(format!("Unable to save server details: {e}")))
    }
}
