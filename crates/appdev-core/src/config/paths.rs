//! Config path resolution helpers.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const CONFIG_DIR_NAME: &str = ".appdev";
pub const SERVER_DEFAULTS_FILE: &str = "server.json";
pub const BUNDLE_FILE: &str = "ca-bundle.crt";
pub const CONNECTION_CONFIG_FILE: &str = "config.json";

/// Root of all persisted appdev state for one installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    root: PathBuf,
}

impl ConfigPaths {
    /// Use `<home>/.appdev` as the state root.
    pub fn from_home(home: &Path) -> Self {
        Self {
            root: home.join(CONFIG_DIR_NAME),
        }
    }

    /// Resolve the state root from `APPDEV_HOME`, falling back to the user's home directory.
    pub fn from_env() -> Result<Self> {
        if let Some(home) = std::env::var_os("APPDEV_HOME") {
            return Ok(Self::from_home(Path::new(&home)));
        }
        let home = dirs::home_dir().ok_or_else(|| {
            Error::ServerConfig("Could not determine home directory".to_string())
        })?;
        Ok(Self::from_home(&home))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn host_dir(&self, host: &str) -> PathBuf {
        self.root.join(host)
    }

    pub fn bundle_path(&self, host: &str) -> PathBuf {
        self.host_dir(host).join(BUNDLE_FILE)
    }

    pub fn connection_config_path(&self, host: &str) -> PathBuf {
        self.host_dir(host).join(CONNECTION_CONFIG_FILE)
    }

    pub fn server_defaults_path(&self) -> PathBuf {
        self.root.join(SERVER_DEFAULTS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_files_live_under_host_dir() {
        let paths = ConfigPaths::from_home(Path::new("/home/dev"));
        assert_eq!(
            paths.bundle_path("10.0.0.1"),
            PathBuf::from("/home/dev/.appdev/10.0.0.1/ca-bundle.crt")
        );
        assert_eq!(
            paths.connection_config_path("10.0.0.1"),
            PathBuf::from("/home/dev/.appdev/10.0.0.1/config.json")
        );
        assert_eq!(
            paths.server_defaults_path(),
            PathBuf::from("/home/dev/.appdev/server.json")
        );
    }
}
