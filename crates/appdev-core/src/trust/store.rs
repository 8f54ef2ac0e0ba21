//! Trust store for loading, validating and saving per-host trust records.

use std::path::{Path, PathBuf};

use tracing::debug;
use x509_parser::pem::parse_x509_pem;

use crate::config::ConfigPaths;
use crate::error::{Error, Result};

use super::connection::{self, ConnectionConfig};

/// Certificate bundle plus connection settings for one host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustRecord {
    /// Raw PEM bytes.
    pub bundle: Option<Vec<u8>>,
    pub connection: ConnectionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleStatus {
    Valid,
    NotFound,
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct TrustStore {
    paths: ConfigPaths,
}

impl TrustStore {
    pub fn new(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn bundle_path(&self, host: &str) -> PathBuf {
        self.paths.bundle_path(host)
    }

    pub fn config_path(&self, host: &str) -> PathBuf {
        self.paths.connection_config_path(host)
    }

    /// Load everything stored for `host`. Missing or corrupt files read as empty.
    pub fn load(&self, host: &str) -> TrustRecord {
        let bundle = std::fs::read(self.bundle_path(host)).ok();
        let connection = std::fs::read_to_string(self.config_path(host))
            .ok()
            .and_then(|content| match connection::decode(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    debug!(host, error = %e, "ignoring unreadable connection config");
                    None
                }
            })
            .unwrap_or_default();
        TrustRecord { bundle, connection }
    }

    /// Check that the file at `bundle_path` holds a well-formed PEM certificate.
    pub fn validate(bundle_path: &Path) -> BundleStatus {
        if !bundle_path.is_file() {
            return BundleStatus::NotFound;
        }
        match std::fs::read(bundle_path) {
            Ok(bytes) => validate_bundle_bytes(&bytes),
            Err(e) => BundleStatus::Invalid(e.to_string()),
        }
    }

    /// Delete the host directory: bundle and connection config together.
    pub fn remove(&self, host: &str) {
        let dir = self.paths.host_dir(host);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => debug!(host, "removed trust state"),
            Err(e) => debug!(host, error = %e, "no trust state removed"),
        }
    }

    /// Persist the record. The bundle is written only when present.
    pub fn save(&self, record: &TrustRecord, host: &str) -> Result<()> {
        let dir = self.paths.host_dir(host);
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::io(format!("Unable to create {}", dir.display()), e))?;

        if let Some(bundle) = &record.bundle {
            self.write_bundle(host, bundle)?;
        }

        let config_path = self.config_path(host);
        let content = connection::encode(&record.connection)?;
        std::fs::write(&config_path, content).map_err(|e| {
            Error::ServerConfig(format!(
                "Unable to save server configuration {}: {e}",
                config_path.display()
            ))
        })
    }

    pub fn write_bundle(&self, host: &str, bundle: &[u8]) -> Result<PathBuf> {
        let path = self.bundle_path(host);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("Unable to create {}", parent.display()), e))?;
        }
        std::fs::write(&path, bundle)
            .map_err(|e| Error::io(format!("Unable to write {}", path.display()), e))?;
        Ok(path)
    }
}

/// Parse the first PEM block and require it to be an X.509 certificate.
pub fn validate_bundle_bytes(bytes: &[u8]) -> BundleStatus {
    let pem = match parse_x509_pem(bytes) {
        Ok((_, pem)) => pem,
        Err(e) => return BundleStatus::Invalid(format!("not PEM encoded: {e}")),
    };
    if pem.label != "CERTIFICATE" {
        return BundleStatus::Invalid(format!("unexpected PEM block {}", pem.label));
    }
    match pem.parse_x509() {
        Ok(_) => BundleStatus::Valid,
        Err(e) => BundleStatus::Invalid(format!("bad certificate: {e}")),
    }
}
