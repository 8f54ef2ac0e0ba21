//! Workspace-local registration record.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::RemoteId;
use crate::error::{Error, Result};
use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRegistrationRecord {
    pub definition_id: RemoteId,
    pub instance_id: RemoteId,
}

impl LocalRegistrationRecord {
    /// Missing or unreadable records yield `None`.
    pub fn load(workspace: &Workspace, host: &str) -> Option<Self> {
        let path = workspace.record_path(host);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring unreadable registration record");
                None
            }
        }
    }

    pub fn save(&self, workspace: &Workspace, host: &str) -> Result<()> {
        let content = serde_json::to_string(self).map_err(|e| {
            Error::Workspace(format!("Unable to encode registered app details: {e}"))
        })?;
        std::fs::write(workspace.record_path(host), content).map_err(|e| {
            Error::Workspace(format!(
                "Unable to save registered app details to workspace [{}]: {e}",
                workspace.name()
            ))
        })
    }

    /// Idempotent: a missing record is not an error.
    pub fn remove(workspace: &Workspace, host: &str) -> Result<()> {
        match std::fs::remove_file(workspace.record_path(host)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Workspace(format!(
                "Unable to remove registered app details from workspace [{}]: {e}",
                workspace.name()
            ))),
        }
    }
}

/// Instance id recorded for `host`, used when running the app locally.
pub fn instance_id_for(workspace: &Workspace, host: &str) -> Option<RemoteId> {
    LocalRegistrationRecord::load(workspace, host).map(|record| record.instance_id)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn save_load_remove() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::open_unchecked(temp.path()).unwrap();
        assert_eq!(LocalRegistrationRecord::load(&workspace, "h"), None);

        let record = LocalRegistrationRecord {
            definition_id: RemoteId::from(1051),
            instance_id: RemoteId::from(1101),
        };
        record.save(&workspace, "h").unwrap();
        assert_eq!(
            std::fs::read_to_string(workspace.record_path("h")).unwrap(),
            r#"{"definition_id":1051,"instance_id":1101}"#
        );
        assert_eq!(LocalRegistrationRecord::load(&workspace, "h"), Some(record));
        assert_eq!(instance_id_for(&workspace, "h"), Some(RemoteId::from(1101)));
        assert_eq!(instance_id_for(&workspace, "other"), None);

        LocalRegistrationRecord::remove(&workspace, "h").unwrap();
        LocalRegistrationRecord::remove(&workspace, "h").unwrap();
        assert!(!workspace.record_path("h").exists());
    }

    #[test]
    fn corrupt_record_is_ignored() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::open_unchecked(temp.path()).unwrap();
        std::fs::write(workspace.record_path("h"), "{not json").unwrap();
        assert_eq!(LocalRegistrationRecord::load(&workspace, "h"), None);
    }
}
