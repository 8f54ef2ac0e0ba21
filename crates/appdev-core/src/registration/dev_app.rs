use crate::api::{AppStatus, DevAppEntry, RemoteId};

use super::record::LocalRegistrationRecord;

/// A development app as the server currently reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevApp {
    pub definition_id: RemoteId,
    pub instance_id: RemoteId,
    pub status: AppStatus,
    pub host: String,
}

impl DevApp {
    pub fn from_entry(entry: DevAppEntry, host: &str) -> Self {
        Self {
            definition_id: entry.definition_id,
            instance_id: entry.instance_id,
            status: entry.status,
            host: host.to_string(),
        }
    }

    pub fn is_preregistered(&self) -> bool {
        self.status == AppStatus::Creating
    }

    /// User-facing state. Every status other than CREATING reads as
    /// "registered", ERROR included.
    pub fn state(&self) -> &'static str {
        if self.is_preregistered() {
            "preregistered"
        } else {
            "registered"
        }
    }

    pub fn record(&self) -> LocalRegistrationRecord {
        LocalRegistrationRecord {
            definition_id: self.definition_id.clone(),
            instance_id: self.instance_id.clone(),
        }
    }
}
