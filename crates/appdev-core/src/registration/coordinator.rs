use semver::Version;
use tracing::{debug, info};

use crate::api::AppServer;
use crate::container::ContainerRuntime;
use crate::error::{Error, Result};
use crate::manifest::ports_summary;
use crate::operator::Operator;
use crate::workspace::Workspace;

use super::dev_app::DevApp;
use super::record::LocalRegistrationRecord;

/// First server version that supports development apps.
pub const MIN_DEV_APP_VERSION: Version = Version::new(7, 5, 0);

/// API code the server returns when the developer endpoint is not installed.
const MISSING_ENDPOINT_CODE: i64 = 4;

const MSG_MISSING_DEV_ENDPOINT: &str = "Unable to reach developer tools REST API endpoint. \
     Possible reason:\nSDK developer tools JAR file is not installed on the server.\n\
     For more details, see SDK documentation.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeregisterOutcome {
    Removed,
    /// Nothing was registered remotely. The local record is still cleared.
    NotFound,
}

pub struct RegistrationCoordinator<'a> {
    server: &'a dyn AppServer,
    operator: &'a dyn Operator,
}

impl<'a> RegistrationCoordinator<'a> {
    pub fn new(server: &'a dyn AppServer, operator: &'a dyn Operator) -> Self {
        Self { server, operator }
    }

    fn host(&self) -> &str {
        self.server.host()
    }

    /// The development app the server knows for this workspace, if any.
    ///
    /// A local record whose definition id the server no longer lists counts as
    /// no app at all.
    pub fn resolve_existing(&self, workspace: &Workspace) -> Result<Option<DevApp>> {
        let version = self.server.server_version()?;
        if version < MIN_DEV_APP_VERSION {
            return Err(Error::UnsupportedVersion(format!(
                "Server {} is at version {version}\n\
                 Development apps are supported only in version {MIN_DEV_APP_VERSION} or later",
                self.host()
            )));
        }

        let remote_apps = self.server.list_dev_apps().map_err(|e| match e {
            Error::Api {
                http_status,
                api_code: MISSING_ENDPOINT_CODE,
                ..
            } => Error::api(MSG_MISSING_DEV_ENDPOINT, http_status, MISSING_ENDPOINT_CODE),
            other => other,
        })?;

        let Some(record) = LocalRegistrationRecord::load(workspace, self.host()) else {
            return Ok(None);
        };
        let existing = remote_apps
            .into_iter()
            .find(|entry| entry.definition_id == record.definition_id)
            .map(|entry| DevApp::from_entry(entry, self.host()));
        if existing.is_none() {
            debug!(
                definition_id = %record.definition_id,
                "local registration record not known to server"
            );
        }
        Ok(existing)
    }

    pub fn preregister(&self, workspace: &Workspace) -> Result<DevApp> {
        if let Some(existing) = self.resolve_existing(workspace)? {
            return Err(Error::Workspace(format!(
                "An app is already {} for workspace [{}] on server {}",
                existing.state(),
                workspace.name(),
                self.host()
            )));
        }

        let payload = workspace.manifest()?.preregistration_payload();
        let entry = self.server.preregister_dev_app(&payload)?;
        self.operator.say(&format!(
            "App in workspace [{}] successfully preregistered on server {}",
            workspace.name(),
            self.host()
        ));

        let app = DevApp::from_entry(entry, self.host());
        app.record().save(workspace, self.host())?;
        info!(definition_id = %app.definition_id, "preregistered");
        Ok(app)
    }

    /// Register the locally running app, or update an existing registration.
    ///
    /// Create vs update follows the status seen at lookup time; the server may
    /// have moved on by the time the request lands.
    pub fn register(
        &self,
        workspace: &Workspace,
        local_ip: &str,
        runtime: &dyn ContainerRuntime,
    ) -> Result<DevApp> {
        let existing = self.resolve_existing(workspace)?.ok_or_else(|| {
            Error::Workspace(format!(
                "You must preregister your app on server {} before attempting to register it",
                self.host()
            ))
        })?;

        let ports = runtime.assigned_port_mappings(&workspace.container_name()?)?;
        let is_update = !existing.is_preregistered();
        let request = workspace
            .manifest()?
            .registration_payload(local_ip, &ports, is_update)?;
        for service in &request.unmapped {
            if let Some(port) = service.port {
                self.operator.say(&format!(
                    "No mapping was found for port {port} in service {}",
                    service.name
                ));
            }
        }

        let entry = if is_update {
            self.server
                .update_dev_app(&existing.definition_id, &request.payload)?
        } else {
            self.server
                .register_dev_app(&existing.definition_id, &request.payload)?
        };

        let ports = ports_summary(&request.payload);
        self.operator.say(&if is_update {
            format!(
                "Registration of app in workspace [{}] successfully updated on server {} \
                 to serve requests from {local_ip} on these ports: {ports}",
                workspace.name(),
                self.host()
            )
        } else {
            format!(
                "App in workspace [{}] successfully registered on server {} \
                 to serve requests from {local_ip} on these ports: {ports}",
                workspace.name(),
                self.host()
            )
        });

        let app = DevApp::from_entry(entry, self.host());
        app.record().save(workspace, self.host())?;
        info!(definition_id = %app.definition_id, is_update, "registered");
        Ok(app)
    }

    /// Remove the remote registration. The local record is removed on every
    /// path, including failures.
    pub fn deregister(&self, workspace: &Workspace) -> Result<DeregisterOutcome> {
        finish_deregister(workspace, self.host(), self.deregister_remote(workspace))
    }

    /// Remote half of [`deregister`](Self::deregister). Leaves the local record
    /// alone so a retried attempt can still find the app.
    ///
    /// Callers must pass the final result to [`finish_deregister`].
    pub fn deregister_remote(&self, workspace: &Workspace) -> Result<DeregisterOutcome> {
        match self.resolve_existing(workspace)? {
            Some(existing) => {
                self.server.deregister_dev_app(&existing.definition_id)?;
                self.operator.say(&format!(
                    "App in workspace [{}] successfully deregistered on server {}",
                    workspace.name(),
                    self.host()
                ));
                Ok(DeregisterOutcome::Removed)
            }
            None => {
                self.operator.say(&format!(
                    "No registered app was found for workspace [{}] and server {}",
                    workspace.name(),
                    self.host()
                ));
                Ok(DeregisterOutcome::NotFound)
            }
        }
    }
}

/// Remove the local record for `host` whatever `remote` says, then return it.
pub fn finish_deregister(
    workspace: &Workspace,
    host: &str,
    remote: Result<DeregisterOutcome>,
) -> Result<DeregisterOutcome> {
    let cleanup = LocalRegistrationRecord::remove(workspace, host);
    let outcome = remote?;
    cleanup?;
    Ok(outcome)
}
