//! Deployment state machine.
//!
//! Upload -> CREATING/UPGRADING -> (AUTH_REQUIRED -> authorize) -> poll until the
//! task leaves CREATING/UPGRADING -> report the application's final state.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::api::{AppServer, AppStatus, CapableUser, RemoteId};
use crate::error::{Error, Result};
use crate::manifest::extract_uuid_from_package;
use crate::operator::Operator;

use super::pause::{Pause, ThreadSleep};

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Terminal state reported once polling ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalState {
    pub app_id: RemoteId,
    pub status: AppStatus,
    pub version: Option<String>,
    pub errors: Vec<String>,
}

impl FinalState {
    /// ERROR, or any embedded error message regardless of status.
    pub fn failed(&self) -> bool {
        self.status == AppStatus::Error || !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Finished(FinalState),
    /// No authorization user was chosen; the app stays in AUTH_REQUIRED.
    AwaitingAuthorization { app_id: RemoteId },
    /// The server answered the upload with a status this flow does not follow.
    Submitted { app_id: RemoteId, status: AppStatus },
}

impl DeployOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DeployOutcome::Finished(state) if state.failed())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStatusReport {
    pub app_id: RemoteId,
    /// Application status, with the task status appended when it has advanced.
    pub status: String,
    pub errors: Vec<String>,
}

/// Upload accepted by the server, with the status it answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub app_id: RemoteId,
    pub status: AppStatus,
    /// CREATING for a fresh install, UPGRADING for an upgrade.
    pub expected: AppStatus,
}

pub struct DeploymentCoordinator<'a> {
    server: &'a dyn AppServer,
    operator: &'a dyn Operator,
    pause: &'a dyn Pause,
    poll_interval: Duration,
}

impl<'a> DeploymentCoordinator<'a> {
    pub fn new(server: &'a dyn AppServer, operator: &'a dyn Operator) -> Self {
        Self {
            server,
            operator,
            pause: &ThreadSleep,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_pause(mut self, pause: &'a dyn Pause) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Install or upgrade the app packaged at `package`.
    pub fn deploy(&self, package: &Path, auth_user: Option<&str>) -> Result<DeployOutcome> {
        let submission = self.submit(package)?;
        self.follow(&submission, auth_user)
    }

    /// Upload the package as a fresh install or an upgrade.
    ///
    /// Nothing after the upload happens here, so retrying a failed follow-up
    /// never uploads twice.
    pub fn submit(&self, package: &Path) -> Result<Submission> {
        let uuid = extract_uuid_from_package(package)?;
        let existing = self.find_app_for_uuid(&uuid)?;
        let bytes = std::fs::read(package)
            .map_err(|e| Error::io(format!("Unable to read {}", package.display()), e))?;

        match existing {
            None => {
                self.operator.say("Application fresh install detected");
                self.announce_upload(package, bytes.len());
                let task = self.server.install_package(&bytes)?;
                let app_id = task.application_id.ok_or_else(|| {
                    Error::api("Install response did not include an application id", 200, 0)
                })?;
                self.operator.say(&format!("Installing application {app_id}"));
                Ok(Submission {
                    app_id,
                    status: task.status,
                    expected: AppStatus::Creating,
                })
            }
            Some(app_id) => {
                self.operator.say("Application upgrade detected");
                self.announce_upload(package, bytes.len());
                let task = self.server.upgrade_package(&app_id, &bytes)?;
                Ok(Submission {
                    app_id,
                    status: task.status,
                    expected: AppStatus::Upgrading,
                })
            }
        }
    }

    /// Continue from the upload response: authorize if asked, then poll.
    pub fn follow(
        &self,
        submission: &Submission,
        auth_user: Option<&str>,
    ) -> Result<DeployOutcome> {
        let Submission {
            app_id,
            status,
            expected,
        } = submission;
        self.operator.say(&format!("Application {app_id}: {status}"));
        if status == expected {
            self.wait_for_deploy_end(app_id).map(DeployOutcome::Finished)
        } else if *status == AppStatus::AuthRequired {
            self.authorize(app_id, auth_user)
        } else {
            info!(%app_id, %status, "not following install task");
            Ok(DeployOutcome::Submitted {
                app_id: app_id.clone(),
                status: status.clone(),
            })
        }
    }

    /// Id of the installed app with this uuid. A match in ERROR state is
    /// ignored so a failed install does not block a fresh one.
    fn find_app_for_uuid(&self, uuid: &str) -> Result<Option<RemoteId>> {
        let apps = self.server.list_applications()?;
        let Some(app) = apps.into_iter().find(|app| app.uuid() == Some(uuid)) else {
            return Ok(None);
        };
        if app.application_state.status == AppStatus::Error {
            debug!(uuid, "existing app is in ERROR state, installing fresh");
            return Ok(None);
        }
        Ok(Some(app.application_state.application_id))
    }

    fn announce_upload(&self, package: &Path, size: usize) {
        self.operator
            .say(&format!("Uploading {} {size} bytes", package.display()));
    }

    /// Pick an authorization user for a pending app, then follow the install.
    pub fn authorize(&self, app_id: &RemoteId, auth_user: Option<&str>) -> Result<DeployOutcome> {
        let capabilities = self.server.requested_capabilities(app_id)?;
        self.operator.say(&format!(
            "Application {app_id} is requesting capabilities {}",
            Value::Array(capabilities.clone())
        ));
        let users = self.server.capable_users(&capabilities)?;

        let Some(user_id) = self.choose_auth_user(auth_user, &users)? else {
            self.operator.say(&format!(
                "Deployment of application {app_id} is waiting for authorization"
            ));
            return Ok(DeployOutcome::AwaitingAuthorization {
                app_id: app_id.clone(),
            });
        };

        self.server.authorize(app_id, &user_id)?;
        self.wait_for_deploy_end(app_id)
            .map(DeployOutcome::Finished)
    }

    fn choose_auth_user(
        &self,
        auth_user: Option<&str>,
        users: &[CapableUser],
    ) -> Result<Option<RemoteId>> {
        if let Some(name) = auth_user {
            if let Some(user) = users.iter().find(|u| u.username == name) {
                self.operator
                    .say(&format!("Using supplied authorization user {name}"));
                return Ok(Some(user.id.clone()));
            }
            self.operator.say(&format!(
                "Supplied authorization user {name} does not have the requested capabilities"
            ));
        }

        if users.is_empty() {
            self.operator
                .say("No users have the requested capabilities");
            return Ok(None);
        }

        self.operator
            .say("These users have the requested capabilities:");
        for user in users {
            self.operator.say(&format!("  {}", user.username));
        }

        if let [only] = users {
            let accepted = self.operator.confirm(
                &format!("Use {} as the authorization user?", only.username),
                false,
            )?;
            return Ok(accepted.then(|| only.id.clone()));
        }

        loop {
            let answer = self.operator.prompt_text("Select a user", None)?;
            let name = answer.trim();
            if name.is_empty() {
                if self.operator.confirm("Stop deployment?", false)? {
                    return Ok(None);
                }
                continue;
            }
            match users.iter().find(|u| u.username == name) {
                Some(user) => return Ok(Some(user.id.clone())),
                None => self
                    .operator
                    .say(&format!("User name {name} not recognized")),
            }
        }
    }

    fn wait_for_deploy_end(&self, app_id: &RemoteId) -> Result<FinalState> {
        loop {
            let task = self.server.task_status(app_id)?;
            self.operator
                .say(&format!("Application {app_id}: {}", task.status));
            if !task.status.is_in_progress() {
                break;
            }
            self.pause.pause(self.poll_interval);
        }

        let app = self.server.application(app_id)?;
        let status = app.application_state.status.clone();
        let version = if status == AppStatus::Error {
            None
        } else {
            app.version().map(str::to_string)
        };
        let errors: Vec<String> = app.error_messages().map(str::to_string).collect();

        self.operator.say(&format!(
            "Final application state: {status}{}",
            version
                .as_deref()
                .map(|v| format!(" {v}"))
                .unwrap_or_default()
        ));
        for error in &errors {
            self.operator.say(error);
        }

        Ok(FinalState {
            app_id: app_id.clone(),
            status,
            version,
            errors,
        })
    }

    /// Report an application's status once.
    pub fn status(&self, app_id: &RemoteId) -> Result<AppStatusReport> {
        let app = self.server.application(app_id)?;
        let mut status = app.application_state.status.to_string();

        if app.application_state.status.is_in_progress() {
            let task = self.server.task_status(app_id)?;
            if !task.status.is_in_progress() {
                status = format!("{status}:{}", task.status);
            }
        }

        self.operator.say(&format!("{app_id}:{status}"));
        let errors: Vec<String> = app.error_messages().map(str::to_string).collect();
        for error in &errors {
            self.operator.say(error);
        }

        Ok(AppStatusReport {
            app_id: app_id.clone(),
            status,
            errors,
        })
    }

    pub fn cancel(&self, app_id: &RemoteId) -> Result<()> {
        self.server.cancel_install(app_id)?;
        self.operator
            .say(&format!("Cancel request accepted for application {app_id}"));
        Ok(())
    }

    /// Delete an app by deleting its definition.
    pub fn delete(&self, app_id: &RemoteId) -> Result<()> {
        let definition_id = self.server.application_definition_id(app_id)?;
        self.operator
            .say(&format!("Deleting application {app_id}"));
        self.server.delete_definition(&definition_id)?;
        self.operator
            .say(&format!("Application {app_id} has been deleted"));
        Ok(())
    }
}
