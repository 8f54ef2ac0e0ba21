#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use semver::Version;
use serde_json::{Value, json};

use appdev_core::api::{
    AppServer, AppStatus, Application, CapableUser, DevAppEntry, RemoteId, TaskResponse,
};
use appdev_core::config::Settings;
use appdev_core::deploy::Pause;
use appdev_core::error::{Error, Result};
use appdev_core::operator::Operator;
use appdev_core::trust::shell::Progress;
use appdev_core::trust::{
    CommandOutput, ConnectError, ConnectionConfig, RemoteShell, RemoteShellConnector,
};

// =============================================================================
// Operator
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Confirm(bool),
    Text(String),
    Choice(usize),
    Secret(String),
}

/// Operator answering prompts from a fixed script.
#[derive(Default)]
pub struct ScriptedOperator {
    answers: RefCell<VecDeque<Answer>>,
    pub lines: RefCell<Vec<String>>,
    pub prompts: RefCell<Vec<String>>,
}

impl ScriptedOperator {
    pub fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: RefCell::new(answers.into()),
            ..Default::default()
        }
    }

    pub fn said(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|line| line.contains(needle))
    }

    pub fn remaining_answers(&self) -> usize {
        self.answers.borrow().len()
    }

    fn next(&self, prompt: &str) -> Result<Answer> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Error::Prompt(format!("no scripted answer for: {prompt}")))
    }
}

impl Operator for ScriptedOperator {
    fn say(&self, message: &str) {
        self.lines.borrow_mut().push(message.to_string());
    }

    fn confirm(&self, prompt: &str, _default: bool) -> Result<bool> {
        match self.next(prompt)? {
            Answer::Confirm(value) => Ok(value),
            other => panic!("expected confirm answer for {prompt:?}, got {other:?}"),
        }
    }

    fn prompt_text(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        match self.next(prompt)? {
            Answer::Text(text) if text.is_empty() => {
                Ok(default.map(str::to_string).unwrap_or_default())
            }
            Answer::Text(text) => Ok(text),
            other => panic!("expected text answer for {prompt:?}, got {other:?}"),
        }
    }

    fn prompt_choice(&self, prompt: &str, _choices: &[&str], _default: usize) -> Result<usize> {
        match self.next(prompt)? {
            Answer::Choice(index) => Ok(index),
            other => panic!("expected choice answer for {prompt:?}, got {other:?}"),
        }
    }

    fn prompt_secret(&self, prompt: &str) -> Result<String> {
        match self.next(prompt)? {
            Answer::Secret(secret) => Ok(secret),
            other => panic!("expected secret answer for {prompt:?}, got {other:?}"),
        }
    }
}

// =============================================================================
// Pause
// =============================================================================

#[derive(Default)]
pub struct RecordingPause {
    pub pauses: RefCell<Vec<Duration>>,
}

impl RecordingPause {
    pub fn count(&self) -> usize {
        self.pauses.borrow().len()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        self.pauses.borrow_mut().push(duration);
    }
}

// =============================================================================
// App server
// =============================================================================

pub fn dev_app(definition_id: u64, instance_id: u64, status: &str) -> DevAppEntry {
    DevAppEntry {
        definition_id: RemoteId::from(definition_id),
        instance_id: RemoteId::from(instance_id),
        status: AppStatus::from(status),
    }
}

pub fn application(app_id: u64, uuid: &str, status: &str, version: &str) -> Application {
    serde_json::from_value(json!({
        "application_state": {"status": status, "application_id": app_id},
        "manifest": {"uuid": uuid, "version": version}
    }))
    .unwrap()
}

pub fn application_with_errors(app_id: u64, status: &str, errors: &[&str]) -> Application {
    let errors: Vec<Value> = errors.iter().map(|m| json!({"message": m})).collect();
    serde_json::from_value(json!({
        "application_state": {
            "status": status,
            "application_id": app_id,
            "error_messages_json": errors
        },
        "manifest": {"uuid": "u", "version": "1.0.0"}
    }))
    .unwrap()
}

pub fn user(id: u64, username: &str) -> CapableUser {
    CapableUser {
        id: RemoteId::from(id),
        username: username.to_string(),
    }
}

/// In-memory [`AppServer`] that records every call.
pub struct FakeServer {
    pub host: String,
    pub version: Version,
    pub dev_apps: RefCell<Vec<DevAppEntry>>,
    /// `(http_status, api_code)` returned by the developer-apps listing.
    pub dev_apps_failure: Option<(u16, i64)>,
    pub deregister_fails: bool,
    pub next_dev_app: RefCell<Option<DevAppEntry>>,
    pub applications: Vec<Application>,
    pub upload_response: RefCell<Option<TaskResponse>>,
    pub task_statuses: RefCell<VecDeque<AppStatus>>,
    pub final_application: RefCell<Option<Application>>,
    pub capabilities: Vec<Value>,
    pub users: Vec<CapableUser>,
    pub definition_id: RemoteId,
    /// Call prefixes that fail once with an SSL error, then succeed.
    pub ssl_failures: RefCell<Vec<String>>,
    pub calls: RefCell<Vec<String>>,
    pub payloads: RefCell<Vec<Value>>,
}

impl FakeServer {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            version: Version::new(7, 5, 0),
            dev_apps: RefCell::new(Vec::new()),
            dev_apps_failure: None,
            deregister_fails: false,
            next_dev_app: RefCell::new(None),
            applications: Vec::new(),
            upload_response: RefCell::new(None),
            task_statuses: RefCell::new(VecDeque::new()),
            final_application: RefCell::new(None),
            capabilities: Vec::new(),
            users: Vec::new(),
            definition_id: RemoteId::from(900),
            ssl_failures: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            payloads: RefCell::new(Vec::new()),
        }
    }

    pub fn with_task_statuses(self, statuses: &[&str]) -> Self {
        *self.task_statuses.borrow_mut() = statuses.iter().map(|s| AppStatus::from(*s)).collect();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn fail_once_with_ssl(self, prefix: &str) -> Self {
        self.ssl_failures.borrow_mut().push(prefix.to_string());
        self
    }

    fn record(&self, call: String) -> Result<()> {
        let mut failures = self.ssl_failures.borrow_mut();
        let hit = failures.iter().position(|prefix| call.starts_with(prefix.as_str()));
        self.calls.borrow_mut().push(call);
        match hit {
            Some(index) => {
                let prefix = failures.remove(index);
                Err(Error::Ssl(format!("SSL error from host {} on {prefix}", self.host)))
            }
            None => Ok(()),
        }
    }

    fn take_dev_app(&self) -> Result<DevAppEntry> {
        self.next_dev_app
            .borrow_mut()
            .take()
            .ok_or_else(|| Error::api("no scripted dev app response", 500, 0))
    }

    fn take_upload_response(&self) -> Result<TaskResponse> {
        self.upload_response
            .borrow_mut()
            .take()
            .ok_or_else(|| Error::api("no scripted upload response", 500, 0))
    }
}

impl AppServer for FakeServer {
    fn host(&self) -> &str {
        &self.host
    }

    fn server_version(&self) -> Result<Version> {
        self.record("GET version".to_string())?;
        Ok(self.version.clone())
    }

    fn list_dev_apps(&self) -> Result<Vec<DevAppEntry>> {
        self.record("GET dev apps".to_string())?;
        if let Some((status, code)) = self.dev_apps_failure {
            return Err(Error::api("listing failed", status, code));
        }
        Ok(self.dev_apps.borrow().clone())
    }

    fn preregister_dev_app(&self, payload: &Value) -> Result<DevAppEntry> {
        self.record("POST dev apps".to_string())?;
        self.payloads.borrow_mut().push(payload.clone());
        self.take_dev_app()
    }

    fn register_dev_app(&self, definition_id: &RemoteId, payload: &Value) -> Result<DevAppEntry> {
        self.record(format!("POST dev app {definition_id}"))?;
        self.payloads.borrow_mut().push(payload.clone());
        self.take_dev_app()
    }

    fn update_dev_app(&self, definition_id: &RemoteId, payload: &Value) -> Result<DevAppEntry> {
        self.record(format!("PUT dev app {definition_id}"))?;
        self.payloads.borrow_mut().push(payload.clone());
        self.take_dev_app()
    }

    fn deregister_dev_app(&self, definition_id: &RemoteId) -> Result<()> {
        self.record(format!("DELETE dev app {definition_id}"))?;
        if self.deregister_fails {
            return Err(Error::api("delete failed", 500, 0));
        }
        Ok(())
    }

    fn list_applications(&self) -> Result<Vec<Application>> {
        self.record("GET applications".to_string())?;
        Ok(self.applications.clone())
    }

    fn install_package(&self, package: &[u8]) -> Result<TaskResponse> {
        self.record(format!("POST install {} bytes", package.len()))?;
        self.take_upload_response()
    }

    fn upgrade_package(&self, app_id: &RemoteId, package: &[u8]) -> Result<TaskResponse> {
        self.record(format!("PUT application {app_id} {} bytes", package.len()))?;
        self.take_upload_response()
    }

    fn task_status(&self, app_id: &RemoteId) -> Result<TaskResponse> {
        self.record(format!("GET task {app_id}"))?;
        let status = self
            .task_statuses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Error::api("no scripted task status", 500, 0))?;
        Ok(TaskResponse {
            application_id: Some(app_id.clone()),
            status,
        })
    }

    fn requested_capabilities(&self, app_id: &RemoteId) -> Result<Vec<Value>> {
        self.record(format!("GET auth {app_id}"))?;
        Ok(self.capabilities.clone())
    }

    fn capable_users(&self, _capabilities: &[Value]) -> Result<Vec<CapableUser>> {
        self.record("GET capable users".to_string())?;
        Ok(self.users.clone())
    }

    fn authorize(&self, app_id: &RemoteId, user_id: &RemoteId) -> Result<()> {
        self.record(format!("POST auth {app_id} user {user_id}"))?;
        Ok(())
    }

    fn application(&self, app_id: &RemoteId) -> Result<Application> {
        self.record(format!("GET application {app_id}"))?;
        self.final_application
            .borrow()
            .clone()
            .ok_or_else(|| Error::api("no scripted application", 404, 0))
    }

    fn application_definition_id(&self, app_id: &RemoteId) -> Result<RemoteId> {
        self.record(format!("GET definition id {app_id}"))?;
        Ok(self.definition_id.clone())
    }

    fn delete_definition(&self, definition_id: &RemoteId) -> Result<()> {
        self.record(format!("DELETE definition {definition_id}"))?;
        Ok(())
    }

    fn cancel_install(&self, app_id: &RemoteId) -> Result<()> {
        self.record(format!("POST cancel {app_id}"))?;
        Ok(())
    }
}

// =============================================================================
// Remote shell
// =============================================================================

#[derive(Debug, Clone)]
pub enum ConnectScript {
    AuthFailure,
    Failure(String),
    Success,
}

#[derive(Debug, Default)]
pub struct ShellLog {
    pub passwords: RefCell<Vec<String>>,
    pub configs: RefCell<Vec<ConnectionConfig>>,
    pub commands: RefCell<Vec<String>>,
    pub closes: Cell<usize>,
}

/// Connector whose attempts follow a script; shells serve canned content.
pub struct FakeConnector {
    script: RefCell<VecDeque<ConnectScript>>,
    pub hostname: Option<String>,
    pub bundle: Option<Vec<u8>>,
    pub log: Rc<ShellLog>,
}

impl FakeConnector {
    pub fn new(script: Vec<ConnectScript>, bundle: Option<Vec<u8>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            hostname: Some("console.example.com".to_string()),
            bundle,
            log: Rc::new(ShellLog::default()),
        }
    }

    pub fn without_hostname(mut self) -> Self {
        self.hostname = None;
        self
    }
}

impl RemoteShellConnector for FakeConnector {
    fn connect(
        &self,
        _host: &str,
        config: &ConnectionConfig,
        password: &str,
        _settings: &Settings,
    ) -> std::result::Result<Box<dyn RemoteShell>, ConnectError> {
        self.log.passwords.borrow_mut().push(password.to_string());
        self.log.configs.borrow_mut().push(config.clone());
        match self.script.borrow_mut().pop_front() {
            Some(ConnectScript::AuthFailure) => Err(ConnectError::AuthenticationFailed),
            Some(ConnectScript::Failure(message)) => Err(ConnectError::Connection(message)),
            Some(ConnectScript::Success) => Ok(Box::new(FakeShell {
                hostname: self.hostname.clone(),
                bundle: self.bundle.clone(),
                log: Rc::clone(&self.log),
            })),
            None => Err(ConnectError::Connection("no scripted connection".to_string())),
        }
    }
}

struct FakeShell {
    hostname: Option<String>,
    bundle: Option<Vec<u8>>,
    log: Rc<ShellLog>,
}

impl RemoteShell for FakeShell {
    fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        self.log.commands.borrow_mut().push(command.to_string());
        Ok(match &self.hostname {
            Some(hostname) => CommandOutput {
                exit_status: 0,
                stdout: format!("{hostname}\n"),
                stderr: String::new(),
            },
            None => CommandOutput {
                exit_status: 127,
                stdout: String::new(),
                stderr: "myver: command not found".to_string(),
            },
        })
    }

    fn download(&mut self, _remote: &Path, local: &Path, progress: Progress<'_>) -> Result<u64> {
        let bundle = self
            .bundle
            .as_ref()
            .ok_or_else(|| Error::ServerConnection("transfer failed".to_string()))?;
        std::fs::write(local, bundle).map_err(|e| Error::io("write", e))?;
        let size = bundle.len() as u64;
        progress(size, Some(size));
        Ok(size)
    }

    fn close(&mut self) {
        self.log.closes.set(self.log.closes.get() + 1);
    }
}

// =============================================================================
// Certificates
// =============================================================================

pub fn self_signed_pem() -> String {
    let cert = rcgen::generate_simple_self_signed(vec!["console.example.com".to_string()])
        .expect("generate certificate");
    cert.cert.pem()
}
