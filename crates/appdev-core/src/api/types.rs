//! Wire types for the remote application API.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Identifier issued by the server. Sent as a JSON number or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<u64> for RemoteId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl Serialize for RemoteId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.parse::<u64>() {
            Ok(number) => serializer.serialize_u64(number),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for RemoteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => RemoteId(n.to_string()),
            Raw::Text(s) => RemoteId(s),
        })
    }
}

/// Application or task status reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppStatus {
    Creating,
    Upgrading,
    AuthRequired,
    Running,
    Error,
    Cancelled,
    Other(String),
}

impl AppStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AppStatus::Creating => "CREATING",
            AppStatus::Upgrading => "UPGRADING",
            AppStatus::AuthRequired => "AUTH_REQUIRED",
            AppStatus::Running => "RUNNING",
            AppStatus::Error => "ERROR",
            AppStatus::Cancelled => "CANCELLED",
            AppStatus::Other(other) => other,
        }
    }

    /// CREATING or UPGRADING: the server is still working on the task.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, AppStatus::Creating | AppStatus::Upgrading)
    }
}

impl From<String> for AppStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "CREATING" => AppStatus::Creating,
            "UPGRADING" => AppStatus::Upgrading,
            "AUTH_REQUIRED" => AppStatus::AuthRequired,
            "RUNNING" => AppStatus::Running,
            "ERROR" => AppStatus::Error,
            "CANCELLED" => AppStatus::Cancelled,
            _ => AppStatus::Other(value),
        }
    }
}

impl From<&str> for AppStatus {
    fn from(value: &str) -> Self {
        AppStatus::from(value.to_string())
    }
}

impl From<AppStatus> for String {
    fn from(status: AppStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AboutResponse {
    pub external_version: String,
}

/// One entry of the developer applications list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevAppEntry {
    pub definition_id: RemoteId,
    pub instance_id: RemoteId,
    pub status: AppStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskResponse {
    #[serde(default)]
    pub application_id: Option<RemoteId>,
    pub status: AppStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApplicationState {
    pub status: AppStatus,
    pub application_id: RemoteId,
    #[serde(default)]
    pub error_messages_json: Option<Vec<ErrorMessage>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Application {
    pub application_state: ApplicationState,
    #[serde(default)]
    pub manifest: Value,
}

impl Application {
    pub fn uuid(&self) -> Option<&str> {
        self.manifest.get("uuid").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.manifest.get("version").and_then(Value::as_str)
    }

    pub fn error_messages(&self) -> impl Iterator<Item = &str> {
        self.application_state
            .error_messages_json
            .iter()
            .flatten()
            .map(|e| e.message.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub capabilities: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CapableUser {
    pub id: RemoteId,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefinitionIdResponse {
    pub application_definition_id: RemoteId,
}
