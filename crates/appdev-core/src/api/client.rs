//! Typed calls against the remote application API.

use std::time::Duration;

use semver::Version;
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::trust::{ConnectionConfig, Verification};

use super::endpoints;
use super::http::{Body, HttpClient, json_headers, zip_headers};
use super::types::{
    AboutResponse, Application, AuthRequest, CapableUser, DefinitionIdResponse, DevAppEntry,
    RemoteId, TaskResponse,
};

/// Remote operations the registration and deployment flows depend on.
pub trait AppServer {
    /// Host the client talks to, as the operator named it.
    fn host(&self) -> &str;

    fn server_version(&self) -> Result<Version>;

    fn list_dev_apps(&self) -> Result<Vec<DevAppEntry>>;
    fn preregister_dev_app(&self, payload: &Value) -> Result<DevAppEntry>;
    fn register_dev_app(&self, definition_id: &RemoteId, payload: &Value) -> Result<DevAppEntry>;
    fn update_dev_app(&self, definition_id: &RemoteId, payload: &Value) -> Result<DevAppEntry>;
    fn deregister_dev_app(&self, definition_id: &RemoteId) -> Result<()>;

    fn list_applications(&self) -> Result<Vec<Application>>;
    fn install_package(&self, package: &[u8]) -> Result<TaskResponse>;
    fn upgrade_package(&self, app_id: &RemoteId, package: &[u8]) -> Result<TaskResponse>;
    fn task_status(&self, app_id: &RemoteId) -> Result<TaskResponse>;
    fn requested_capabilities(&self, app_id: &RemoteId) -> Result<Vec<Value>>;
    fn capable_users(&self, capabilities: &[Value]) -> Result<Vec<CapableUser>>;
    fn authorize(&self, app_id: &RemoteId, user_id: &RemoteId) -> Result<()>;
    fn application(&self, app_id: &RemoteId) -> Result<Application>;
    fn application_definition_id(&self, app_id: &RemoteId) -> Result<RemoteId>;
    fn delete_definition(&self, definition_id: &RemoteId) -> Result<()>;
    fn cancel_install(&self, app_id: &RemoteId) -> Result<()>;
}

/// [`AppServer`] over HTTPS.
#[derive(Debug, Clone)]
pub struct RestAppClient {
    http: HttpClient,
}

impl RestAppClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn connect(
        host: &str,
        username: &str,
        password: &str,
        verification: &Verification,
        connection: &ConnectionConfig,
    ) -> Result<Self> {
        HttpClient::for_host(host, username, password, verification, connection).map(Self::new)
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn set_upload_timeout(&mut self, timeout: Duration) {
        self.http.set_upload_timeout(timeout);
    }

    fn post_json(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        self.http
            .post(endpoint, &json_headers(), Body::Json(payload))?
            .json(self.http.host())
    }
}

impl AppServer for RestAppClient {
    fn host(&self) -> &str {
        self.http.host()
    }

    fn server_version(&self) -> Result<Version> {
        let about: AboutResponse = self.http.get_json(endpoints::SERVER_VERSION)?;
        parse_lenient_version(&about.external_version).ok_or_else(|| {
            Error::api(
                format!(
                    "Unable to determine version from server {}: {}",
                    self.host(),
                    about.external_version
                ),
                200,
                0,
            )
        })
    }

    fn list_dev_apps(&self) -> Result<Vec<DevAppEntry>> {
        self.http.get_json(endpoints::DEVELOPER_APPLICATIONS)
    }

    fn preregister_dev_app(&self, payload: &Value) -> Result<DevAppEntry> {
        let response = self.post_json(endpoints::DEVELOPER_APPLICATIONS, payload)?;
        dev_app_entry(response)
    }

    fn register_dev_app(&self, definition_id: &RemoteId, payload: &Value) -> Result<DevAppEntry> {
        let endpoint = endpoints::developer_application(definition_id.as_str());
        dev_app_entry(self.post_json(&endpoint, payload)?)
    }

    fn update_dev_app(&self, definition_id: &RemoteId, payload: &Value) -> Result<DevAppEntry> {
        let endpoint = endpoints::developer_application(definition_id.as_str());
        let response = self
            .http
            .put(&endpoint, &json_headers(), Body::Json(payload))?
            .json(self.host())?;
        dev_app_entry(response)
    }

    fn deregister_dev_app(&self, definition_id: &RemoteId) -> Result<()> {
        self.http
            .delete(&endpoints::developer_application(definition_id.as_str()))
            .map(drop)
    }

    fn list_applications(&self) -> Result<Vec<Application>> {
        self.http.get_json(endpoints::APPLICATIONS)
    }

    fn install_package(&self, package: &[u8]) -> Result<TaskResponse> {
        self.http
            .post(
                endpoints::APPLICATION_INSTALL,
                &zip_headers(),
                Body::Package(package),
            )?
            .json(self.host())
    }

    fn upgrade_package(&self, app_id: &RemoteId, package: &[u8]) -> Result<TaskResponse> {
        self.http
            .put(
                &endpoints::application(app_id.as_str()),
                &zip_headers(),
                Body::Package(package),
            )?
            .json(self.host())
    }

    fn task_status(&self, app_id: &RemoteId) -> Result<TaskResponse> {
        self.http
            .get_json(&endpoints::install_status(app_id.as_str()))
    }

    fn requested_capabilities(&self, app_id: &RemoteId) -> Result<Vec<Value>> {
        let request: AuthRequest = self
            .http
            .get_json(&endpoints::install_auth(app_id.as_str()))?;
        Ok(request.capabilities)
    }

    fn capable_users(&self, capabilities: &[Value]) -> Result<Vec<CapableUser>> {
        let encoded = Value::Array(capabilities.to_vec()).to_string();
        self.http
            .get(
                &endpoints::users_with_capabilities(&encoded),
                &[("Allow-Hidden", "true")],
            )?
            .json(self.host())
    }

    fn authorize(&self, app_id: &RemoteId, user_id: &RemoteId) -> Result<()> {
        let body = json!({ "user_id": user_id });
        self.http
            .post(
                &endpoints::install_auth(app_id.as_str()),
                &json_headers(),
                Body::Json(&body),
            )
            .map(drop)
    }

    fn application(&self, app_id: &RemoteId) -> Result<Application> {
        self.http.get_json(&endpoints::application(app_id.as_str()))
    }

    fn application_definition_id(&self, app_id: &RemoteId) -> Result<RemoteId> {
        let response: DefinitionIdResponse = self
            .http
            .get_json(&endpoints::application_definition_id(app_id.as_str()))?;
        Ok(response.application_definition_id)
    }

    fn delete_definition(&self, definition_id: &RemoteId) -> Result<()> {
        self.http
            .delete(&endpoints::definition(definition_id.as_str()))
            .map(drop)
    }

    fn cancel_install(&self, app_id: &RemoteId) -> Result<()> {
        self.http
            .post(
                &endpoints::install_cancel(app_id.as_str()),
                &json_headers(),
                Body::Empty,
            )
            .map(drop)
    }
}

fn dev_app_entry(response: Value) -> Result<DevAppEntry> {
    serde_json::from_value(response).map_err(|e| {
        Error::api(
            format!("Unable to extract registered app details from server response: {e}"),
            200,
            0,
        )
    })
}

/// Parse the first three numeric components of a version string.
///
/// `7.5.0.20211220130521` becomes `7.5.0`, `7.4` becomes `7.4.0`.
pub fn parse_lenient_version(text: &str) -> Option<Version> {
    let mut parts = text
        .trim()
        .split(|c: char| c == '.' || c == '-' || c == ' ')
        .map(|part| part.parse::<u64>());

    let major = parts.next()?.ok()?;
    let minor = match parts.next() {
        Some(part) => part.ok()?,
        None => 0,
    };
    let patch = match parts.next() {
        Some(part) => part.unwrap_or(0),
        None => 0,
    };
    Some(Version::new(major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_version_parsing() {
        assert_eq!(
            parse_lenient_version("7.5.0.20211220130521"),
            Some(Version::new(7, 5, 0))
        );
        assert_eq!(parse_lenient_version("7.4"), Some(Version::new(7, 4, 0)));
        assert_eq!(parse_lenient_version("7.3.3 UP1"), Some(Version::new(7, 3, 3)));
        assert_eq!(parse_lenient_version("unknown"), None);
        assert_eq!(parse_lenient_version(""), None);
    }

    #[test]
    fn feature_gate_comparison() {
        let gate = Version::new(7, 5, 0);
        assert!(parse_lenient_version("7.4.3").unwrap() < gate);
        assert!(parse_lenient_version("7.5.0.1").unwrap() >= gate);
    }
}
