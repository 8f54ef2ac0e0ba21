//! Application manifest access and registration payloads.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use serde_json::{Map, Value, json};

use crate::error::{Error, Result};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Container port every app serves its health endpoint on.
pub const DEFAULT_CONTAINER_PORT: &str = "5000/tcp";

/// Container port (`"<port>/tcp"`) to host port.
pub type PortMappings = BTreeMap<String, u16>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedService {
    pub name: String,
    pub port: Option<u16>,
}

/// Registration body plus the named services that had no host port mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationRequest {
    pub payload: Value,
    pub unmapped: Vec<NamedService>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    json: Value,
}

impl Manifest {
    pub fn new(json: Value) -> Self {
        Self { json }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("Unable to read {}", path.display()), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let json: Value = serde_json::from_str(content)
            .map_err(|e| Error::Manifest(format!("Your manifest.json is not valid JSON:\n{e}")))?;
        if !json.is_object() {
            return Err(Error::Manifest(
                "Your manifest.json must contain a JSON object".to_string(),
            ));
        }
        Ok(Self { json })
    }

    pub fn json(&self) -> &Value {
        &self.json
    }

    pub fn uuid(&self) -> Option<&str> {
        self.json.get("uuid").and_then(Value::as_str)
    }

    pub fn named_services(&self) -> Vec<NamedService> {
        let Some(services) = self.json.get("services").and_then(Value::as_array) else {
            return Vec::new();
        };
        services
            .iter()
            .filter_map(|service| {
                let name = service.get("name")?.as_str()?.to_string();
                let port = service
                    .get("port")
                    .and_then(Value::as_u64)
                    .and_then(|p| u16::try_from(p).ok());
                Some(NamedService { name, port })
            })
            .collect()
    }

    pub fn preregistration_payload(&self) -> Value {
        json!({ "manifest": self.json })
    }

    /// Build the body for registering the locally running app.
    ///
    /// The manifest is only sent with updates.
    pub fn registration_payload(
        &self,
        local_ip: &str,
        ports: &PortMappings,
        is_update: bool,
    ) -> Result<RegistrationRequest> {
        let default_port = ports.get(DEFAULT_CONTAINER_PORT).ok_or_else(|| {
            Error::Container(format!(
                "No host port is mapped to container port {DEFAULT_CONTAINER_PORT}"
            ))
        })?;

        let mut payload = Map::new();
        payload.insert("ip".to_string(), json!(local_ip));
        payload.insert("default_port".to_string(), json!(default_port));
        if is_update {
            payload.insert("manifest".to_string(), self.json.clone());
        }

        let mut service_ports = Vec::new();
        let mut unmapped = Vec::new();
        for service in self.named_services() {
            let Some(port) = service.port else { continue };
            match ports.get(&format!("{port}/tcp")) {
                Some(host_port) => {
                    service_ports.push(json!({ "service": service.name, "port": host_port }))
                }
                None => unmapped.push(service),
            }
        }
        if !service_ports.is_empty() {
            payload.insert("service_ports".to_string(), Value::Array(service_ports));
        }

        Ok(RegistrationRequest {
            payload: Value::Object(payload),
            unmapped,
        })
    }
}

/// Comma-separated, de-duplicated, ascending list of the host ports in a payload.
pub fn ports_summary(payload: &Value) -> String {
    let mut ports = BTreeSet::new();
    if let Some(port) = payload.get("default_port").and_then(Value::as_u64) {
        ports.insert(port);
    }
    for entry in payload
        .get("service_ports")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        if let Some(port) = entry.get("port").and_then(Value::as_u64) {
            ports.insert(port);
        }
    }
    ports
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read the app uuid from `manifest.json` inside a packaged app.
pub fn extract_uuid_from_package(package: &Path) -> Result<String> {
    let file = std::fs::File::open(package)
        .map_err(|e| Error::io(format!("Unable to open {}", package.display()), e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|_| {
        Error::Manifest(format!("{} is not a valid zip file", package.display()))
    })?;

    let mut content = String::new();
    archive
        .by_name(MANIFEST_FILE)
        .map_err(|_| {
            Error::Manifest(format!(
                "{} does not contain a manifest.json file",
                package.display()
            ))
        })?
        .read_to_string(&mut content)
        .map_err(|e| Error::io(format!("Unable to read manifest from {}", package.display()), e))?;

    Manifest::parse(&content)?
        .uuid()
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Manifest(format!(
                "The manifest.json in {} has no uuid",
                package.display()
            ))
        })
}
