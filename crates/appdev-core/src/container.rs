//! Local container runtime queries.

use std::process::Command;

use tracing::debug;

use crate::error::{Error, Result};
use crate::manifest::PortMappings;

pub const MSG_CONTAINER_NOT_RUNNING: &str =
    "An app must be running locally before it can be registered.";

pub trait ContainerRuntime {
    /// Host ports assigned to a running container, keyed by `"<port>/tcp"`.
    fn assigned_port_mappings(&self, container: &str) -> Result<PortMappings>;
}

/// Talks to the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }
}

impl DockerCli {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ContainerRuntime for DockerCli {
    fn assigned_port_mappings(&self, container: &str) -> Result<PortMappings> {
        let output = Command::new(&self.program)
            .args(["port", container])
            .output()
            .map_err(|e| Error::Container(format!("Unable to run {}: {e}", self.program)))?;

        if !output.status.success() {
            debug!(
                container,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "docker port failed"
            );
            return Err(Error::Container(MSG_CONTAINER_NOT_RUNNING.to_string()));
        }
        Ok(parse_port_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `docker port` lines such as `5000/tcp -> 0.0.0.0:32768`.
///
/// When a port is bound on several addresses the first binding wins.
pub fn parse_port_output(output: &str) -> PortMappings {
    let mut mappings = PortMappings::new();
    for line in output.lines() {
        let Some((container_port, binding)) = line.split_once("->") else {
            continue;
        };
        let Some(host_port) = binding
            .trim()
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse::<u16>().ok())
        else {
            continue;
        };
        mappings
            .entry(container_port.trim().to_string())
            .or_insert(host_port);
    }
    mappings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ipv4_and_ipv6_bindings() {
        let output = "5000/tcp -> 0.0.0.0:32768\n\
                      5000/tcp -> [::]:32768\n\
                      5010/tcp -> 0.0.0.0:32770\n\
                      garbage line\n";
        let mappings = parse_port_output(output);
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings["5000/tcp"], 32768);
        assert_eq!(mappings["5010/tcp"], 32770);
    }

    #[test]
    fn missing_program_is_a_container_error() {
        let runtime = DockerCli::with_program("appdev-no-such-docker-binary");
        let err = runtime.assigned_port_mappings("appdev-demo").unwrap_err();
        assert!(matches!(err, Error::Container(_)));
    }
}
