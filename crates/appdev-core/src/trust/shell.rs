//! Remote-shell capability consumed by trust bootstrap.

use std::path::Path;

use crate::config::Settings;
use crate::error::Result;

use super::connection::ConnectionConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// Wrong user id or password. The caller may prompt again.
    AuthenticationFailed,
    /// Anything else: socket, proxy or protocol failure.
    Connection(String),
}

/// Byte progress callback: `(transferred, total)`.
pub type Progress<'a> = &'a mut dyn FnMut(u64, Option<u64>);

pub trait RemoteShell {
    fn exec(&mut self, command: &str) -> Result<CommandOutput>;

    /// Copy `remote` to `local`, returning the number of bytes written.
    fn download(&mut self, remote: &Path, local: &Path, progress: Progress<'_>) -> Result<u64>;

    fn close(&mut self);
}

pub trait RemoteShellConnector {
    fn connect(
        &self,
        host: &str,
        config: &ConnectionConfig,
        password: &str,
        settings: &Settings,
    ) -> std::result::Result<Box<dyn RemoteShell>, ConnectError>;
}
